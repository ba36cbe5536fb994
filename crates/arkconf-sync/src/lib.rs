//! arkconf-sync: moves flat configuration files to and from game servers
//!
//! A [`SyncEngine`] pulls or pushes every configured file for each selected
//! server, a bounded number of servers at a time. Each server gets its own
//! [`SyncResult`]; one server failing never affects the others.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arkconf_core::{Environment, FsStorage, ProjectConfig, ServerRegistry};
//! use arkconf_sync::{SftpTransport, SyncEngine};
//!
//! # async fn run() -> arkconf_core::Result<()> {
//! let config = ProjectConfig::default();
//! let registry = ServerRegistry::from_env(&config.servers, &Environment::from_process())?;
//! let servers = registry.select(&[])?;
//!
//! let transport = Arc::new(SftpTransport::from_config(&config));
//! let engine = SyncEngine::new(config, transport, Arc::new(FsStorage::new(".")));
//! let report = engine.pull(servers).await;
//! assert!(!report.has_failures());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod report;
mod transport;

pub mod mock;

#[cfg(feature = "sftp")]
mod sftp;

pub use engine::{Operation, SyncEngine};
pub use error::TransferError;
pub use report::{SyncReport, SyncResult};
pub use transport::{RemoteSession, Transport, TEMP_SUFFIX};

#[cfg(feature = "sftp")]
pub use sftp::SftpTransport;
