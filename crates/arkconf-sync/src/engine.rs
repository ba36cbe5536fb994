//! Concurrent pull and push
//!
//! Each selected server is one unit of work. At most `workers` servers are
//! in flight; the transfer itself runs on the blocking pool since the
//! transport is synchronous. A failure stops that server's remaining files
//! and never affects another server.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arkconf_core::{FileSpec, ProjectConfig, ServerSpec, Storage};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::TransferError;
use crate::report::{SyncReport, SyncResult};
use crate::transport::{RemoteSession, Transport};

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Remote to local flat store
    Pull,
    /// Local flat store to remote
    Push,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Pull => write!(f, "pull"),
            Operation::Push => write!(f, "push"),
        }
    }
}

enum FileOutcome {
    Transferred,
    Skipped,
}

struct Shared {
    config: ProjectConfig,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn Storage>,
}

/// Runs pull and push over a set of servers
pub struct SyncEngine {
    shared: Arc<Shared>,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        config: ProjectConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                storage,
            }),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops servers which have not started yet
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cancel on Ctrl-C; must be called inside a tokio runtime
    pub fn cancel_on_ctrl_c(&self) {
        let flag = self.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, finishing transfers already in flight");
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    pub async fn pull(&self, servers: Vec<ServerSpec>) -> SyncReport {
        self.run(Operation::Pull, servers).await
    }

    pub async fn push(&self, servers: Vec<ServerSpec>) -> SyncReport {
        self.run(Operation::Push, servers).await
    }

    /// Transfer every configured file for every server
    ///
    /// Results are in the order the servers were given.
    pub async fn run(&self, operation: Operation, servers: Vec<ServerSpec>) -> SyncReport {
        let workers = self.shared.config.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let names: Vec<String> = servers.iter().map(|s| s.name.clone()).collect();

        log::info!(
            "Starting {} for {} server(s), {} at a time",
            operation,
            servers.len(),
            workers
        );

        let mut tasks = JoinSet::new();
        for (index, server) in servers.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let shared = Arc::clone(&self.shared);
            let cancelled = Arc::clone(&self.cancelled);

            tasks.spawn(async move {
                let name = server.name.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (index, SyncResult::failed(name, operation, TransferError::Cancelled))
                    }
                };
                if cancelled.load(Ordering::SeqCst) {
                    log::info!("{}: skipped, run cancelled", name);
                    return (index, SyncResult::failed(name, operation, TransferError::Cancelled));
                }

                let joined =
                    tokio::task::spawn_blocking(move || transfer_server(&shared, operation, &server))
                        .await;
                match joined {
                    Ok(result) => (index, result),
                    Err(e) => (
                        index,
                        SyncResult::failed(name, operation, TransferError::Worker(e.to_string())),
                    ),
                }
            });
        }

        let mut slots: Vec<Option<SyncResult>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => log::error!("Transfer task failed: {}", e),
            }
        }

        let results = slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| {
                    SyncResult::failed(name, operation, TransferError::Worker("task aborted".into()))
                })
            })
            .collect();
        SyncReport::new(operation, results)
    }
}

fn transfer_server(shared: &Shared, operation: Operation, server: &ServerSpec) -> SyncResult {
    let mut result = SyncResult::new(server.name.clone(), operation);

    log::info!(
        "{}: {} via {}@{}:{}",
        server.name,
        operation,
        server.user,
        server.host,
        server.port
    );
    let mut session = match shared.transport.connect(server) {
        Ok(session) => session,
        Err(e) => {
            log::warn!("{}: {}", server.name, e);
            result.error = Some(e);
            return result;
        }
    };

    for file in &shared.config.files {
        let outcome = match operation {
            Operation::Pull => pull_file(shared, session.as_mut(), &server.name, file),
            Operation::Push => push_file(shared, session.as_mut(), &server.name, file),
        };
        match outcome {
            Ok(FileOutcome::Transferred) => result.transferred.push(file.name.clone()),
            Ok(FileOutcome::Skipped) => result.skipped.push(file.name.clone()),
            Err(e) => {
                log::warn!("{}: {}", server.name, e);
                result.error = Some(e);
                break;
            }
        }
    }

    if result.error.is_none() {
        log::info!("{}: {} done", server.name, operation);
    }
    result
}

fn pull_file(
    shared: &Shared,
    session: &mut dyn RemoteSession,
    server: &str,
    file: &FileSpec,
) -> Result<FileOutcome, TransferError> {
    let remote = shared.config.remote_path(file);
    let local = shared.config.flat_path(server, file);

    let bytes = session.read_file(&remote)?;
    shared
        .storage
        .write(&local, &bytes)
        .map_err(|e| TransferError::local_io(display(&local), e))?;

    log::debug!("{}: {} -> {}", server, remote, local.display());
    Ok(FileOutcome::Transferred)
}

fn push_file(
    shared: &Shared,
    session: &mut dyn RemoteSession,
    server: &str,
    file: &FileSpec,
) -> Result<FileOutcome, TransferError> {
    let remote = shared.config.remote_path(file);
    let local = shared.config.flat_path(server, file);

    let bytes = match shared.storage.read(&local) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => {
            log::warn!("{}: {} is missing locally, not pushed", server, local.display());
            return Ok(FileOutcome::Skipped);
        }
        Err(e) => return Err(TransferError::local_io(display(&local), e)),
    };
    session.write_file(&remote, &bytes)?;

    log::debug!("{}: {} -> {}", server, local.display(), remote);
    Ok(FileOutcome::Transferred)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
