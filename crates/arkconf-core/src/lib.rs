//! arkconf-core: ARK server configuration transcoding
//!
//! Converts between the flat INI files a game server reads and the
//! hierarchical YAML documents kept in version control, with `${NAME}`
//! interpolation and shared `!include` files.
//!
//! # Example
//!
//! ```rust
//! use arkconf_core::{transcode, yaml, FlatDocument, LineEnding};
//!
//! let ini = "[ServerSettings]\nDifficultyOffset=1.0\nMaxPlayers=70\n";
//! let doc = FlatDocument::parse(ini).unwrap();
//! let hier = transcode::to_hier(&doc).unwrap();
//!
//! assert_eq!(hier.get_path("ServerSettings.MaxPlayers").unwrap().as_i64(), Some(70));
//!
//! let text = yaml::to_string(&hier).unwrap();
//! let back = transcode::to_flat(&yaml::parse(&text).unwrap()).unwrap();
//! assert_eq!(back.to_text(LineEnding::Lf), ini);
//! ```

pub mod env;
pub mod error;
pub mod flat;
pub mod group;
pub mod include;
pub mod interpolation;
pub mod registry;
pub mod storage;
pub mod text;
pub mod transcode;
pub mod value;
pub mod yaml;

mod config;
mod pipeline;

pub use config::{FileSpec, ProjectConfig, CONFIG_FILE};
pub use env::Environment;
pub use error::{Error, ErrorKind, Result, SourceLocation};
pub use flat::{FlatDocument, FlatLine, FlatSection, LineEnding};
pub use include::{ExtractPolicy, IncludeResolver};
pub use pipeline::{ConversionOutcome, ConversionReport, ConversionStatus, Pipeline};
pub use registry::{select_names, ServerRegistry, ServerSpec};
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use text::TextEncoding;
pub use value::{HierNode, ScalarValue};
