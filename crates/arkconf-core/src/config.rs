//! Project configuration
//!
//! Loaded from `arkconf.yml` at the project root. Every field has a
//! default, so an absent file or an empty one gives a working setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::include::ExtractPolicy;
use crate::text::TextEncoding;

/// Default name of the project configuration file
pub const CONFIG_FILE: &str = "arkconf.yml";

/// A flat file kept in sync for every server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// File name on the server and in the flat store (e.g. `Game.ini`)
    pub name: String,
    #[serde(default)]
    pub encoding: TextEncoding,
}

impl FileSpec {
    pub fn new(name: impl Into<String>, encoding: TextEncoding) -> Self {
        Self {
            name: name.into(),
            encoding,
        }
    }

    /// File name without its extension (`Game.ini` -> `Game`)
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Name of the hierarchical counterpart (`Game.ini` -> `Game.yml`)
    pub fn hier_name(&self) -> String {
        format!("{}.yml", self.stem())
    }
}

/// Settings shared by every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Recognized server names
    pub servers: Vec<String>,
    /// Root of the flat store, one directory per server
    pub flat_root: PathBuf,
    /// Root of the hierarchical store, one directory per server
    pub hier_root: PathBuf,
    /// Include directory, relative to `hier_root`
    pub includes_dir: PathBuf,
    /// Directory holding the flat files on each server
    pub remote_dir: String,
    /// Flat files kept in sync
    pub files: Vec<FileSpec>,
    /// Maximum number of servers transferred at once
    pub workers: usize,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
    /// Which shared sub-trees `load` moves into include files
    pub extract: ExtractPolicy,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            servers: [
                "Aberration",
                "Crystal_Isles",
                "Extinction",
                "Fjordur",
                "Gen_1",
                "Gen_2",
                "Island",
                "Ragnarok",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            flat_root: PathBuf::from("configs/ini"),
            hier_root: PathBuf::from("configs/yml"),
            includes_dir: PathBuf::from("includes"),
            remote_dir: "/ShooterGame/Saved/Config/WindowsServer".to_string(),
            files: vec![
                FileSpec::new("Game.ini", TextEncoding::Utf8),
                FileSpec::new("GameUserSettings.ini", TextEncoding::Utf16),
            ],
            workers: 4,
            connect_timeout_secs: 15,
            io_timeout_secs: 60,
            extract: ExtractPolicy::default(),
        }
    }
}

impl ProjectConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::from_yaml(&content).map_err(|e| e.in_file(path.display().to_string()))
    }

    /// Load `path` if it exists, otherwise use the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            log::debug!("Loading project configuration from {}", path.display());
            Self::from_file(path)
        } else {
            log::debug!("No {} found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("`servers` must name at least one server"));
        }
        for (i, name) in self.servers.iter().enumerate() {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(Error::config(format!("invalid server name {:?}", name)));
            }
            if self.servers[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(Error::config(format!("server {} is listed twice", name)));
            }
        }
        if self.files.is_empty() {
            return Err(Error::config("`files` must name at least one file"));
        }
        for (i, file) in self.files.iter().enumerate() {
            if self.files[..i].iter().any(|f| f.stem() == file.stem()) {
                return Err(Error::config(format!(
                    "files {} share the stem {}",
                    file.name,
                    file.stem()
                )));
            }
        }
        if self.workers == 0 {
            return Err(Error::config("`workers` must be at least 1"));
        }
        Ok(())
    }

    /// Local flat file of a server
    pub fn flat_path(&self, server: &str, file: &FileSpec) -> PathBuf {
        self.flat_root.join(server).join(&file.name)
    }

    /// Hierarchical directory of a server
    pub fn hier_dir(&self, server: &str) -> PathBuf {
        self.hier_root.join(server)
    }

    /// Hierarchical document of a server
    pub fn hier_path(&self, server: &str, file: &FileSpec) -> PathBuf {
        self.hier_dir(server).join(file.hier_name())
    }

    /// Directory holding include files
    pub fn includes_path(&self) -> PathBuf {
        self.hier_root.join(&self.includes_dir)
    }

    /// Remote location of a flat file
    pub fn remote_path(&self, file: &FileSpec) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), file.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();

        assert_eq!(config.servers.len(), 8);
        assert_eq!(config.files[1].encoding, TextEncoding::Utf16);
        assert_eq!(config.workers, 4);
        assert_eq!(config.extract, ExtractPolicy::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ProjectConfig::from_yaml(
            r#"
servers: [Island, Ragnarok]
workers: 2
extract:
  min_documents: 3
"#,
        )
        .unwrap();

        assert_eq!(config.servers, vec!["Island".to_string(), "Ragnarok".to_string()]);
        assert_eq!(config.workers, 2);
        assert_eq!(config.extract.min_documents, 3);
        assert!(config.extract.enabled);
        assert_eq!(config.flat_root, PathBuf::from("configs/ini"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ProjectConfig::from_yaml("").unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_validation() {
        for yaml in [
            "servers: []\n",
            "workers: 0\n",
            "servers: [Island, island]\n",
            "files: []\n",
            "files: [{name: Game.ini}, {name: Game.cfg}]\n",
            "servers: [../x]\n",
        ] {
            let err = ProjectConfig::from_yaml(yaml).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Config, "{}", yaml);
        }
    }

    #[test]
    fn test_paths() {
        let config = ProjectConfig::default();
        let gus = &config.files[1];

        assert_eq!(gus.stem(), "GameUserSettings");
        assert_eq!(
            config.flat_path("Island", gus),
            PathBuf::from("configs/ini/Island/GameUserSettings.ini")
        );
        assert_eq!(
            config.hier_path("Island", gus),
            PathBuf::from("configs/yml/Island/GameUserSettings.yml")
        );
        assert_eq!(config.includes_path(), PathBuf::from("configs/yml/includes"));
        assert_eq!(
            config.remote_path(gus),
            "/ShooterGame/Saved/Config/WindowsServer/GameUserSettings.ini"
        );
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ProjectConfig::load_or_default(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_from_file_reports_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "workers: many\n").unwrap();

        let err = ProjectConfig::load_or_default(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.source_location.is_some());
    }
}
