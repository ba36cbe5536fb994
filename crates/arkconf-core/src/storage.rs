//! Storage access
//!
//! All reads and writes of the flat and hierarchical stores go through the
//! [`Storage`] trait. Paths are relative to the storage root and use `/`.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Capability set over a tree of files
pub trait Storage: Send + Sync {
    /// Read a whole file; a missing file is a `NotFound` error
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace a file's content; a reader never observes a partial write
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Files directly inside `dir`, sorted; a missing directory is empty
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Check whether a file exists
    fn exists(&self, path: &Path) -> bool;
}

/// Storage backed by a directory on disk
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let native = self.native(path);
        fs::read(&native).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(path.display().to_string())
            } else {
                Error::io(native.display().to_string(), e)
            }
        })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.native(path), bytes)
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let native = self.native(dir);
        let entries = match fs::read_dir(&native) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(native.display().to_string(), e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(native.display().to_string(), e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                files.push(dir.join(entry.file_name()));
            }
        }
        files.sort();
        Ok(files)
    }

    fn exists(&self, path: &Path) -> bool {
        self.native(path).is_file()
    }
}

/// Write content atomically: write a sibling temp file, then rename it
/// over the target. Parent directories are created as needed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent.display().to_string(), e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let result = (|| -> std::io::Result<()> {
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        temp_file.write_all(content)?;
        temp_file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path.display().to_string(), e)
    })
}

/// In-memory storage for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage holding the given files
    pub fn with_files<I, P, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<PathBuf>,
        B: Into<Vec<u8>>,
    {
        Self {
            files: RwLock::new(
                files
                    .into_iter()
                    .map(|(p, b)| (p.into(), b.into()))
                    .collect(),
            ),
        }
    }

    /// All stored paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self
            .files
            .read()
            .map_err(|_| Error::internal("memory storage lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(path.display().to_string()))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| Error::internal("memory storage lock poisoned"))?;
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files = self
            .files
            .read()
            .map_err(|_| Error::internal("memory storage lock poisoned"))?;
        Ok(files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_write_creates_parents_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::new(dir.path());
        let path = Path::new("configs/ini/Island/Game.ini");

        storage.write(path, b"[S]\nA=1\n").unwrap();

        assert_eq!(storage.read(path).unwrap(), b"[S]\nA=1\n");
        assert!(storage.exists(path));
        assert!(dir.path().join(path).is_file());
    }

    #[test]
    fn test_fs_write_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::new(dir.path());
        let path = Path::new("out/Game.ini");

        storage.write(path, b"old").unwrap();
        storage.write(path, b"new").unwrap();

        assert_eq!(storage.read(path).unwrap(), b"new");
        assert_eq!(storage.list(Path::new("out")).unwrap(), vec![PathBuf::from("out/Game.ini")]);
    }

    #[test]
    fn test_fs_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::new(dir.path());

        let err = storage.read(Path::new("nope.ini")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!storage.exists(Path::new("nope.ini")));
        assert!(storage.list(Path::new("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_fs_list_skips_directories() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::new(dir.path());
        storage.write(Path::new("yml/Island/Game.yml"), b"{}").unwrap();
        storage.write(Path::new("yml/Island/GameUserSettings.yml"), b"{}").unwrap();
        storage.write(Path::new("yml/Island/sub/x.yml"), b"{}").unwrap();

        assert_eq!(
            storage.list(Path::new("yml/Island")).unwrap(),
            vec![
                PathBuf::from("yml/Island/Game.yml"),
                PathBuf::from("yml/Island/GameUserSettings.yml"),
            ]
        );
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_files([("a/x.yml", "1"), ("a/b/y.yml", "2")]);

        assert_eq!(storage.read(Path::new("a/x.yml")).unwrap(), b"1");
        assert_eq!(storage.list(Path::new("a")).unwrap(), vec![PathBuf::from("a/x.yml")]);
        assert!(storage.read(Path::new("a/z.yml")).unwrap_err().is_not_found());

        storage.write(Path::new("a/z.yml"), b"3").unwrap();
        assert!(storage.exists(Path::new("a/z.yml")));
        assert_eq!(storage.paths().len(), 3);
    }
}
