//! Transport seam
//!
//! A [`Transport`] opens one [`RemoteSession`] per server. The session is
//! a scoped resource: it is closed when dropped, on success and failure
//! alike.

use arkconf_core::ServerSpec;

use crate::error::TransferError;

/// Suffix of the temporary file written before the rename on upload
pub const TEMP_SUFFIX: &str = ".arkconf-tmp";

/// Opens connections to servers
pub trait Transport: Send + Sync {
    /// Connect and authenticate
    fn connect(&self, server: &ServerSpec) -> Result<Box<dyn RemoteSession>, TransferError>;
}

/// An authenticated file-transfer session with one server
pub trait RemoteSession {
    /// Read a whole remote file
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, TransferError>;

    /// Replace a remote file; implementations write a temporary file and
    /// rename it over the target
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError>;
}

/// Primitive remote file operations behind [`replace_file`]
///
/// Errors carry `target`, the path the caller asked to write.
pub(crate) trait RemoteFs {
    fn put(&mut self, path: &str, bytes: &[u8], target: &str) -> Result<(), TransferError>;
    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError>;
    fn exists(&mut self, path: &str) -> bool;
    fn remove(&mut self, path: &str, target: &str) -> Result<(), TransferError>;
}

/// Write `bytes` next to `path` and move them into place
///
/// Servers speaking SFTP version 3 refuse to rename onto an existing
/// file. When that happens the old file is removed and the rename retried,
/// so the replacement is no longer atomic. The temporary file never
/// outlives a failed write.
pub(crate) fn replace_file<F>(fs: &mut F, path: &str, bytes: &[u8]) -> Result<(), TransferError>
where
    F: RemoteFs + ?Sized,
{
    let temp = format!("{}{}", path, TEMP_SUFFIX);

    let result = fs
        .put(&temp, bytes, path)
        .and_then(|_| move_into_place(fs, &temp, path));

    if result.is_err() && fs.exists(&temp) {
        if let Err(e) = fs.remove(&temp, path) {
            log::warn!("{}: could not remove {}: {}", path, temp, e);
        }
    }
    result
}

fn move_into_place<F>(fs: &mut F, temp: &str, path: &str) -> Result<(), TransferError>
where
    F: RemoteFs + ?Sized,
{
    match fs.rename(temp, path) {
        Ok(()) => Ok(()),
        Err(err) if fs.exists(path) => {
            log::warn!(
                "{}: server refused to rename over the existing file ({}); replacing it non-atomically",
                path,
                err
            );
            fs.remove(path, path)?;
            fs.rename(temp, path)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    /// Rename fails whenever the target exists, like an SFTP v3 server
    #[derive(Default)]
    struct StrictFs {
        files: BTreeMap<String, Vec<u8>>,
        refuse_remove: bool,
    }

    impl RemoteFs for StrictFs {
        fn put(&mut self, path: &str, bytes: &[u8], _target: &str) -> Result<(), TransferError> {
            self.files.insert(path.to_string(), bytes.to_vec());
            Ok(())
        }

        fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
            if self.files.contains_key(to) {
                return Err(TransferError::transfer(to, "failure"));
            }
            let bytes = self
                .files
                .remove(from)
                .ok_or_else(|| TransferError::transfer(to, "no such file"))?;
            self.files.insert(to.to_string(), bytes);
            Ok(())
        }

        fn exists(&mut self, path: &str) -> bool {
            self.files.contains_key(path)
        }

        fn remove(&mut self, path: &str, target: &str) -> Result<(), TransferError> {
            if self.refuse_remove && path == target {
                return Err(TransferError::transfer(target, "permission denied"));
            }
            self.files.remove(path);
            Ok(())
        }
    }

    #[test]
    fn test_replace_new_file() {
        let mut fs = StrictFs::default();
        replace_file(&mut fs, "/cfg/Game.ini", b"new").unwrap();

        assert_eq!(fs.files.keys().collect::<Vec<_>>(), vec!["/cfg/Game.ini"]);
    }

    #[test]
    fn test_replace_existing_file_falls_back() {
        let mut fs = StrictFs::default();
        fs.files.insert("/cfg/Game.ini".into(), b"old".to_vec());

        replace_file(&mut fs, "/cfg/Game.ini", b"new").unwrap();

        assert_eq!(fs.files.get("/cfg/Game.ini"), Some(&b"new".to_vec()));
        assert!(!fs.files.contains_key("/cfg/Game.ini.arkconf-tmp"));
    }

    #[test]
    fn test_failed_replace_keeps_original_and_cleans_temp() {
        let mut fs = StrictFs {
            refuse_remove: true,
            ..StrictFs::default()
        };
        fs.files.insert("/cfg/Game.ini".into(), b"old".to_vec());

        let err = replace_file(&mut fs, "/cfg/Game.ini", b"new").unwrap_err();

        assert_eq!(err.kind(), "transfer");
        assert_eq!(fs.files.get("/cfg/Game.ini"), Some(&b"old".to_vec()));
        assert!(!fs.files.contains_key("/cfg/Game.ini.arkconf-tmp"));
    }
}
