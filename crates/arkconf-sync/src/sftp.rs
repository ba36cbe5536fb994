//! SFTP transport over libssh2

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use arkconf_core::{ProjectConfig, ServerSpec};
use ssh2::{RenameFlags, Session, Sftp};

use crate::error::TransferError;
use crate::transport::{replace_file, RemoteFs, RemoteSession, Transport};

/// SFTP with password authentication
#[derive(Debug, Clone)]
pub struct SftpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl SftpTransport {
    pub fn new(connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            io_timeout,
        }
    }

    /// Timeouts from the project configuration
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.io_timeout_secs),
        )
    }
}

impl Transport for SftpTransport {
    fn connect(&self, server: &ServerSpec) -> Result<Box<dyn RemoteSession>, TransferError> {
        let endpoint = format!("{}:{}", server.host, server.port);

        let addr = (server.host.as_str(), server.port)
            .to_socket_addrs()
            .map_err(|e| TransferError::connect(&endpoint, e))?
            .next()
            .ok_or_else(|| TransferError::connect(&endpoint, "host did not resolve"))?;

        log::debug!("{}: connecting to {}", server.name, endpoint);
        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| TransferError::connect(&endpoint, e))?;
        tcp.set_read_timeout(Some(self.io_timeout))
            .and_then(|_| tcp.set_write_timeout(Some(self.io_timeout)))
            .map_err(|e| TransferError::connect(&endpoint, e))?;

        let mut session = Session::new().map_err(|e| TransferError::connect(&endpoint, e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.io_timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| TransferError::connect(&endpoint, e))?;

        session
            .userauth_password(&server.user, &server.credential)
            .map_err(|e| TransferError::auth(&server.user, e))?;
        if !session.authenticated() {
            return Err(TransferError::auth(&server.user, "server rejected the credentials"));
        }

        let sftp = session
            .sftp()
            .map_err(|e| TransferError::connect(&endpoint, format!("sftp subsystem: {}", e)))?;

        log::debug!("{}: authenticated as {}", server.name, server.user);
        Ok(Box::new(SftpSession {
            sftp: Some(sftp),
            session,
            name: server.name.clone(),
        }))
    }
}

/// The SFTP channel is closed explicitly in [`Drop`], before the
/// session disconnects
struct SftpSession {
    sftp: Option<Sftp>,
    session: Session,
    name: String,
}

impl SftpSession {
    fn sftp(&self, path: &str) -> Result<&Sftp, TransferError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| TransferError::transfer(path, "sftp channel closed"))
    }
}

impl RemoteSession for SftpSession {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, TransferError> {
        let mut file = self
            .sftp(path)?
            .open(Path::new(path))
            .map_err(|e| TransferError::transfer(path, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| TransferError::transfer(path, e))?;
        log::debug!("{}: read {} ({} bytes)", self.name, path, bytes.len());
        Ok(bytes)
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError> {
        replace_file(self, path, bytes)?;
        log::debug!("{}: wrote {} ({} bytes)", self.name, path, bytes.len());
        Ok(())
    }
}

impl RemoteFs for SftpSession {
    fn put(&mut self, path: &str, bytes: &[u8], target: &str) -> Result<(), TransferError> {
        let mut file = self
            .sftp(target)?
            .create(Path::new(path))
            .map_err(|e| TransferError::transfer(target, e))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| TransferError::transfer(target, e))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        self.sftp(to)?
            .rename(
                Path::new(from),
                Path::new(to),
                Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE),
            )
            .map_err(|e| TransferError::transfer(to, e))
    }

    fn exists(&mut self, path: &str) -> bool {
        self.sftp
            .as_ref()
            .is_some_and(|sftp| sftp.stat(Path::new(path)).is_ok())
    }

    fn remove(&mut self, path: &str, target: &str) -> Result<(), TransferError> {
        self.sftp(target)?
            .unlink(Path::new(path))
            .map_err(|e| TransferError::transfer(target, e))
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        drop(self.sftp.take());
        if let Err(e) = self.session.disconnect(None, "arkconf done", None) {
            log::debug!("{}: disconnect failed: {}", self.name, e);
        }
    }
}
