//! Per-server transfer errors

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Why a server's transfer failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// TCP connect, SSH handshake or SFTP channel setup failed
    #[error("connection to {host} failed: {message}")]
    Connect { host: String, message: String },

    /// The server rejected the credentials
    #[error("authentication as {user} failed: {message}")]
    Auth { user: String, message: String },

    /// A remote read or write failed part way through the file set
    #[error("transfer of {path} failed: {message}")]
    Transfer { path: String, message: String },

    /// Reading or writing the local flat store failed
    #[error("local file {path}: {message}")]
    LocalIo { path: String, message: String },

    /// The run was cancelled before this server started
    #[error("cancelled before the transfer started")]
    Cancelled,

    /// The worker running this server panicked or was aborted
    #[error("worker failed: {0}")]
    Worker(String),
}

impl TransferError {
    pub fn connect(host: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Connect {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn auth(user: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Auth {
            user: user.into(),
            message: message.to_string(),
        }
    }

    pub fn transfer(path: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Transfer {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn local_io(path: impl Into<String>, message: impl ToString) -> Self {
        TransferError::LocalIo {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Connect { .. } => "connect",
            TransferError::Auth { .. } => "auth",
            TransferError::Transfer { .. } => "transfer",
            TransferError::LocalIo { .. } => "local_io",
            TransferError::Cancelled => "cancelled",
            TransferError::Worker(_) => "worker",
        }
    }
}

impl Serialize for TransferError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TransferError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
