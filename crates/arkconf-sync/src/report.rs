//! Per-server results of a pull or push

use serde::Serialize;

use crate::engine::Operation;
use crate::error::TransferError;

/// Outcome for one server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub server: String,
    pub operation: Operation,
    /// Files moved, in configured order
    pub transferred: Vec<String>,
    /// Files not pushed because they were missing locally
    pub skipped: Vec<String>,
    pub error: Option<TransferError>,
}

impl SyncResult {
    pub fn new(server: impl Into<String>, operation: Operation) -> Self {
        Self {
            server: server.into(),
            operation,
            transferred: Vec::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn failed(server: impl Into<String>, operation: Operation, error: TransferError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(server, operation)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Results of one run, one entry per selected server in selection order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    operation: Operation,
    results: Vec<SyncResult>,
}

impl SyncReport {
    pub fn new(operation: Operation, results: Vec<SyncResult>) -> Self {
        Self { operation, results }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn results(&self) -> &[SyncResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
