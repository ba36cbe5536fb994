//! In-process transport for tests
//!
//! Hosts are keyed by [`ServerSpec::host`]. Each host has a password, a
//! file tree and optional injected failures. Like an SFTP version 3 server,
//! a rename onto an existing file fails.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arkconf_core::ServerSpec;

use crate::error::TransferError;
use crate::transport::{replace_file, RemoteFs, RemoteSession, Transport};

#[derive(Debug, Default)]
struct MockHost {
    credential: String,
    files: BTreeMap<String, Vec<u8>>,
    unreachable: bool,
    failing: HashSet<String>,
    connections: usize,
}

#[derive(Debug, Default)]
struct MockState {
    hosts: HashMap<String, MockHost>,
    latency: Duration,
}

/// Mock transport for testing without network access
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock transport lock poisoned")
    }

    /// Add a host accepting `credential`
    pub fn with_host(self, host: &str, credential: &str) -> Self {
        self.lock().hosts.entry(host.to_string()).or_default().credential = credential.to_string();
        self
    }

    /// Put a file on a host
    pub fn with_file(self, host: &str, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.lock()
            .hosts
            .entry(host.to_string())
            .or_default()
            .files
            .insert(path.to_string(), bytes.into());
        self
    }

    /// Refuse connections to a host
    pub fn with_unreachable(self, host: &str) -> Self {
        self.lock().hosts.entry(host.to_string()).or_default().unreachable = true;
        self
    }

    /// Fail every read, rename onto and removal of `path` on a host
    pub fn with_failing_path(self, host: &str, path: &str) -> Self {
        self.lock()
            .hosts
            .entry(host.to_string())
            .or_default()
            .failing
            .insert(path.to_string());
        self
    }

    /// Sleep this long inside every connect
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Current content of a remote file
    pub fn file(&self, host: &str, path: &str) -> Option<Vec<u8>> {
        self.lock().hosts.get(host).and_then(|h| h.files.get(path).cloned())
    }

    /// Every file path on a host
    pub fn paths(&self, host: &str) -> Vec<String> {
        self.lock()
            .hosts
            .get(host)
            .map(|h| h.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful connections to a host
    pub fn connections(&self, host: &str) -> usize {
        self.lock().hosts.get(host).map_or(0, |h| h.connections)
    }

    /// Most sessions open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Sessions open right now
    pub fn open_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn connect(&self, server: &ServerSpec) -> Result<Box<dyn RemoteSession>, TransferError> {
        let endpoint = format!("{}:{}", server.host, server.port);
        let latency = self.lock().latency;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let session = MockSession {
            transport: self.clone(),
            host: server.host.clone(),
        };

        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = self.lock();
        let host = match state.hosts.get_mut(&server.host) {
            Some(host) if !host.unreachable => host,
            _ => return Err(TransferError::connect(endpoint, "connection refused")),
        };
        if host.credential != server.credential {
            return Err(TransferError::auth(&server.user, "password rejected"));
        }
        host.connections += 1;
        drop(state);

        Ok(Box::new(session))
    }
}

struct MockSession {
    transport: MockTransport,
    host: String,
}

impl MockSession {
    fn with_host<T>(
        &self,
        path: &str,
        f: impl FnOnce(&mut MockHost) -> Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let mut state = self.transport.lock();
        let host = state
            .hosts
            .get_mut(&self.host)
            .ok_or_else(|| TransferError::transfer(path, "host vanished"))?;
        if host.failing.contains(path) {
            return Err(TransferError::transfer(path, "injected failure"));
        }
        f(host)
    }
}

impl RemoteSession for MockSession {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, TransferError> {
        self.with_host(path, |host| {
            host.files
                .get(path)
                .cloned()
                .ok_or_else(|| TransferError::transfer(path, "no such file"))
        })
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError> {
        replace_file(self, path, bytes)
    }
}

impl RemoteFs for MockSession {
    fn put(&mut self, path: &str, bytes: &[u8], target: &str) -> Result<(), TransferError> {
        self.with_host(path, |host| {
            host.files.insert(path.to_string(), bytes.to_vec());
            Ok(())
        })
        .map_err(|e| TransferError::transfer(target, e))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        self.with_host(to, |host| {
            if host.files.contains_key(to) {
                return Err(TransferError::transfer(to, "failure"));
            }
            let bytes = host
                .files
                .remove(from)
                .ok_or_else(|| TransferError::transfer(to, "no such file"))?;
            host.files.insert(to.to_string(), bytes);
            Ok(())
        })
    }

    fn exists(&mut self, path: &str) -> bool {
        self.transport
            .lock()
            .hosts
            .get(&self.host)
            .is_some_and(|h| h.files.contains_key(path))
    }

    fn remove(&mut self, path: &str, target: &str) -> Result<(), TransferError> {
        self.with_host(path, |host| {
            host.files
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| TransferError::transfer(target, "no such file"))
        })
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.transport.active.fetch_sub(1, Ordering::SeqCst);
    }
}
