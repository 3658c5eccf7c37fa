//! In-process log transport.
//!
//! [`MemoryLog`] is a cloneable handle onto a byte buffer standing in for the
//! server log. Tests and embedders append to it, rotate or delete it, and
//! inject connection failures while a reader tails it through
//! [`MemoryTransport`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::transport::LogTransport;
use crate::{Result, TimingError};

#[derive(Debug)]
struct MemoryState {
    data: Vec<u8>,
    exists: bool,
    reject_auth: bool,
    open_failures: u32,
    io_failures: u32,
    opens: u32,
}

/// Shared handle to an in-memory log file.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    inner: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    /// Empty, existing log.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                data: Vec::new(),
                exists: true,
                reject_auth: false,
                open_failures: 0,
                io_failures: 0,
                opens: 0,
            })),
        }
    }

    pub fn with_content(content: &str) -> Self {
        let log = Self::new();
        log.append(content);
        log
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, text: &str) {
        self.append_bytes(text.as_bytes());
    }

    pub fn append_bytes(&self, bytes: &[u8]) {
        self.state().data.extend_from_slice(bytes);
    }

    /// Replace the file with new (usually shorter) content, like a log rotation.
    pub fn rotate(&self, content: &str) {
        let mut state = self.state();
        state.data = content.as_bytes().to_vec();
        state.exists = true;
    }

    /// Remove the file. Opens fail with a missing-file error until it is
    /// rotated back in.
    pub fn delete(&self) {
        let mut state = self.state();
        state.data.clear();
        state.exists = false;
    }

    pub fn reject_auth(&self, reject: bool) {
        self.state().reject_auth = reject;
    }

    /// Fail the next `count` opens with a transport error.
    pub fn fail_next_opens(&self, count: u32) {
        self.state().open_failures = count;
    }

    /// Fail the next `count` size/read calls with a transport error.
    pub fn fail_next_io(&self, count: u32) {
        self.state().io_failures = count;
    }

    /// How many times a transport opened this log successfully.
    pub fn open_count(&self) -> u32 {
        self.state().opens
    }

    pub fn len(&self) -> usize {
        self.state().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().data.is_empty()
    }
}

/// Transport reading a [`MemoryLog`].
#[derive(Debug)]
pub struct MemoryTransport {
    log: MemoryLog,
    open: bool,
}

impl MemoryTransport {
    pub fn new(log: MemoryLog) -> Self {
        Self { log, open: false }
    }

    pub fn log(&self) -> &MemoryLog {
        &self.log
    }

    fn check_io(&mut self) -> Result<()> {
        if !self.open {
            return Err(TimingError::NotConnected);
        }
        let mut state = self.log.state();
        if state.io_failures > 0 {
            state.io_failures -= 1;
            drop(state);
            self.open = false;
            return Err(TimingError::transport_failed(self.describe(), "injected I/O failure"));
        }
        if !state.exists {
            return Err(TimingError::missing_file("memory"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogTransport for MemoryTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = self.log.state();
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(TimingError::transport_failed("memory", "injected connect failure"));
        }
        if state.reject_auth {
            return Err(TimingError::Authentication {
                host: "memory".to_string(),
                username: "test".to_string(),
            });
        }
        if !state.exists {
            return Err(TimingError::missing_file("memory"));
        }
        state.opens += 1;
        drop(state);
        self.open = true;
        Ok(())
    }

    async fn file_size(&mut self) -> Result<u64> {
        self.check_io()?;
        Ok(self.log.len() as u64)
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_io()?;
        let state = self.log.state();
        let start = (offset as usize).min(state.data.len());
        let end = start.saturating_add(len).min(state.data.len());
        trace!(offset, len, returned = end - start, "Memory read");
        Ok(state.data[start..end].to_vec())
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
