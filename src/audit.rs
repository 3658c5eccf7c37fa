//! Operator-facing audit trail.
//!
//! Separate from diagnostic `tracing` output: [`AuditLog`] keeps a capped
//! in-memory history and fans entries out over a broadcast channel, and
//! [`AuditFile`] appends one dated line per chat event to a daily file from
//! its own writer task.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use crate::types::ChatEvent;

/// Broadcast buffer for live audit subscribers.
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Ignored,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Success => "OK",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
            Severity::Ignored => "IGNORED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Local>,
    pub severity: Severity,
    pub text: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.at.format("%H:%M:%S"), self.severity, self.text)
    }
}

/// Capped, append-only audit history with live subscribers.
#[derive(Debug)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
    tx: broadcast::Sender<AuditEntry>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            tx,
        }
    }

    pub fn push(&mut self, severity: Severity, text: impl Into<String>) {
        let entry = AuditEntry {
            at: Local::now(),
            severity,
            text: text.into(),
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        // No receivers is fine.
        let _ = self.tx.send(entry.clone());
        self.entries.push_back(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.tx.subscribe()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Daily plaintext history of command block messages.
///
/// Lines are queued to a writer task so the caller never blocks on disk.
/// Writes are best-effort: failures are logged at debug level and dropped.
#[derive(Debug, Clone)]
pub struct AuditFile {
    directory: PathBuf,
    tx: mpsc::UnboundedSender<WriteJob>,
}

#[derive(Debug)]
enum WriteJob {
    Line { path: PathBuf, line: String },
    Flush(oneshot::Sender<()>),
}

impl AuditFile {
    /// Start the writer task. Must be called from within a tokio runtime.
    ///
    /// The task exits once every clone of the handle is dropped.
    pub fn spawn(directory: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(rx));
        Self {
            directory: directory.into(),
            tx,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file for the given day.
    pub fn path_for(&self, day: DateTime<Local>) -> PathBuf {
        self.directory
            .join(format!("command_blocks_history_{}.txt", day.format("%Y%m%d")))
    }

    pub fn append(&self, event: &ChatEvent) {
        self.append_at(Local::now(), event);
    }

    pub fn append_at(&self, now: DateTime<Local>, event: &ChatEvent) {
        let job = WriteJob::Line {
            path: self.path_for(now),
            line: format!("{} - {}\n", now.format("%Y-%m-%d %H:%M:%S"), event),
        };
        if self.tx.send(job).is_err() {
            debug!("Audit writer gone, line dropped");
        }
    }

    /// Wait until every line queued so far has been written or dropped.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteJob::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn write_lines(mut rx: mpsc::UnboundedReceiver<WriteJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Line { path, line } => {
                if let Err(e) = append_line(&path, &line).await {
                    debug!(path = %path.display(), error = %e, "Audit file write failed");
                }
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Audit writer stopped");
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
