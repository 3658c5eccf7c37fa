//! Cursor-tracking tail reader over a [`LogTransport`].
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (Reading <-> Idle)
//!       ^                                          |
//!       +------------------ failure ---------------+
//! ```
//!
//! The reader owns the byte cursor. A file that shrinks between polls is
//! treated as rotated and reread from the start; lines in the overlap may be
//! processed twice, which the timer actions tolerate.

use std::fmt;
use std::time::Duration;

use encoding_rs::WINDOWS_1251;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::transport::LogTransport;
use crate::{Result, TimingError};

/// Smallest read that always holds a complete UTF-8 character.
pub const MIN_READ: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReaderState {
    Disconnected,
    Connecting,
    Connected,
    Reading,
    Idle,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reader tuning.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    /// Bytes before the end of file to start from on first connect
    pub look_back: u64,
    /// Upper bound for a single read; never below [`MIN_READ`]
    pub read_cap: usize,
    /// Bound on every transport call
    pub io_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_backoff: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            look_back: 5_000,
            read_cap: 100 * 1024,
            io_timeout: Duration::from_secs(30),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Newly appended text
    Data(String),
    /// Nothing new
    Idle,
    /// The file shrank; the cursor was reset to the start
    Rotated,
}

impl ReadOutcome {
    pub fn into_text(self) -> Option<String> {
        match self {
            ReadOutcome::Data(text) => Some(text),
            _ => None,
        }
    }
}

pub struct RemoteLogReader<T: LogTransport> {
    transport: T,
    settings: ReaderSettings,
    state: ReaderState,
    cursor: u64,
    /// Skip to the next line boundary before yielding text
    align: bool,
    connected_once: bool,
}

impl<T: LogTransport> RemoteLogReader<T> {
    pub fn new(transport: T, settings: ReaderSettings) -> Self {
        Self {
            transport,
            settings,
            state: ReaderState::Disconnected,
            cursor: 0,
            align: false,
            connected_once: false,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    async fn open_and_stat(&mut self) -> Result<u64> {
        let duration = self.settings.io_timeout;
        bounded(duration, self.transport.open()).await?;
        bounded(duration, self.transport.file_size()).await
    }

    fn start_with_look_back(&mut self, size: u64) {
        let start = size.saturating_sub(self.settings.look_back);
        if start > 0 {
            // Include the byte before the window so a window starting exactly
            // on a line boundary keeps its first line.
            self.cursor = start - 1;
            self.align = true;
        } else {
            self.cursor = 0;
            self.align = false;
        }
    }

    /// Open the transport and position the cursor a look-back window before
    /// the end of the file.
    pub async fn connect(&mut self) -> Result<()> {
        self.state = ReaderState::Connecting;
        info!(endpoint = %self.transport.describe(), "Connecting log reader");
        match self.open_and_stat().await {
            Ok(size) => {
                self.start_with_look_back(size);
                self.state = ReaderState::Connected;
                self.connected_once = true;
                info!(size, cursor = self.cursor, "Log reader connected");
                Ok(())
            }
            Err(e) => {
                self.state = ReaderState::Disconnected;
                warn!(error = %e, "Log reader connect failed");
                Err(e)
            }
        }
    }

    /// Poll for newly appended text.
    pub async fn read_new_data(&mut self) -> Result<ReadOutcome> {
        if matches!(self.state, ReaderState::Disconnected | ReaderState::Connecting) {
            return Err(TimingError::NotConnected);
        }

        let size = match bounded(self.settings.io_timeout, self.transport.file_size()).await {
            Ok(size) => size,
            Err(e) => return Err(self.fail(e)),
        };

        if size < self.cursor {
            info!(size, cursor = self.cursor, "Log shrank, assuming rotation");
            self.cursor = 0;
            self.align = false;
            self.state = ReaderState::Idle;
            return Ok(ReadOutcome::Rotated);
        }
        if size == self.cursor {
            self.state = ReaderState::Idle;
            return Ok(ReadOutcome::Idle);
        }

        self.state = ReaderState::Reading;
        let available = size - self.cursor;
        let cap = self.settings.read_cap.max(MIN_READ);
        let want = available.min(cap as u64) as usize;
        if (want as u64) < available {
            debug!(available, cap, "Read capped");
        }

        let bytes = match bounded(self.settings.io_timeout, self.transport.read_at(self.cursor, want)).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };
        if bytes.is_empty() {
            self.state = ReaderState::Idle;
            return Ok(ReadOutcome::Idle);
        }

        let mut body: &[u8] = &bytes;
        if self.align {
            match body.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    self.cursor += newline as u64 + 1;
                    body = &body[newline + 1..];
                    self.align = false;
                }
                None => {
                    self.cursor += body.len() as u64;
                    self.state = ReaderState::Idle;
                    return Ok(ReadOutcome::Idle);
                }
            }
        }

        let (text, consumed) = decode(body);
        self.cursor += consumed as u64;
        trace!(read = bytes.len(), consumed, cursor = self.cursor, "Read chunk");
        self.state = ReaderState::Idle;
        if text.is_empty() {
            Ok(ReadOutcome::Idle)
        } else {
            Ok(ReadOutcome::Data(text))
        }
    }

    fn fail(&mut self, e: TimingError) -> TimingError {
        warn!(error = %e, "Log read failed");
        self.state = ReaderState::Disconnected;
        e
    }

    pub async fn disconnect(&mut self) {
        self.transport.close().await;
        self.state = ReaderState::Disconnected;
    }

    pub async fn reconnect(&mut self) -> Result<()> {
        self.reconnect_with(|_| {}).await
    }

    /// Close, then retry opening with a fixed backoff before each attempt.
    ///
    /// The cursor survives when the file has not shrunk; otherwise the
    /// look-back rule is applied again. `on_attempt` sees each attempt number.
    pub async fn reconnect_with<F>(&mut self, mut on_attempt: F) -> Result<()>
    where
        F: FnMut(u32) + Send,
    {
        self.disconnect().await;
        let attempts = self.settings.reconnect_attempts;
        let mut last = String::from("no attempts configured");

        for attempt in 1..=attempts {
            on_attempt(attempt);
            tokio::time::sleep(self.settings.reconnect_backoff).await;
            info!(attempt, attempts, "Reconnecting log reader");
            self.state = ReaderState::Connecting;

            match self.open_and_stat().await {
                Ok(size) => {
                    if !self.connected_once {
                        self.start_with_look_back(size);
                        self.connected_once = true;
                    } else if size < self.cursor {
                        info!(size, cursor = self.cursor, "Log shrank while disconnected");
                        self.start_with_look_back(size);
                    }
                    self.state = ReaderState::Connected;
                    info!(attempt, cursor = self.cursor, "Log reader reconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Reconnect attempt failed");
                    self.state = ReaderState::Disconnected;
                    last = e.to_string();
                    self.transport.close().await;
                }
            }
        }

        Err(TimingError::ReconnectExhausted { attempts, last })
    }
}

/// Run a transport call under the I/O timeout.
async fn bounded<F, R>(duration: Duration, fut: F) -> Result<R>
where
    F: std::future::Future<Output = Result<R>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(TimingError::Timeout { duration }),
    }
}

/// Decode a chunk, holding back an incomplete UTF-8 sequence at the end.
///
/// Returns the text and how many bytes it consumed. Invalid UTF-8 falls back
/// to windows-1251 for the whole chunk.
fn decode(bytes: &[u8]) -> (String, usize) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), bytes.len()),
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&bytes[..valid]).into_owned();
            (text, valid)
        }
        Err(_) => {
            let (text, _, _) = WINDOWS_1251.decode(bytes);
            (text.into_owned(), bytes.len())
        }
    }
}
