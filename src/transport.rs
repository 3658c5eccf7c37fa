//! Transport trait for the tailed log file

use crate::Result;

/// Random-access view of a single append-only log file.
///
/// Transports abstract over where the file lives (SFTP server, local disk,
/// memory). The reader owns the cursor; transports only answer size and
/// range queries, so a reconnect never loses position.
#[async_trait::async_trait]
pub trait LogTransport: Send + 'static {
    /// Open the session and verify the file exists.
    ///
    /// Fails with [`TimingError::Authentication`](crate::TimingError::Authentication),
    /// [`TimingError::Transport`](crate::TimingError::Transport) or
    /// [`TimingError::MissingFile`](crate::TimingError::MissingFile).
    async fn open(&mut self) -> Result<()>;

    /// Current size of the file in bytes.
    async fn file_size(&mut self) -> Result<u64>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// May return fewer bytes than asked for; never more.
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Release the session. Safe to call when already closed.
    async fn close(&mut self);

    /// Endpoint description for logs, e.g. `user@host:22/logs/latest.log`.
    fn describe(&self) -> String;
}
