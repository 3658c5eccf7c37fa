//! Local file transport, for tailing a log on this machine or replaying a
//! downloaded one.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::transport::LogTransport;
use crate::{Result, TimingError};

pub struct LocalFileTransport {
    path: PathBuf,
    file: Option<File>,
}

impl LocalFileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_io(&self, e: std::io::Error) -> TimingError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TimingError::missing_file(self.path.display().to_string())
        } else {
            TimingError::file_error(self.path.clone(), e)
        }
    }
}

#[async_trait::async_trait]
impl LogTransport for LocalFileTransport {
    async fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).await.map_err(|e| self.map_io(e))?;
        debug!(path = %self.path.display(), "Opened local log");
        self.file = Some(file);
        Ok(())
    }

    async fn file_size(&mut self) -> Result<u64> {
        // Stat by path so a rotated file (new inode) is noticed.
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) => {
                self.file = None;
                Err(self.map_io(e))
            }
        }
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        // Reopen each read so rotation replaces the handle.
        let mut file = File::open(&self.path).await.map_err(|e| self.map_io(e))?;
        file.seek(SeekFrom::Start(offset)).await.map_err(|e| self.map_io(e))?;
        let mut buf = Vec::with_capacity(len);
        (&mut file)
            .take(len as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| self.map_io(e))?;
        self.file = Some(file);
        Ok(buf)
    }

    async fn close(&mut self) {
        self.file = None;
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
