//! SFTP transport for a remote server log.
//!
//! `ssh2` is a blocking client, so every call runs on the blocking pool and
//! is bounded by the configured I/O timeout. A timed out or failed call drops
//! the session; the reader reconnects through [`LogTransport::open`].

use std::io::{Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ssh2::{ErrorCode, Session, Sftp};
use tracing::{debug, info, warn};

use crate::transport::LogTransport;
use crate::{Result, TimingError};

/// libssh2 `LIBSSH2_ERROR_AUTHENTICATION_FAILED`.
const AUTH_FAILED: i32 = -18;
/// SFTP `SSH_FX_NO_SUCH_FILE`.
const NO_SUCH_FILE: i32 = 2;

/// Where the log lives and how to log in.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_path: String,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            password: String::new(),
            remote_path: "/logs/latest.log".to_string(),
        }
    }
}

impl std::fmt::Debug for SftpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

impl SftpConfig {
    fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

struct SftpSession {
    session: Session,
    sftp: Sftp,
}

pub struct SftpTransport {
    config: SftpConfig,
    io_timeout: Duration,
    conn: Option<Arc<Mutex<SftpSession>>>,
}

impl SftpTransport {
    pub fn new(config: SftpConfig, io_timeout: Duration) -> Self {
        Self {
            config,
            io_timeout,
            conn: None,
        }
    }

    pub fn config(&self) -> &SftpConfig {
        &self.config
    }

    /// Run a blocking call against the open session, bounded by the I/O timeout.
    async fn blocking<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SftpSession, &SftpConfig) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone().ok_or(TimingError::NotConnected)?;
        let config = self.config.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|p| p.into_inner());
            f(&mut guard, &config)
        });

        let result = match tokio::time::timeout(self.io_timeout, task).await {
            Err(_) => Err(TimingError::Timeout {
                duration: self.io_timeout,
            }),
            Ok(Err(join)) => Err(TimingError::transport_failed(
                self.config.endpoint(),
                format!("blocking task failed: {}", join),
            )),
            Ok(Ok(result)) => result,
        };

        if let Err(e) = &result {
            if e.is_connection_error() {
                warn!(endpoint = %self.config.endpoint(), error = %e, "Dropping SFTP session");
                self.conn = None;
            }
        }
        result
    }
}

fn map_ssh_error(err: ssh2::Error, config: &SftpConfig) -> TimingError {
    match err.code() {
        ErrorCode::Session(AUTH_FAILED) => TimingError::Authentication {
            host: config.host.clone(),
            username: config.username.clone(),
        },
        ErrorCode::SFTP(NO_SUCH_FILE) => TimingError::missing_file(config.remote_path.clone()),
        _ => TimingError::transport_failed_with_source(
            config.endpoint(),
            err.message().to_string(),
            Box::new(err),
        ),
    }
}

fn connect_blocking(config: &SftpConfig, timeout: Duration) -> Result<SftpSession> {
    let endpoint = config.endpoint();
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| {
            TimingError::transport_failed_with_source(&endpoint, "address lookup failed", Box::new(e))
        })?
        .next()
        .ok_or_else(|| TimingError::transport_failed(&endpoint, "host resolved to no address"))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
        TimingError::transport_failed_with_source(&endpoint, "TCP connect failed", Box::new(e))
    })?;

    let mut session = Session::new().map_err(|e| map_ssh_error(e, config))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake().map_err(|e| map_ssh_error(e, config))?;
    session
        .userauth_password(&config.username, &config.password)
        .map_err(|e| map_ssh_error(e, config))?;
    if !session.authenticated() {
        return Err(TimingError::Authentication {
            host: config.host.clone(),
            username: config.username.clone(),
        });
    }

    let sftp = session.sftp().map_err(|e| map_ssh_error(e, config))?;
    sftp.stat(&PathBuf::from(&config.remote_path))
        .map_err(|e| map_ssh_error(e, config))?;

    Ok(SftpSession { session, sftp })
}

#[async_trait::async_trait]
impl LogTransport for SftpTransport {
    async fn open(&mut self) -> Result<()> {
        self.close().await;
        info!(endpoint = %self.config.endpoint(), path = %self.config.remote_path, "Connecting over SFTP");

        let config = self.config.clone();
        let timeout = self.io_timeout;
        let task = tokio::task::spawn_blocking(move || connect_blocking(&config, timeout));
        let session = match tokio::time::timeout(timeout, task).await {
            Err(_) => return Err(TimingError::Timeout { duration: timeout }),
            Ok(Err(join)) => {
                return Err(TimingError::transport_failed(
                    self.config.endpoint(),
                    format!("connect task failed: {}", join),
                ));
            }
            Ok(Ok(result)) => result?,
        };

        self.conn = Some(Arc::new(Mutex::new(session)));
        info!(endpoint = %self.config.endpoint(), "SFTP session established");
        Ok(())
    }

    async fn file_size(&mut self) -> Result<u64> {
        self.blocking(|s, config| {
            let stat = s
                .sftp
                .stat(&PathBuf::from(&config.remote_path))
                .map_err(|e| map_ssh_error(e, config))?;
            Ok(stat.size.unwrap_or(0))
        })
        .await
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.blocking(move |s, config| {
            let mut file = s
                .sftp
                .open(&PathBuf::from(&config.remote_path))
                .map_err(|e| map_ssh_error(e, config))?;
            let io_err = |e: std::io::Error| {
                TimingError::transport_failed_with_source(config.endpoint(), "remote read failed", Box::new(e))
            };
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
            let mut buf = Vec::with_capacity(len);
            file.take(len as u64).read_to_end(&mut buf).map_err(io_err)?;
            Ok(buf)
        })
        .await
    }

    async fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let closed = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|p| p.into_inner());
            let _ = guard.session.disconnect(None, "skitime closing", None);
        });
        if tokio::time::timeout(self.io_timeout, closed).await.is_err() {
            debug!(endpoint = %self.config.endpoint(), "SFTP disconnect timed out");
        }
    }

    fn describe(&self) -> String {
        format!("{}{}", self.config.endpoint(), self.config.remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SftpConfig {
        SftpConfig {
            host: "mc.example.org".into(),
            username: "steve".into(),
            password: "hunter2".into(),
            ..SftpConfig::default()
        }
    }

    #[test]
    fn ssh_errors_map_to_connection_conditions() {
        let cfg = config();
        let auth = map_ssh_error(ssh2::Error::new(ErrorCode::Session(AUTH_FAILED), "denied"), &cfg);
        assert!(matches!(auth, TimingError::Authentication { .. }));

        let missing = map_ssh_error(ssh2::Error::new(ErrorCode::SFTP(NO_SUCH_FILE), "no file"), &cfg);
        assert!(matches!(missing, TimingError::MissingFile { ref path } if path == "/logs/latest.log"));

        let other = map_ssh_error(ssh2::Error::new(ErrorCode::Session(-7), "socket send"), &cfg);
        assert!(matches!(other, TimingError::Transport { .. }));
    }

    #[test]
    fn password_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("mc.example.org"));
    }

    #[tokio::test]
    async fn calls_before_open_report_not_connected() {
        let mut transport = SftpTransport::new(config(), Duration::from_secs(1));
        assert!(matches!(transport.file_size().await, Err(TimingError::NotConnected)));
        assert_eq!(transport.describe(), "steve@mc.example.org:22/logs/latest.log");
        transport.close().await;
    }
}
