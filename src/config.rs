//! YAML settings for the monitor, reader, classifier and display.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working local setup. Only the connection section has to be filled in for
//! SFTP monitoring.
//!
//! ```rust
//! use skitime::config::Settings;
//!
//! let settings = Settings::from_yaml_str(
//!     "connection:\n  host: mc.example.org\n  username: steve\ntimers:\n  names: [Иванов, Петров]\n",
//! )
//! .unwrap();
//! assert_eq!(settings.connection.port, 22);
//! assert_eq!(settings.timers.names.len(), 2);
//! assert!(settings.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{DEFAULT_MAX_HEURISTIC_WORDS, Vocabulary};
use crate::monitor::MonitorSettings;
use crate::reader::{MIN_READ, ReaderSettings};
use crate::transports::SftpConfig;
use crate::types::RefreshRate;
use crate::{Result, TimingError};

/// Environment variable that overrides `connection.password`.
pub const PASSWORD_ENV: &str = "SKITIME_SSH_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: SftpConfig,
    pub reader: ReaderSection,
    pub monitor: MonitorSection,
    pub classifier: ClassifierSection,
    pub timers: TimersSection,
    pub audit: AuditSection,
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub look_back_bytes: u64,
    pub read_cap_bytes: usize,
    pub io_timeout_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            look_back_bytes: 5000,
            read_cap_bytes: 100 * 1024,
            io_timeout_ms: 30_000,
            reconnect_attempts: 3,
            reconnect_backoff_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub max_heuristic_words: usize,
    /// Replaces the built-in command set when present
    pub vocabulary: Option<Vocabulary>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            max_heuristic_words: DEFAULT_MAX_HEURISTIC_WORDS,
            vocabulary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimersSection {
    pub default_label: String,
    pub names: Vec<String>,
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            default_label: "Секундомер".to_string(),
            names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    pub enabled: bool,
    pub directory: PathBuf,
    pub capacity: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("."),
            capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// 0 means refresh only on change
    pub refresh_hz: u32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self { refresh_hz: 20 }
    }
}

impl Settings {
    /// Load settings from a YAML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TimingError::file_error(path.to_path_buf(), e))?;
        let mut settings = Self::from_yaml_str(&text)?;
        settings.apply_env();
        debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|e| TimingError::parse("settings YAML", e.to_string()))
    }

    pub fn apply_env(&mut self) {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                self.connection.password = password;
            }
        }
    }

    /// Checks needed before SFTP monitoring can start.
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            return Err(TimingError::config("connection.host is empty"));
        }
        self.validate_local()
    }

    /// Checks that apply to every transport.
    pub fn validate_local(&self) -> Result<()> {
        if self.connection.remote_path.trim().is_empty() {
            return Err(TimingError::config("connection.remote_path is empty"));
        }
        if self.reader.read_cap_bytes < MIN_READ {
            return Err(TimingError::config(format!(
                "reader.read_cap_bytes must be at least {}",
                MIN_READ
            )));
        }
        if self.reader.reconnect_attempts == 0 {
            return Err(TimingError::config("reader.reconnect_attempts must be positive"));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(TimingError::config("monitor.poll_interval_ms must be positive"));
        }
        if let Some(vocabulary) = &self.classifier.vocabulary {
            vocabulary.validate()?;
        }
        Ok(())
    }

    pub fn reader_settings(&self) -> ReaderSettings {
        ReaderSettings {
            look_back: self.reader.look_back_bytes,
            read_cap: self.reader.read_cap_bytes,
            io_timeout: Duration::from_millis(self.reader.io_timeout_ms),
            reconnect_attempts: self.reader.reconnect_attempts,
            reconnect_backoff: Duration::from_millis(self.reader.reconnect_backoff_ms),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
            queue_capacity: self.monitor.queue_capacity,
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.classifier.vocabulary.clone().unwrap_or_default()
    }

    pub fn refresh_rate(&self) -> RefreshRate {
        RefreshRate::Hz(self.display.refresh_hz).normalize()
    }
}
