//! Race timing stopwatches driven by command-block chat in a game server log.
//!
//! Skitime tails the server's log file (over SFTP or locally), picks out the
//! chat lines emitted by command blocks and turns recognised phrases into
//! start/stop/lap/select actions on named timers.
//!
//! # Pipeline
//!
//! - [`reader::RemoteLogReader`] tracks a byte cursor over a [`transport::LogTransport`],
//!   survives rotation and reconnects with bounded retries
//! - [`parser`] extracts [`types::ChatEvent`]s from complete lines
//! - [`classifier::CommandClassifier`] maps messages to [`types::Command`]s with a
//!   priority rule table and a heuristic fallback
//! - [`dispatcher::Dispatcher`] applies commands to the [`timer::TimerRegistry`]
//!   and keeps the audit trail
//! - [`session::RaceSession`] owns all timer state on one task and publishes snapshots
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use skitime::{Skitime, config::Settings, types::RefreshRate};
//!
//! #[tokio::main]
//! async fn main() -> skitime::Result<()> {
//!     let settings = Settings::load("skitime.yaml")?;
//!     let race = Skitime::connect(&settings).await?;
//!     let mut display = race.session.display(RefreshRate::Hz(2));
//!
//!     while let Some(timers) = display.next().await {
//!         for timer in timers {
//!             println!("{:>2}. {:<16} {}", timer.number, timer.name, timer.formatted);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod classifier;
pub mod config;
pub mod dispatcher;
mod error;
mod format;
pub mod monitor;
pub mod parser;
pub mod reader;
pub mod session;
pub mod stats;
pub mod timer;
pub mod transport;
pub mod transports;
pub mod types;

use std::path::Path;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::{Result, TimingError};
pub use format::{format_time, is_valid_time_input, parse_duration};

pub use classifier::{CommandClassifier, Verdict};
pub use config::Settings;
pub use monitor::{Monitor, MonitorEvent, MonitorStatus};
pub use reader::RemoteLogReader;
pub use session::{RaceSession, RegistrySnapshot, SessionCommand, SessionHandle};
pub use timer::{Timer, TimerId, TimerRegistry, TimerView};
pub use transport::LogTransport;
pub use types::{Action, ChatEvent, Command, Location, RefreshRate};

use transports::{LocalFileTransport, SftpTransport};

/// A running monitor feeding a race session.
pub struct Race {
    pub session: SessionHandle,
    /// Status of the log polling task
    pub monitor: watch::Receiver<MonitorStatus>,
    monitor_cancel: CancellationToken,
}

impl Race {
    /// Stop polling, then stop the session and take it back.
    pub async fn stop(self) -> Option<RaceSession> {
        self.monitor_cancel.cancel();
        self.session.shutdown().await
    }
}

/// Entry point that wires a transport, reader, monitor and session together.
pub struct Skitime;

impl Skitime {
    /// Monitor the remote log described by `settings.connection`.
    ///
    /// # Errors
    ///
    /// Returns the first connection failure as one of the distinct
    /// connection conditions (authentication, transport, missing file),
    /// or a configuration error.
    pub async fn connect(settings: &Settings) -> Result<Race> {
        settings.validate()?;
        let reader = settings.reader_settings();
        let transport = SftpTransport::new(settings.connection.clone(), reader.io_timeout);
        Self::start(transport, settings).await
    }

    /// Tail a local copy of the log instead of the remote file.
    pub async fn open(path: impl AsRef<Path>, settings: &Settings) -> Result<Race> {
        settings.validate_local()?;
        Self::start(LocalFileTransport::new(path.as_ref()), settings).await
    }

    /// Connect `transport` and spawn the monitor and session for it.
    pub async fn start<T: LogTransport>(transport: T, settings: &Settings) -> Result<Race> {
        let mut reader = RemoteLogReader::new(transport, settings.reader_settings());
        reader.connect().await?;
        info!(endpoint = %reader.describe(), cursor = reader.cursor(), "Log connected");

        let session = RaceSession::from_settings(settings)?;
        let monitor = Monitor::spawn(reader, settings.monitor_settings());
        let session = session.spawn(monitor.events);

        Ok(Race {
            session,
            monitor: monitor.status,
            monitor_cancel: monitor.cancel,
        })
    }
}
