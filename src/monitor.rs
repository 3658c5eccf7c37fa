//! Monitor spawns and manages the log polling task

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::parser::{LineAssembler, process_batch};
use crate::reader::{ReadOutcome, ReaderState, RemoteLogReader};
use crate::transport::LogTransport;
use crate::types::ChatEvent;

/// Polling tuning.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            queue_capacity: 1024,
        }
    }
}

/// Messages from the polling task to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Chat(ChatEvent),
    /// The task gave up; the string is the operator-facing reason
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MonitorStatus {
    Connecting,
    Running,
    Reconnecting { attempt: u32 },
    Stopped,
    Failed(String),
}

/// Result of spawning the monitor task
pub struct MonitorChannels {
    /// Parsed chat events, in log order
    pub events: mpsc::Receiver<MonitorEvent>,
    /// Current task status
    pub status: watch::Receiver<MonitorStatus>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Monitor spawns and manages the log polling task
///
/// The task owns the reader, polls it on a fixed interval, assembles complete
/// lines and forwards parsed chat events over a bounded queue. Transport
/// failures trigger the reader's bounded reconnect; when that is exhausted
/// the task reports [`MonitorEvent::Fatal`] and ends.
pub struct Monitor;

impl Monitor {
    /// Spawn the polling task for the given reader
    ///
    /// The reader may already be connected; otherwise the task connects it.
    pub fn spawn<T>(reader: RemoteLogReader<T>, settings: MonitorSettings) -> MonitorChannels
    where
        T: LogTransport,
    {
        let (events_tx, events_rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(MonitorStatus::Connecting);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::poll_task(reader, settings, events_tx, status_tx, cancel_task).await;
        });

        MonitorChannels {
            events: events_rx,
            status: status_rx,
            cancel,
        }
    }

    async fn poll_task<T>(
        mut reader: RemoteLogReader<T>,
        settings: MonitorSettings,
        events_tx: mpsc::Sender<MonitorEvent>,
        status_tx: watch::Sender<MonitorStatus>,
        cancel: CancellationToken,
    ) where
        T: LogTransport,
    {
        info!(endpoint = %reader.describe(), "Log monitor started");
        let mut lines = LineAssembler::new();
        let mut forwarded = 0u64;

        if reader.state() == ReaderState::Disconnected {
            let connected = tokio::select! {
                _ = cancel.cancelled() => None,
                result = reader.connect() => Some(result),
            };
            match connected {
                None => {
                    Self::finish(&mut reader, &status_tx, forwarded).await;
                    return;
                }
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Initial connect failed");
                    if !Self::recover(&mut reader, &events_tx, &status_tx, &cancel).await {
                        Self::finish(&mut reader, &status_tx, forwarded).await;
                        return;
                    }
                }
            }
        }
        status_tx.send_replace(MonitorStatus::Running);

        'poll: loop {
            if cancel.is_cancelled() {
                info!("Log monitor cancelled");
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Log monitor cancelled during read");
                    break;
                }
                result = reader.read_new_data() => result,
            };

            match result {
                Ok(ReadOutcome::Data(text)) => {
                    if let Some(complete) = lines.push(&text) {
                        for event in process_batch(&complete) {
                            trace!(%event, "Chat event");
                            forwarded += 1;
                            let sent = tokio::select! {
                                _ = cancel.cancelled() => break 'poll,
                                sent = events_tx.send(MonitorEvent::Chat(event)) => sent,
                            };
                            if sent.is_err() {
                                debug!("Event receiver dropped, shutting down");
                                break 'poll;
                            }
                        }
                    }
                }
                Ok(ReadOutcome::Rotated) => {
                    lines.clear();
                }
                Ok(ReadOutcome::Idle) => {}
                Err(e) => {
                    error!(error = %e, "Log read failed");
                    if !Self::recover(&mut reader, &events_tx, &status_tx, &cancel).await {
                        break;
                    }
                    status_tx.send_replace(MonitorStatus::Running);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Log monitor cancelled");
                    break;
                }
                _ = tokio::time::sleep(settings.poll_interval) => {}
            }
        }

        Self::finish(&mut reader, &status_tx, forwarded).await;
    }

    /// Run the bounded reconnect. Returns false when the task must end.
    async fn recover<T>(
        reader: &mut RemoteLogReader<T>,
        events_tx: &mpsc::Sender<MonitorEvent>,
        status_tx: &watch::Sender<MonitorStatus>,
        cancel: &CancellationToken,
    ) -> bool
    where
        T: LogTransport,
    {
        let result = tokio::select! {
            _ = cancel.cancelled() => return false,
            result = reader.reconnect_with(|attempt| {
                status_tx.send_replace(MonitorStatus::Reconnecting { attempt });
            }) => result,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Log monitor giving up");
                let reason = e.to_string();
                status_tx.send_replace(MonitorStatus::Failed(reason.clone()));
                let _ = events_tx.send(MonitorEvent::Fatal(reason)).await;
                false
            }
        }
    }

    async fn finish<T>(
        reader: &mut RemoteLogReader<T>,
        status_tx: &watch::Sender<MonitorStatus>,
        forwarded: u64,
    ) where
        T: LogTransport,
    {
        reader.disconnect().await;
        status_tx.send_if_modified(|status| {
            if matches!(status, MonitorStatus::Failed(_)) {
                false
            } else {
                *status = MonitorStatus::Stopped;
                true
            }
        });
        info!(forwarded, "Log monitor ended");
    }
}
