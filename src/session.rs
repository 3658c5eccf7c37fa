//! Race session: the single owner of timer state.
//!
//! [`RaceSession`] consumes chat events from the [`Monitor`](crate::monitor::Monitor)
//! and manual [`SessionCommand`]s, applies them to the [`TimerRegistry`] and
//! publishes a [`RegistrySnapshot`] after every change. Display code reads
//! snapshots only; it never touches the registry directly.

use std::time::Instant;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditFile, Severity};
use crate::classifier::CommandClassifier;
use crate::config::Settings;
use crate::dispatcher::Dispatcher;
use crate::monitor::MonitorEvent;
use crate::stats::{ChatHistory, ChatStats};
use crate::timer::{LapEntry, TimerId, TimerRegistry, TimerView};
use crate::types::{ChatEvent, RefreshRate};
use crate::{Result, TimingError};

const COMMAND_QUEUE: usize = 64;

/// Operator requests for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start(TimerId),
    /// Stops without recording a lap
    Stop(TimerId),
    Lap(TimerId),
    Reset(TimerId),
    StartAll,
    StopAll,
    LapAll,
    ResetAll,
    Add { name: Option<String> },
    Remove(TimerId),
    Rename { id: TimerId, name: String },
    Select(TimerId),
    ClearSelection,
    /// Whether chat messages are classified at all
    SetAutoMode(bool),
    ResetStatistics,
}

/// Point-in-time copy of everything a display needs.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub registry: TimerRegistry,
    pub processed: u64,
    pub ignored: u64,
    pub accuracy: f64,
    pub messages: u64,
    pub auto_mode: bool,
    /// Set once the monitor has given up
    pub fatal: Option<String>,
}

impl RegistrySnapshot {
    /// Timer views with elapsed time computed at `now`.
    pub fn views_at(&self, now: Instant) -> Vec<TimerView> {
        self.registry.iter().map(|t| t.view_at(now)).collect()
    }

    pub fn views(&self) -> Vec<TimerView> {
        self.views_at(Instant::now())
    }

    pub fn selected_view(&self, now: Instant) -> Option<TimerView> {
        self.registry.selected().map(|t| t.view_at(now))
    }

    pub fn laps_by_number(&self) -> std::collections::BTreeMap<usize, Vec<LapEntry>> {
        self.registry.laps_by_number()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            timers: self.registry.len(),
            running: self.registry.running_count(),
            laps: self.registry.total_laps(),
            processed: self.processed,
            ignored: self.ignored,
            accuracy: self.accuracy,
            messages: self.messages,
            auto_mode: self.auto_mode,
        }
    }
}

/// Counters for a status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub timers: usize,
    pub running: usize,
    pub laps: usize,
    pub processed: u64,
    pub ignored: u64,
    pub accuracy: f64,
    pub messages: u64,
    pub auto_mode: bool,
}

pub struct RaceSession {
    registry: TimerRegistry,
    classifier: CommandClassifier,
    dispatcher: Dispatcher,
    stats: ChatStats,
    history: ChatHistory,
    audit_file: Option<AuditFile>,
    auto_mode: bool,
    fatal: Option<String>,
}

impl RaceSession {
    pub fn new(registry: TimerRegistry, classifier: CommandClassifier, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            classifier,
            dispatcher,
            stats: ChatStats::default(),
            history: ChatHistory::default(),
            audit_file: None,
            auto_mode: true,
            fatal: None,
        }
    }

    /// Build a session from the timers, classifier and audit sections.
    ///
    /// With the audit file enabled this starts its writer task, so it must
    /// run inside a tokio runtime.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = TimerRegistry::with_names(&settings.timers.default_label, &settings.timers.names);
        let classifier =
            CommandClassifier::new(settings.vocabulary(), settings.classifier.max_heuristic_words)?;
        let dispatcher = Dispatcher::new(settings.audit.capacity);
        let mut session = Self::new(registry, classifier, dispatcher);
        if settings.audit.enabled {
            session = session.with_audit_file(AuditFile::spawn(&settings.audit.directory));
        }
        Ok(session)
    }

    pub fn with_audit_file(mut self, file: AuditFile) -> Self {
        self.audit_file = Some(file);
        self
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> &ChatStats {
        &self.stats
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            registry: self.registry.clone(),
            processed: self.dispatcher.processed_count(),
            ignored: self.dispatcher.ignored_count(),
            accuracy: self.dispatcher.accuracy(),
            messages: self.stats.total_messages,
            auto_mode: self.auto_mode,
            fatal: self.fatal.clone(),
        }
    }

    pub fn handle_monitor_event(&mut self, event: MonitorEvent, now: Instant) {
        match event {
            MonitorEvent::Chat(chat) => self.handle_chat(chat, now),
            MonitorEvent::Fatal(reason) => {
                warn!(%reason, "Monitoring stopped");
                self.dispatcher
                    .audit_mut()
                    .push(Severity::Error, format!("Monitoring stopped: {}", reason));
                self.fatal = Some(reason);
            }
        }
    }

    /// Record one chat event and, in auto mode, act on it.
    pub fn handle_chat(&mut self, event: ChatEvent, now: Instant) {
        self.stats.record(&event);
        if let Some(file) = &self.audit_file {
            file.append(&event);
        }
        self.dispatcher.audit_mut().push(Severity::Info, event.to_string());

        if self.auto_mode {
            let names = self.registry.names();
            let verdicts = self.classifier.classify(&event.message, &names);
            self.dispatcher
                .handle(&mut self.registry, &event.message, &verdicts, now);
        }
        self.history.push(event);
    }

    pub fn execute(&mut self, command: SessionCommand, now: Instant) {
        debug!(?command, "Session command");
        let text = match command {
            SessionCommand::Start(id) => self.with_timer(id, "start", |t| {
                t.start_at(now);
                format!("Manual start: {}", t.name())
            }),
            SessionCommand::Stop(id) => self.with_timer(id, "stop", |t| {
                t.stop_at(now);
                format!("Manual stop: {}", t.name())
            }),
            SessionCommand::Lap(id) => self.with_timer(id, "lap", |t| match t.record_lap_at(now) {
                Some(lap) => format!("Manual lap: {} ({})", t.name(), crate::format_time(lap)),
                None => format!("{} not running, lap dropped", t.name()),
            }),
            SessionCommand::Reset(id) => self.with_timer(id, "reset", |t| {
                t.reset();
                format!("Reset: {}", t.name())
            }),
            SessionCommand::StartAll => {
                self.registry.start_all_at(now);
                Some("Started all timers".to_string())
            }
            SessionCommand::StopAll => {
                self.registry.stop_all_at(now);
                Some("Stopped all timers".to_string())
            }
            SessionCommand::LapAll => {
                let count = self.registry.lap_all_at(now);
                Some(format!("lap for {} timers", count))
            }
            SessionCommand::ResetAll => {
                self.registry.reset_all();
                Some("Reset all timers".to_string())
            }
            SessionCommand::Add { name } => {
                let id = self.registry.add(name.as_deref());
                self.classifier.invalidate();
                self.registry
                    .get(id)
                    .map(|t| format!("Added timer {}: {}", t.display_number(), t.name()))
            }
            SessionCommand::Remove(id) => {
                let name = self.registry.get(id).map(|t| t.name().to_string());
                if self.registry.remove(id) {
                    self.classifier.invalidate();
                    name.map(|n| format!("Removed timer: {}", n))
                } else {
                    self.warn("Cannot remove the last timer".to_string());
                    None
                }
            }
            SessionCommand::Rename { id, name } => {
                let old = self.registry.get(id).map(|t| t.name().to_string());
                if self.registry.rename(id, &name) {
                    self.classifier.invalidate();
                    old.map(|o| format!("Renamed {} to {}", o, name.trim()))
                } else {
                    self.warn(format!("Rename to '{}' rejected", name));
                    None
                }
            }
            SessionCommand::Select(id) => {
                if self.registry.select(id) {
                    self.registry.selected().map(|t| format!("Selected: {}", t.name()))
                } else {
                    self.warn(format!("Unknown timer {}", id));
                    None
                }
            }
            SessionCommand::ClearSelection => {
                self.registry.clear_selection();
                None
            }
            SessionCommand::SetAutoMode(enabled) => {
                self.auto_mode = enabled;
                info!(enabled, "Auto mode changed");
                Some(format!("Auto mode {}", if enabled { "on" } else { "off" }))
            }
            SessionCommand::ResetStatistics => {
                self.dispatcher.reset_statistics();
                self.stats = ChatStats::default();
                self.history.clear();
                None
            }
        };
        if let Some(text) = text {
            self.dispatcher.audit_mut().push(Severity::Info, text);
        }
    }

    fn with_timer<F>(&mut self, id: TimerId, op: &str, f: F) -> Option<String>
    where
        F: FnOnce(&mut crate::timer::Timer) -> String,
    {
        match self.registry.get_mut(id) {
            Some(timer) => Some(f(timer)),
            None => {
                self.warn(format!("Unknown timer {} for {}", id, op));
                None
            }
        }
    }

    fn warn(&mut self, text: String) {
        warn!("{}", text);
        self.dispatcher.audit_mut().push(Severity::Warning, text);
    }

    /// Move the session onto its own task.
    ///
    /// The task ends when cancelled or when every command sender is gone;
    /// a closed event queue only stops chat processing.
    pub fn spawn(self, events: mpsc::Receiver<MonitorEvent>) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let (snapshot_tx, snapshot_rx) = watch::channel(self.snapshot());
        let audit = self.dispatcher.subscribe();
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(self.run(events, commands_rx, snapshot_tx, cancel_task));

        SessionHandle {
            commands: commands_tx,
            snapshots: snapshot_rx,
            audit,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<MonitorEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
        snapshot_tx: watch::Sender<RegistrySnapshot>,
        cancel: CancellationToken,
    ) -> Self {
        info!(timers = self.registry.len(), "Race session started");
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.execute(command, Instant::now()),
                    None => {
                        debug!("All command senders dropped");
                        break;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_monitor_event(event, Instant::now()),
                    None => {
                        debug!("Monitor event queue closed");
                        events_open = false;
                        continue;
                    }
                },
            }
            snapshot_tx.send_replace(self.snapshot());
        }

        if let Some(file) = &self.audit_file {
            file.flush().await;
        }
        info!(
            processed = self.dispatcher.processed_count(),
            ignored = self.dispatcher.ignored_count(),
            "Race session ended"
        );
        self
    }
}

/// Handle to a spawned [`RaceSession`].
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<RegistrySnapshot>,
    /// Audit trail entries as they are produced
    pub audit: broadcast::Receiver<AuditEntry>,
    pub cancel: CancellationToken,
    task: JoinHandle<RaceSession>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TimingError::SessionClosed)
    }

    pub fn command_sender(&self) -> mpsc::Sender<SessionCommand> {
        self.commands.clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<RegistrySnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn display(&self, rate: RefreshRate) -> BoxStream<'static, Vec<TimerView>> {
        display_stream(self.snapshots(), rate)
    }

    /// Cancel the task and take the session back.
    pub async fn shutdown(self) -> Option<RaceSession> {
        self.cancel.cancel();
        self.task.await.ok()
    }
}

/// Timer views driven by registry snapshots.
///
/// `OnChange` yields the current state immediately and then after every
/// change. `Hz(n)` yields on a fixed tick so running clocks advance between
/// changes. Both end once the session is gone.
pub fn display_stream(
    snapshots: watch::Receiver<RegistrySnapshot>,
    rate: RefreshRate,
) -> BoxStream<'static, Vec<TimerView>> {
    match rate.tick_interval() {
        None => WatchStream::new(snapshots)
            .map(|snapshot| snapshot.views_at(Instant::now()))
            .boxed(),
        Some(period) => {
            let state: (Option<Interval>, _) = (None, snapshots);
            stream::unfold(state, move |(ticker, snapshots)| async move {
                let mut ticker = ticker.unwrap_or_else(|| {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker
                });
                ticker.tick().await;
                if snapshots.has_changed().is_err() {
                    return None;
                }
                let views = snapshots.borrow().views_at(Instant::now());
                Some((views, (Some(ticker), snapshots)))
            })
            .boxed()
        }
    }
}
