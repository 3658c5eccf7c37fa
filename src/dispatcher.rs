//! Applies classified commands to the timer registry.

use std::time::Instant;

use tracing::{debug, info};

use crate::audit::{AuditEntry, AuditLog, Severity};
use crate::classifier::Verdict;
use crate::format::format_time;
use crate::timer::TimerRegistry;
use crate::types::{Action, Command};

/// Translates verdicts into registry calls and keeps the processed/ignored
/// counters and audit trail.
#[derive(Debug)]
pub struct Dispatcher {
    processed: u64,
    ignored: u64,
    audit: AuditLog,
}

impl Dispatcher {
    pub fn new(audit_capacity: usize) -> Self {
        Self {
            processed: 0,
            ignored: 0,
            audit: AuditLog::new(audit_capacity),
        }
    }

    pub fn processed_count(&self) -> u64 {
        self.processed
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }

    /// Share of handled messages that produced a command, in percent.
    /// 100 before anything has been handled.
    pub fn accuracy(&self) -> f64 {
        let total = self.processed + self.ignored;
        if total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / total as f64
        }
    }

    pub fn reset_statistics(&mut self) {
        self.processed = 0;
        self.ignored = 0;
        self.audit.push(Severity::Info, "Statistics reset");
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AuditEntry> {
        self.audit.subscribe()
    }

    /// Apply every verdict for one message.
    pub fn handle(
        &mut self,
        registry: &mut TimerRegistry,
        message: &str,
        verdicts: &[Verdict],
        now: Instant,
    ) {
        for verdict in verdicts {
            match verdict {
                Verdict::Dispatch(command) => {
                    self.apply(registry, command, now);
                }
                Verdict::Ignored(reason) => {
                    self.ignored += 1;
                    debug!(message, %reason, "Message ignored");
                    self.audit
                        .push(Severity::Ignored, format!("'{}' ({})", message, reason));
                }
            }
        }
    }

    /// Apply one command and return the audit text it produced.
    ///
    /// Every command counts as processed, even when the timer-level action
    /// turns out to be a no-op. Commands naming a timer that no longer
    /// exists count as ignored.
    pub fn apply(&mut self, registry: &mut TimerRegistry, command: &Command, now: Instant) -> String {
        let (severity, text) = match self.execute(registry, command, now) {
            Some(text) => {
                self.processed += 1;
                (Severity::Success, text)
            }
            None => {
                self.ignored += 1;
                let name = command.target.as_deref().unwrap_or_default();
                (Severity::Warning, format!("Unknown timer '{}' for {}", name, command.action))
            }
        };
        info!(action = %command.action, target = ?command.target, tier = ?command.tier, "{}", text);
        self.audit.push(severity, text.clone());
        text
    }

    fn execute(&mut self, registry: &mut TimerRegistry, command: &Command, now: Instant) -> Option<String> {
        if command.action.is_general() {
            return Some(match command.action {
                Action::StartAll => {
                    registry.start_all_at(now);
                    "Started all timers".to_string()
                }
                Action::StopAll => {
                    registry.stop_all_at(now);
                    "Stopped all timers".to_string()
                }
                Action::LapAll => {
                    let count = registry.lap_all_at(now);
                    format!("lap for {} timers", count)
                }
                Action::ResetAll => {
                    registry.reset_all();
                    "Reset all timers".to_string()
                }
                _ => unreachable!("general action"),
            });
        }

        let target = command.target.as_deref()?;
        let id = registry.find_by_name(target)?.id();

        if command.action == Action::Select {
            registry.select(id);
            return Some(format!("Selected: {}", target));
        }

        let timer = registry.get_mut(id)?;
        let name = timer.name().to_string();
        let text = match command.action {
            Action::Start if timer.is_running() => format!("{} already running", name),
            Action::Start => {
                timer.start_at(now);
                format!("Started: {}", name)
            }
            Action::Stop => match timer.record_lap_at(now) {
                Some(total) => {
                    timer.stop_at(now);
                    format!("Finished: {} ({})", name, format_time(total))
                }
                None => format!("{} not running, stop dropped", name),
            },
            Action::Lap => match (timer.record_lap_at(now), command.lap_number) {
                (Some(lap), Some(number)) => {
                    format!("Lap {}: {} ({})", number, name, format_time(lap))
                }
                (Some(lap), None) => format!("Lap: {} ({})", name, format_time(lap)),
                (None, _) => format!("{} not running, lap dropped", name),
            },
            _ => unreachable!("named action"),
        };
        Some(text)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(500)
    }
}
