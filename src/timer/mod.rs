//! Stopwatches and the ordered registry that owns them.
//!
//! A [`Timer`] accumulates elapsed time over any number of start/stop
//! segments and records laps while running. Every operation has an `_at`
//! variant taking an explicit [`Instant`] so the clock can be driven from
//! tests; the plain variants read [`Instant::now`].
//!
//! Redundant requests are no-ops: starting a running timer, stopping a stopped
//! one, or recording a lap on a stopped timer leave the timer untouched.

mod registry;

pub use registry::{LapEntry, TimerId, TimerRegistry};

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::format::format_time;

/// How long a freshly recorded lap stays highlighted.
pub const POST_LAP_DISPLAY: Duration = Duration::from_secs(3);

/// A named stopwatch for one competitor.
#[derive(Debug, Clone)]
pub struct Timer {
    id: TimerId,
    name: String,
    display_number: usize,
    running: bool,
    accumulated: Duration,
    segment_start: Option<Instant>,
    lap_times: Vec<Duration>,
    last_lap: Option<Duration>,
    just_completed_lap: bool,
    lap_completed_at: Option<Instant>,
}

impl Timer {
    pub(crate) fn new(id: TimerId, name: impl Into<String>, display_number: usize) -> Self {
        Self {
            id,
            name: name.into(),
            display_number,
            running: false,
            accumulated: Duration::ZERO,
            segment_start: None,
            lap_times: Vec::new(),
            last_lap: None,
            just_completed_lap: false,
            lap_completed_at: None,
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based position in the registry.
    pub fn display_number(&self) -> usize {
        self.display_number
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn lap_times(&self) -> &[Duration] {
        &self.lap_times
    }

    pub fn lap_count(&self) -> usize {
        self.lap_times.len()
    }

    pub fn last_lap(&self) -> Option<Duration> {
        self.last_lap
    }

    pub fn just_completed_lap(&self) -> bool {
        self.just_completed_lap
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start the clock. No-op if already running.
    pub fn start_at(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.segment_start = Some(now);
        self.just_completed_lap = false;
    }

    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    /// Stop the clock, folding the running segment into the total. No-op if stopped.
    pub fn stop_at(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        if let Some(start) = self.segment_start.take() {
            self.accumulated += now.saturating_duration_since(start);
        }
        self.running = false;
    }

    pub fn record_lap(&mut self) -> Option<Duration> {
        self.record_lap_at(Instant::now())
    }

    /// Record the current elapsed time as a lap.
    ///
    /// Returns the recorded lap, or `None` when the timer is not running (the
    /// request is dropped).
    pub fn record_lap_at(&mut self, now: Instant) -> Option<Duration> {
        if !self.running {
            return None;
        }
        let lap = self.elapsed_at(now);
        self.lap_times.push(lap);
        self.last_lap = Some(lap);
        self.just_completed_lap = true;
        self.lap_completed_at = Some(now);
        Some(lap)
    }

    /// Clear all time and laps and leave the timer stopped.
    pub fn reset(&mut self) {
        self.running = false;
        self.segment_start = None;
        self.accumulated = Duration::ZERO;
        self.lap_times.clear();
        self.last_lap = None;
        self.just_completed_lap = false;
        self.lap_completed_at = None;
    }

    /// Replace the name. Empty or whitespace-only names are rejected.
    pub fn rename(&mut self, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.name = trimmed.to_string();
        true
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        match (self.running, self.segment_start) {
            (true, Some(start)) => self.accumulated + now.saturating_duration_since(start),
            _ => self.accumulated,
        }
    }

    /// Whether the last lap is still inside the highlight window.
    pub fn showing_lap(&self, now: Instant) -> bool {
        match (self.just_completed_lap, self.lap_completed_at) {
            (true, Some(at)) => now.saturating_duration_since(at) < POST_LAP_DISPLAY,
            _ => false,
        }
    }

    pub(crate) fn set_display_number(&mut self, number: usize) {
        self.display_number = number;
    }

    pub(crate) fn set_name_unchecked(&mut self, name: String) {
        self.name = name;
    }

    /// Render a point-in-time view for display.
    pub fn view_at(&self, now: Instant) -> TimerView {
        let elapsed = self.elapsed_at(now);
        TimerView {
            id: self.id,
            number: self.display_number,
            name: self.name.clone(),
            running: self.running,
            elapsed,
            formatted: format_time(elapsed),
            laps: self.lap_times.len(),
            last_lap: self.last_lap.map(format_time),
            showing_lap: self.showing_lap(now),
        }
    }
}

/// Display-ready state of one timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    pub id: TimerId,
    pub number: usize,
    pub name: String,
    pub running: bool,
    pub elapsed: Duration,
    pub formatted: String,
    pub laps: usize,
    pub last_lap: Option<String>,
    pub showing_lap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn timer() -> Timer {
        Timer::new(TimerId(1), "Иванов", 1)
    }

    #[test]
    fn accumulates_across_segments() {
        let t0 = Instant::now();
        let mut t = timer();
        t.start_at(t0);
        t.stop_at(t0 + Duration::from_secs(5));
        t.start_at(t0 + Duration::from_secs(10));
        assert_eq!(t.elapsed_at(t0 + Duration::from_secs(12)), Duration::from_secs(7));
        t.stop_at(t0 + Duration::from_secs(13));
        assert_eq!(t.elapsed_at(t0 + Duration::from_secs(100)), Duration::from_secs(8));
    }

    #[test]
    fn double_start_keeps_original_segment() {
        let t0 = Instant::now();
        let mut t = timer();
        t.start_at(t0);
        t.start_at(t0 + Duration::from_secs(3));
        assert_eq!(t.elapsed_at(t0 + Duration::from_secs(4)), Duration::from_secs(4));
    }

    #[test]
    fn lap_on_stopped_timer_is_dropped() {
        let mut t = timer();
        assert_eq!(t.record_lap(), None);
        assert_eq!(t.lap_count(), 0);
        assert!(!t.just_completed_lap());
    }

    #[test]
    fn lap_sets_post_lap_window() {
        let t0 = Instant::now();
        let mut t = timer();
        t.start_at(t0);
        let lap = t.record_lap_at(t0 + Duration::from_secs(30));
        assert_eq!(lap, Some(Duration::from_secs(30)));
        assert_eq!(t.last_lap(), Some(Duration::from_secs(30)));
        assert!(t.showing_lap(t0 + Duration::from_secs(31)));
        assert!(!t.showing_lap(t0 + Duration::from_secs(34)));
        assert!(t.is_running());
    }

    #[test]
    fn start_clears_post_lap_flag() {
        let t0 = Instant::now();
        let mut t = timer();
        t.start_at(t0);
        t.record_lap_at(t0 + Duration::from_secs(1));
        t.stop_at(t0 + Duration::from_secs(2));
        t.start_at(t0 + Duration::from_secs(2));
        assert!(!t.just_completed_lap());
    }

    #[test]
    fn rename_rejects_blank_names() {
        let mut t = timer();
        assert!(!t.rename("   "));
        assert_eq!(t.name(), "Иванов");
        assert!(t.rename("  Петров "));
        assert_eq!(t.name(), "Петров");
    }

    #[test]
    fn view_formats_elapsed_time() {
        let t0 = Instant::now();
        let mut t = timer();
        t.start_at(t0);
        let view = t.view_at(t0 + Duration::from_millis(61_500));
        assert_eq!(view.formatted, "01:01.50");
        assert!(view.running);
        assert_eq!(view.number, 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Stop,
        Lap,
        Wait(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Start),
            Just(Op::Stop),
            Just(Op::Lap),
            (1u64..5_000u64).prop_map(Op::Wait),
        ]
    }

    proptest! {
        #[test]
        fn elapsed_is_monotonic_and_frozen_while_stopped(ops in prop::collection::vec(op(), 0..60)) {
            let t0 = Instant::now();
            let mut now = t0;
            let mut t = timer();
            let mut previous = Duration::ZERO;

            for op in ops {
                match op {
                    Op::Start => t.start_at(now),
                    Op::Stop => t.stop_at(now),
                    Op::Lap => { t.record_lap_at(now); }
                    Op::Wait(ms) => {
                        let was_running = t.is_running();
                        let before = t.elapsed_at(now);
                        now += Duration::from_millis(ms);
                        let after = t.elapsed_at(now);
                        if was_running {
                            prop_assert_eq!(after, before + Duration::from_millis(ms));
                        } else {
                            prop_assert_eq!(after, before);
                        }
                    }
                }
                let current = t.elapsed_at(now);
                prop_assert!(current >= previous);
                previous = current;
            }

            t.reset();
            prop_assert_eq!(t.elapsed_at(now), Duration::ZERO);
            prop_assert!(t.lap_times().is_empty());
            prop_assert!(!t.is_running());
        }

        #[test]
        fn laps_never_recorded_while_stopped(laps in 0usize..20) {
            let mut t = timer();
            for _ in 0..laps {
                t.record_lap();
            }
            prop_assert_eq!(t.lap_count(), 0);
        }
    }
}
