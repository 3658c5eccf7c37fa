//! Ordered timer collection with positional numbering.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use super::Timer;

/// Stable identity of a timer, independent of its name and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recorded lap, as shown in the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LapEntry {
    pub timer: TimerId,
    pub name: String,
    pub time: Duration,
}

/// Ordered collection of timers; insertion order is display order.
///
/// The registry is never empty: construction creates a first timer and
/// [`remove`](Self::remove) refuses to drop the last one.
#[derive(Debug, Clone)]
pub struct TimerRegistry {
    timers: Vec<Timer>,
    next_id: u64,
    selected: Option<TimerId>,
    default_label: String,
}

impl TimerRegistry {
    /// Registry with one default-named timer.
    pub fn new(default_label: impl Into<String>) -> Self {
        let mut registry = Self {
            timers: Vec::new(),
            next_id: 1,
            selected: None,
            default_label: default_label.into(),
        };
        registry.add(None);
        registry
    }

    /// Registry seeded with the given names. Falls back to one default timer
    /// when `names` is empty. Repeated names are handled as in [`add`](Self::add).
    pub fn with_names<I, S>(default_label: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self {
            timers: Vec::new(),
            next_id: 1,
            selected: None,
            default_label: default_label.into(),
        };
        for name in names {
            registry.add(Some(name.as_ref()));
        }
        if registry.timers.is_empty() {
            registry.add(None);
        }
        registry
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    fn default_name(&self, number: usize) -> String {
        format!("{} {}", self.default_label, number)
    }

    /// Append a timer. Blank or missing names, and names already held by
    /// another timer (case-insensitive), get the default `"<label> <n>"`.
    pub fn add(&mut self, name: Option<&str>) -> TimerId {
        let number = self.timers.len() + 1;
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() && !self.name_taken(n, None) => n.to_string(),
            Some(n) if !n.is_empty() => {
                tracing::debug!(name = n, "Name in use, timer gets the default name");
                self.default_name(number)
            }
            _ => self.default_name(number),
        };
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer::new(id, name, number));
        tracing::debug!(timer = %id, number, "Timer added");
        id
    }

    /// Remove a timer and renumber the rest.
    ///
    /// Returns `false` when the timer is unknown or is the last one left.
    pub fn remove(&mut self, id: TimerId) -> bool {
        if self.timers.len() <= 1 {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        self.timers.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.renumber();
        tracing::debug!(timer = %id, remaining = self.timers.len(), "Timer removed");
        true
    }

    /// Reassign display numbers 1..N. Only names still equal to the default
    /// pattern for their old number follow the new number.
    fn renumber(&mut self) {
        for index in 0..self.timers.len() {
            let new_number = index + 1;
            let old_number = self.timers[index].display_number();
            if old_number == new_number {
                continue;
            }
            let old_default = self.default_name(old_number);
            if self.timers[index].name() == old_default {
                let renamed = self.default_name(new_number);
                self.timers[index].set_name_unchecked(renamed);
            }
            self.timers[index].set_display_number(new_number);
        }
    }

    /// Rename a timer. Rejects blank names and names that already belong to
    /// another timer (case-insensitive).
    pub fn rename(&mut self, id: TimerId, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }
        if self.name_taken(trimmed, Some(id)) {
            tracing::debug!(timer = %id, name = trimmed, "Rename rejected, name in use");
            return false;
        }
        match self.get_mut(id) {
            Some(timer) => timer.rename(trimmed),
            None => false,
        }
    }

    fn name_taken(&self, name: &str, except: Option<TimerId>) -> bool {
        let lowered = name.to_lowercase();
        self.timers
            .iter()
            .any(|t| Some(t.id()) != except && t.name().to_lowercase() == lowered)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    pub fn get(&self, id: TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id() == id)
    }

    pub fn get_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id() == id)
    }

    fn position(&self, id: TimerId) -> Option<usize> {
        self.timers.iter().position(|t| t.id() == id)
    }

    /// Case-insensitive exact lookup. First match in registry order wins.
    pub fn find_by_name(&self, name: &str) -> Option<&Timer> {
        let wanted = name.trim().to_lowercase();
        self.timers.iter().find(|t| t.name().to_lowercase() == wanted)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Timer> {
        let wanted = name.trim().to_lowercase();
        self.timers
            .iter_mut()
            .find(|t| t.name().to_lowercase() == wanted)
    }

    /// Current names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.timers.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn start_all(&mut self) {
        self.start_all_at(Instant::now());
    }

    pub fn start_all_at(&mut self, now: Instant) {
        for timer in &mut self.timers {
            timer.start_at(now);
        }
    }

    pub fn stop_all(&mut self) {
        self.stop_all_at(Instant::now());
    }

    pub fn stop_all_at(&mut self, now: Instant) {
        for timer in &mut self.timers {
            timer.stop_at(now);
        }
    }

    /// Reset every timer and clear the selection.
    pub fn reset_all(&mut self) {
        for timer in &mut self.timers {
            timer.reset();
        }
        self.selected = None;
    }

    pub fn lap_all(&mut self) -> usize {
        self.lap_all_at(Instant::now())
    }

    /// Record a lap on every running timer and return how many were lapped.
    pub fn lap_all_at(&mut self, now: Instant) -> usize {
        self.timers
            .iter_mut()
            .filter_map(|t| t.record_lap_at(now))
            .count()
    }

    pub fn running_count(&self) -> usize {
        self.timers.iter().filter(|t| t.is_running()).count()
    }

    pub fn total_laps(&self) -> usize {
        self.timers.iter().map(Timer::lap_count).sum()
    }

    /// Every recorded lap grouped by lap number (1-based), each group sorted
    /// by time ascending.
    pub fn laps_by_number(&self) -> BTreeMap<usize, Vec<LapEntry>> {
        let mut grouped: BTreeMap<usize, Vec<LapEntry>> = BTreeMap::new();
        for timer in &self.timers {
            for (index, time) in timer.lap_times().iter().enumerate() {
                grouped.entry(index + 1).or_default().push(LapEntry {
                    timer: timer.id(),
                    name: timer.name().to_string(),
                    time: *time,
                });
            }
        }
        for entries in grouped.values_mut() {
            entries.sort_by_key(|e| e.time);
        }
        grouped
    }

    pub fn selected(&self) -> Option<&Timer> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Select a timer for the enlarged view. Unknown ids are rejected.
    pub fn select(&mut self, id: TimerId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new("Секундомер")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry(names: &[&str]) -> TimerRegistry {
        TimerRegistry::with_names("Секундомер", names)
    }

    #[test]
    fn starts_with_one_default_timer() {
        let reg = TimerRegistry::default();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.names(), vec!["Секундомер 1"]);
    }

    #[test]
    fn last_timer_cannot_be_removed() {
        let mut reg = TimerRegistry::default();
        let only = reg.iter().next().unwrap().id();
        assert!(!reg.remove(only));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn removal_renumbers_default_names_only() {
        let mut reg = TimerRegistry::default();
        let second = reg.add(None);
        let third = reg.add(None);
        let fourth = reg.add(None);
        assert!(reg.rename(fourth, "Петров"));
        let first = reg.iter().next().unwrap().id();

        assert!(reg.remove(first));
        assert_eq!(reg.names(), vec!["Секундомер 1", "Секундомер 2", "Петров"]);
        assert_eq!(reg.get(second).unwrap().display_number(), 1);
        assert_eq!(reg.get(third).unwrap().display_number(), 2);
        assert_eq!(reg.get(fourth).unwrap().display_number(), 3);
    }

    #[test]
    fn rename_rejects_case_insensitive_duplicates() {
        let mut reg = registry(&["Иванов", "Петров"]);
        let petrov = reg.find_by_name("петров").unwrap().id();
        assert!(!reg.rename(petrov, "ИВАНОВ"));
        assert!(reg.rename(petrov, "Петров"));
        assert!(reg.rename(petrov, "Сидоров"));
    }

    #[test]
    fn added_duplicates_fall_back_to_default_names() {
        let reg = registry(&["Иванов", "ИВАНОВ", " иванов ", "Петров"]);
        assert_eq!(reg.names(), vec!["Иванов", "Секундомер 2", "Секундомер 3", "Петров"]);

        let mut reg = registry(&["Иванов"]);
        let id = reg.add(Some("иванов"));
        assert_eq!(reg.get(id).unwrap().name(), "Секундомер 2");
        let id = reg.add(Some("Петров"));
        assert_eq!(reg.get(id).unwrap().name(), "Петров");
    }

    #[test]
    fn find_by_name_prefers_first_in_order() {
        // Renumbering can collide with a user-typed name that looks like a default.
        let mut reg = registry(&["Иванов", "Петров"]);
        let shifted = reg.add(None);
        let typed = reg.add(Some("Иванов-2"));
        assert!(reg.rename(typed, "Секундомер 2"));
        let first = reg.iter().next().unwrap().id();
        assert!(reg.remove(first));

        assert_eq!(reg.names(), vec!["Петров", "Секундомер 2", "Секундомер 2"]);
        let found = reg.find_by_name("секундомер 2").unwrap();
        assert_eq!(found.id(), shifted);
        assert_ne!(found.id(), typed);
    }

    #[test]
    fn lap_all_counts_only_running_timers() {
        let t0 = Instant::now();
        let mut reg = registry(&["A", "B", "C"]);
        let a = reg.find_by_name("A").unwrap().id();
        let b = reg.find_by_name("B").unwrap().id();
        reg.get_mut(a).unwrap().start_at(t0);
        reg.get_mut(b).unwrap().start_at(t0);
        assert_eq!(reg.lap_all_at(t0 + Duration::from_secs(1)), 2);
        assert_eq!(reg.total_laps(), 2);
        assert_eq!(reg.running_count(), 2);
        assert_eq!(reg.find_by_name("C").unwrap().lap_count(), 0);
    }

    #[test]
    fn laps_grouped_by_number_and_sorted() {
        let t0 = Instant::now();
        let mut reg = registry(&["A", "B"]);
        reg.start_all_at(t0);
        let a = reg.find_by_name("A").unwrap().id();
        let b = reg.find_by_name("B").unwrap().id();
        reg.get_mut(b).unwrap().record_lap_at(t0 + Duration::from_secs(10));
        reg.get_mut(a).unwrap().record_lap_at(t0 + Duration::from_secs(12));
        reg.get_mut(a).unwrap().record_lap_at(t0 + Duration::from_secs(20));

        let laps = reg.laps_by_number();
        assert_eq!(laps.len(), 2);
        let first: Vec<_> = laps[&1].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(first, vec!["B", "A"]);
        assert_eq!(laps[&2][0].time, Duration::from_secs(20));
    }

    #[test]
    fn selection_cleared_by_removal_and_reset() {
        let mut reg = registry(&["A", "B"]);
        let b = reg.find_by_name("B").unwrap().id();
        assert!(reg.select(b));
        assert_eq!(reg.selected().unwrap().name(), "B");
        assert!(reg.remove(b));
        assert!(reg.selected().is_none());

        let a = reg.find_by_name("A").unwrap().id();
        reg.select(a);
        reg.reset_all();
        assert!(reg.selected().is_none());
    }

    proptest! {
        #[test]
        fn never_empty_and_numbers_stay_dense(
            adds in 0usize..8,
            removals in prop::collection::vec(0usize..10, 0..12),
        ) {
            let mut reg = TimerRegistry::default();
            for _ in 0..adds {
                reg.add(None);
            }
            for pick in removals {
                let ids: Vec<_> = reg.iter().map(Timer::id).collect();
                let id = ids[pick % ids.len()];
                let removed = reg.remove(id);
                prop_assert_eq!(removed, ids.len() > 1);
                prop_assert!(reg.len() >= 1);
                for (index, timer) in reg.iter().enumerate() {
                    prop_assert_eq!(timer.display_number(), index + 1);
                }
            }
        }

        #[test]
        fn custom_names_survive_renumbering(custom in "[a-z]{3,8}", victim in 0usize..3) {
            let mut reg = registry(&["Секундомер 1", "Секундомер 2", "Секундомер 3"]);
            let id = reg.add(Some(&custom));
            let ids: Vec<_> = reg.iter().map(Timer::id).collect();
            reg.remove(ids[victim]);
            prop_assert_eq!(reg.get(id).unwrap().name(), custom.as_str());
            prop_assert_eq!(reg.get(id).unwrap().display_number(), 3);
        }
    }
}
