//! Chat statistics and received-message history.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::types::{ChatEvent, Location};

/// Messages kept per location.
const RECENT_PER_LOCATION: usize = 10;

/// Default history length.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct LocationStats {
    pub message_count: u64,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
    /// Most recent messages, oldest first
    pub recent: VecDeque<String>,
}

/// Counters over every chat event seen since monitoring started.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStats {
    pub total_messages: u64,
    pub started_at: DateTime<Local>,
    pub last_message_at: Option<DateTime<Local>>,
    pub locations: BTreeMap<Location, LocationStats>,
}

impl Default for ChatStats {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl ChatStats {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            total_messages: 0,
            started_at,
            last_message_at: None,
            locations: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, event: &ChatEvent) {
        self.record_at(Local::now(), event);
    }

    pub fn record_at(&mut self, now: DateTime<Local>, event: &ChatEvent) {
        self.total_messages += 1;
        self.last_message_at = Some(now);

        let entry = self.locations.entry(event.location).or_insert_with(|| LocationStats {
            message_count: 0,
            first_seen: now,
            last_seen: now,
            recent: VecDeque::with_capacity(RECENT_PER_LOCATION),
        });
        entry.message_count += 1;
        entry.last_seen = now;
        if entry.recent.len() == RECENT_PER_LOCATION {
            entry.recent.pop_front();
        }
        entry.recent.push_back(event.message.clone());
    }

    /// Locations ordered by message count, busiest first.
    pub fn busiest_locations(&self) -> Vec<(Location, u64)> {
        let mut ranked: Vec<_> = self
            .locations
            .iter()
            .map(|(location, stats)| (*location, stats.message_count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub received_at: DateTime<Local>,
    pub event: ChatEvent,
}

/// Capped history of received chat events.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, event: ChatEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            received_at: Local::now(),
            event,
        });
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
