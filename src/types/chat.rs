//! Chat events emitted by command blocks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a command block message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    /// Bare `[@]` marker, no coordinates.
    Global,
    /// `[@ x y z]` marker with block coordinates.
    Block { x: i64, y: i64, z: i64 },
    /// Marker carried something that is not a coordinate triple.
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Global => f.write_str("global"),
            Location::Block { x, y, z } => write!(f, "X{}Y{}Z{}", x, y, z),
            Location::Unknown => f.write_str("unknown"),
        }
    }
}

/// A single command block chat line extracted from the server log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Wall-clock time from the log line (`HH:MM:SS`)
    pub timestamp: String,

    /// Command block location tag
    pub location: Location,

    /// Trimmed message text after the marker
    pub message: String,

    /// Original log line, for diagnostics
    pub raw: String,
}

impl ChatEvent {
    /// Create a new chat event
    pub fn new(
        timestamp: impl Into<String>,
        location: Location,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            location,
            message: message.into(),
            raw: raw.into(),
        }
    }
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.timestamp, self.location, self.message)
    }
}
