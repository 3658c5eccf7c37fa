//! Timer actions recognised in chat

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action a chat command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Start one named timer
    Start,
    /// Record a final lap and stop one named timer
    Stop,
    /// Record a lap on one named timer
    Lap,
    /// Select one named timer for the enlarged view
    Select,
    StartAll,
    StopAll,
    /// Record a lap on every running timer
    LapAll,
    ResetAll,
}

impl Action {
    /// Whether this action addresses every timer rather than one name.
    pub fn is_general(self) -> bool {
        matches!(self, Action::StartAll | Action::StopAll | Action::LapAll | Action::ResetAll)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Lap => "lap",
            Action::Select => "select",
            Action::StartAll => "start_all",
            Action::StopAll => "stop_all",
            Action::LapAll => "lap_all",
            Action::ResetAll => "reset_all",
        };
        f.write_str(name)
    }
}

/// Which matching pass produced a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Rule-table match against generated templates
    Rules,
    /// Whole-word name search with keyword fallback
    Heuristic,
}

/// A classified command ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    /// Timer name the command is bound to; `None` for general actions
    pub target: Option<String>,
    /// Lap number mentioned in the message, if any
    pub lap_number: Option<u32>,
    pub tier: Tier,
}

impl Command {
    /// Command addressing every timer.
    pub fn general(action: Action, tier: Tier) -> Self {
        Self { action, target: None, lap_number: None, tier }
    }

    /// Command addressing one named timer.
    pub fn targeted(action: Action, target: impl Into<String>, tier: Tier) -> Self {
        Self { action, target: Some(target.into()), lap_number: None, tier }
    }

    pub fn with_lap_number(mut self, lap_number: Option<u32>) -> Self {
        self.lap_number = lap_number;
        self
    }
}
