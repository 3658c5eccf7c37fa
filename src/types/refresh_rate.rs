//! Refresh rate control for display streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a display stream yields timer views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshRate {
    /// Only when timer state changes
    OnChange,

    /// Fixed ticks per second, so running clocks keep moving
    /// A rate of 0 is treated as OnChange
    Hz(u32),
}

impl RefreshRate {
    /// Normalize degenerate rates
    pub fn normalize(self) -> Self {
        match self {
            RefreshRate::Hz(0) => RefreshRate::OnChange,
            other => other,
        }
    }

    /// Get tick interval if the rate is periodic
    pub fn tick_interval(self) -> Option<Duration> {
        match self.normalize() {
            RefreshRate::OnChange => None,
            RefreshRate::Hz(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hz_falls_back_to_on_change() {
        assert_eq!(RefreshRate::Hz(0).normalize(), RefreshRate::OnChange);
        assert_eq!(RefreshRate::Hz(0).tick_interval(), None);
    }

    #[test]
    fn periodic_rates_have_intervals() {
        assert_eq!(RefreshRate::Hz(20).tick_interval(), Some(Duration::from_millis(50)));
        assert_eq!(RefreshRate::OnChange.tick_interval(), None);
    }
}
