//! Core types shared by the monitoring pipeline.
//!
//! - [`ChatEvent`] and [`Location`] are produced by the line parser
//! - [`Action`], [`Command`] and [`Tier`] are produced by the command classifier
//! - [`RefreshRate`] controls display streams
//!
//! ```rust
//! use skitime::types::{Action, ChatEvent, Location};
//!
//! let event = ChatEvent::new(
//!     "03:18:20",
//!     Location::Block { x: 10, y: -60, z: 4 },
//!     "Иванов стартовал",
//!     "[03:18:20] [Server thread/INFO]: [@ 10 -60 4] Иванов стартовал",
//! );
//! assert_eq!(event.location.to_string(), "X10Y-60Z4");
//! assert!(Action::LapAll.is_general());
//! ```

mod action;
mod chat;
mod refresh_rate;

pub use action::{Action, Command, Tier};
pub use chat::{ChatEvent, Location};
pub use refresh_rate::RefreshRate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_tags_render_like_the_audit_trail() {
        assert_eq!(Location::Global.to_string(), "global");
        assert_eq!(Location::Block { x: -1, y: 2, z: -3 }.to_string(), "X-1Y2Z-3");
        assert_eq!(Location::Unknown.to_string(), "unknown");
    }

    #[test]
    fn chat_event_display_includes_timestamp_and_location() {
        let event = ChatEvent::new("12:00:01", Location::Global, "старт всех", "raw");
        assert_eq!(event.to_string(), "[12:00:01] [global] старт всех");
    }

    #[test]
    fn only_bulk_actions_are_general() {
        for action in [Action::Start, Action::Stop, Action::Lap, Action::Select] {
            assert!(!action.is_general());
        }
        for action in [Action::StartAll, Action::StopAll, Action::LapAll, Action::ResetAll] {
            assert!(action.is_general());
        }
    }
}
