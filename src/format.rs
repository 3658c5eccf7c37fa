//! Stopwatch time formatting.
//!
//! Times are shown as `MM:SS.cc`, or `HH:MM:SS.cc` once an hour has passed.
//! Centiseconds are truncated, never rounded, so a displayed time never runs
//! ahead of the clock.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Result, TimingError};

lazy_static! {
    static ref RE_TIME_INPUT: Regex =
        Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})\.(\d{2})$").unwrap();
}

/// Format an elapsed duration for display.
///
/// # Examples
/// ```
/// use skitime::format_time;
/// use std::time::Duration;
/// assert_eq!(format_time(Duration::from_millis(75_129)), "01:15.12");
/// assert_eq!(format_time(Duration::from_secs(3_725)), "01:02:05.00");
/// ```
pub fn format_time(elapsed: Duration) -> String {
    let centis = elapsed.as_millis() / 10;
    let hours = centis / 360_000;
    let minutes = (centis / 6_000) % 60;
    let secs = (centis / 100) % 60;
    let cs = centis % 100;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
    } else {
        format!("{:02}:{:02}.{:02}", minutes, secs, cs)
    }
}

/// Parse a time previously produced by [`format_time`] (or typed by an operator).
///
/// Accepts `M:SS.cc`, `MM:SS.cc` and `H+:MM:SS.cc`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let caps = RE_TIME_INPUT.captures(input.trim()).ok_or_else(|| {
        TimingError::parse("time input", format!("'{}' is not MM:SS.cc or HH:MM:SS.cc", input))
    })?;

    let field = |index: usize| -> Result<u64> {
        match caps.get(index) {
            Some(m) => m.as_str().parse::<u64>().map_err(|e| {
                TimingError::parse("time input", format!("'{}': {}", m.as_str(), e))
            }),
            None => Ok(0),
        }
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let secs = field(3)?;
    let centis = field(4)?;

    if secs >= 60 {
        return Err(TimingError::parse("time input", format!("seconds out of range in '{}'", input)));
    }
    if caps.get(1).is_some() && minutes >= 60 {
        return Err(TimingError::parse("time input", format!("minutes out of range in '{}'", input)));
    }

    let total_millis = hours
        .checked_mul(60)
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(secs))
        .and_then(|s| s.checked_mul(100))
        .and_then(|c| c.checked_add(centis))
        .and_then(|c| c.checked_mul(10))
        .ok_or_else(|| TimingError::parse("time input", format!("'{}' is too large", input)))?;
    Ok(Duration::from_millis(total_millis))
}

/// Check whether a string is an acceptable time input.
pub fn is_valid_time_input(input: &str) -> bool {
    parse_duration(input).is_ok()
}
