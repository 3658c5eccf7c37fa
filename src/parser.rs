//! Command block line grammar.
//!
//! Server log lines look like
//! `[03:18:20] [Server thread/INFO]: [@ 10 -60 4] Иванов стартовал`.
//! Only lines carrying the `[@` marker are considered; everything else is a
//! silent skip and never an error.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ChatEvent, Location};

lazy_static! {
    /// Ordered line layouts; the first match wins.
    static ref LINE_PATTERNS: [Regex; 4] = [
        // [HH:MM:SS] [Server thread/INFO]: [@] message
        Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\]\s+\[[^\]]+\]:\s*\[\s*@\s*\]\s*(.+)").unwrap(),
        // [HH:MM:SS] [Server thread/INFO]: [@ x y z] message
        Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\]\s+\[[^\]]+\]:\s*\[\s*@\s+[^\]]+\]\s*(.+)").unwrap(),
        // [HH:MM:SS] ...INFO...]: [@] message
        Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\][^\]]*INFO[^\]]*\]:\s*\[\s*@\s*\]\s*(.+)").unwrap(),
        // [HH:MM:SS INFO]: [@] message
        Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\s+INFO\]:\s*\[\s*@\s*\]\s*(.+)").unwrap(),
    ];
    static ref RE_TIMESTAMP: Regex = Regex::new(r"\[(\d{2}:\d{2}:\d{2})\]").unwrap();
    static ref RE_MARKER: Regex = Regex::new(r"\[\s*@([^\]]*)\]").unwrap();
    static ref RE_COORDS: Regex = Regex::new(r"^\s*(-?\d+)\s+(-?\d+)\s+(-?\d+)\s*$").unwrap();
}

/// Whether a line carries the command block marker.
pub fn has_marker(line: &str) -> bool {
    line.contains("[@") || line.contains("[ @")
}

/// Parse a single log line into a chat event.
///
/// Returns `None` for blank lines, lines without the marker, lines without a
/// timestamp and markers with no message after them.
pub fn parse_line(line: &str) -> Option<ChatEvent> {
    let line = line.trim();
    if line.is_empty() || !has_marker(line) {
        return None;
    }

    for pattern in LINE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let message = caps[2].trim();
            if message.is_empty() {
                continue;
            }
            return Some(ChatEvent::new(&caps[1], marker_location(line), message, line));
        }
    }

    parse_line_fallback(line)
}

/// Manual scan for layouts none of the patterns know about.
fn parse_line_fallback(line: &str) -> Option<ChatEvent> {
    let timestamp = RE_TIMESTAMP.captures(line)?.get(1)?.as_str();
    let at = line.find("[@").or_else(|| line.find("[ @"))?;
    let close = at + line[at..].find(']')?;
    let message = line[close + 1..].trim();
    if message.is_empty() {
        return None;
    }
    Some(ChatEvent::new(timestamp, marker_location(line), message, line))
}

/// Classify the first marker on the line.
fn marker_location(line: &str) -> Location {
    let Some(caps) = RE_MARKER.captures(line) else {
        return Location::Unknown;
    };
    let inner = caps[1].trim();
    if inner.is_empty() {
        return Location::Global;
    }
    match RE_COORDS.captures(inner) {
        Some(coords) => {
            let parse = |i: usize| coords[i].parse::<i64>().ok();
            match (parse(1), parse(2), parse(3)) {
                (Some(x), Some(y), Some(z)) => Location::Block { x, y, z },
                _ => Location::Unknown,
            }
        }
        None => Location::Unknown,
    }
}

/// Parse every marker line in a block of text, preserving order.
pub fn process_batch(text: &str) -> Vec<ChatEvent> {
    text.lines()
        .filter(|line| has_marker(line))
        .filter_map(parse_line)
        .collect()
}

/// Splits a stream of text chunks into complete lines.
///
/// A trailing fragment without a newline is held until the next chunk
/// completes it, so a line split across two reads is parsed exactly once.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and get back the text made of complete lines, if any.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.pending.push_str(chunk);
        let end = self.pending.rfind('\n')?;
        let rest = self.pending.split_off(end + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        Some(complete)
    }

    /// Drop any held fragment, e.g. after a rotation.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Take the held fragment as a final line.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
