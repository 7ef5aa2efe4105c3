//! Recorded keystroke logs
//!
//! JSON-lines format, one event per line, times in milliseconds from an
//! arbitrary origin:
//!
//! ```text
//! {"kind":"down","ch":"a","t_ms":0.0}
//! {"kind":"up","ch":"a","t_ms":96.5}
//! {"kind":"submit"}
//! ```
//!
//! Replaying anchors the log at a single `Instant`. Timestamps are taken to
//! whole nanoseconds, so dwell times are reproduced exactly.

use crate::capture::KeyEvent;
use crate::error::{KeyguardError, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordedKind {
    Down,
    Up,
    Submit,
    Cancel,
}

/// One line of a recorded keystroke log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub kind: RecordedKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ch: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_ms: Option<f64>,
}

impl RecordedEvent {
    /// Convert to a live event anchored at `origin`
    pub fn to_key_event(&self, origin: Instant) -> Result<KeyEvent> {
        let key = |what: &str| -> Result<(char, Instant)> {
            let ch = self.ch.ok_or_else(|| {
                KeyguardError::InvalidConfig(format!("{} event without a character", what))
            })?;
            let t_ms = self.t_ms.ok_or_else(|| {
                KeyguardError::InvalidConfig(format!("{} event without a timestamp", what))
            })?;
            if !(t_ms >= 0.0) || !t_ms.is_finite() {
                return Err(KeyguardError::InvalidConfig(format!(
                    "{} event has invalid timestamp {}",
                    what, t_ms
                )));
            }
            let offset = Duration::from_nanos((t_ms * 1_000_000.0).round() as u64);
            let at = origin.checked_add(offset).ok_or_else(|| {
                KeyguardError::InvalidConfig(format!(
                    "{} event timestamp {} out of range",
                    what, t_ms
                ))
            })?;
            Ok((ch, at))
        };

        Ok(match self.kind {
            RecordedKind::Down => {
                let (ch, at) = key("down")?;
                KeyEvent::KeyDown { ch, at }
            }
            RecordedKind::Up => {
                let (ch, at) = key("up")?;
                KeyEvent::KeyUp { ch, at }
            }
            RecordedKind::Submit => KeyEvent::Submit,
            RecordedKind::Cancel => KeyEvent::Cancel,
        })
    }
}

/// Parse a JSON-lines log; blank lines are skipped
pub fn parse_event_log(text: &str) -> Result<Vec<RecordedEvent>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(KeyguardError::from))
        .collect()
}

/// Parse a log and anchor every event at `origin`
pub fn replay_events(text: &str, origin: Instant) -> Result<Vec<KeyEvent>> {
    parse_event_log(text)?
        .iter()
        .map(|e| e.to_key_event(origin))
        .collect()
}

/// Build the log lines for typing `text` once with the given dwell times
///
/// Keys are pressed `gap_ms` apart after the previous release, starting at
/// `start_ms`. Returns the events and the time after the final release.
pub fn record_attempt(text: &str, dwells_ms: &[f64], start_ms: f64, gap_ms: f64) -> (Vec<RecordedEvent>, f64) {
    let mut t = start_ms;
    let mut events = Vec::with_capacity(text.chars().count() * 2 + 1);
    for (ch, dwell) in text.chars().zip(dwells_ms) {
        t += gap_ms;
        events.push(RecordedEvent {
            kind: RecordedKind::Down,
            ch: Some(ch),
            t_ms: Some(t),
        });
        t += dwell;
        events.push(RecordedEvent {
            kind: RecordedKind::Up,
            ch: Some(ch),
            t_ms: Some(t),
        });
    }
    events.push(RecordedEvent {
        kind: RecordedKind::Submit,
        ch: None,
        t_ms: None,
    });
    (events, t)
}

/// Serialize events as JSON lines
pub fn to_event_log(events: &[RecordedEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
