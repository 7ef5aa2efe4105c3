// Inputs and outputs of the capture state machine

use crate::profile::Session;
use serde::Serialize;
use std::time::Instant;

/// Discrete keyboard event fed to [`super::SessionCapture::handle`]
///
/// Instants must come from a monotonic clock; dwell time is
/// `release - press` of the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    KeyDown { ch: char, at: Instant },
    KeyUp { ch: char, at: Instant },
    /// The user finished the attempt (e.g. pressed Enter)
    Submit,
    /// Abandon the session without side effects
    Cancel,
}

/// Capture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Collecting,
    Completed,
    Cancelled,
}

/// Side-effect notification for the display collaborator
///
/// Notices are read-only feedback; nothing in them refers back into the
/// capture buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureNotice {
    /// Keystroke matched the expected character
    CharMatched { position: usize, matched: usize },
    /// Keystroke did not match; `first_mismatch` is the first bad position of
    /// the current attempt
    Mismatch {
        position: usize,
        matched: usize,
        first_mismatch: usize,
    },
    /// Cumulative mistake counter increased
    MistakeRegistered { mistakes: usize, limit: usize },
    /// Submitted text was not the phrase; the attempt was discarded
    AttemptRejected,
    /// Phrase typed and submitted with `held` keys still down; the run is
    /// accepted when they are released
    AwaitingRelease { held: usize },
    /// A new keystroke arrived before the pending attempt's keys were
    /// released; the attempt was dropped without counting a mistake
    AttemptAbandoned,
    RunAccepted { accepted: usize, required: usize },
    /// Mistake limit exceeded: all runs collected so far were discarded
    SessionReset,
    Completed(Session),
    Cancelled,
}

impl CaptureNotice {
    pub fn is_completed(&self) -> bool {
        matches!(self, CaptureNotice::Completed(_))
    }
}
