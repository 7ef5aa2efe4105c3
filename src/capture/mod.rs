//! Session capture: raw key events to accepted dwell-time runs
//!
//! `Idle -> Collecting -> {Completed | Cancelled}`. While collecting, each
//! attempt at the phrase is buffered keystroke by keystroke. Keystrokes are
//! positioned in press order and their dwell time is filled in on release,
//! so overlapping keys (rollover) are measured per key.
//!
//! A keystroke that does not match the expected character is not buffered;
//! it registers one mistake for the attempt. `Submit` either accepts the
//! attempt as a run or discards it. A correctly typed attempt submitted with
//! a key still held is kept pending and accepted on that key's release. When cumulative mistakes exceed the
//! limit, every run collected so far is dropped and collection starts over.

mod event;

pub use event::{CaptureNotice, CaptureState, KeyEvent};

use crate::error::{KeyguardError, Result};
use crate::outlier::remove_outliers_per_position;
use crate::profile::{Phrase, Run, Session};
use crate::stats::flattened_summary;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Limits for one capture session
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub phrase: Phrase,
    /// Accepted runs needed to complete the session
    pub max_runs: usize,
    /// Mistakes tolerated before the session buffer is discarded
    pub max_mistakes: usize,
    /// Significance level for outlier rejection
    pub alpha: f64,
}

impl CaptureConfig {
    pub fn new(phrase: Phrase, max_runs: usize, max_mistakes: usize, alpha: f64) -> Result<Self> {
        if max_runs == 0 {
            return Err(KeyguardError::InvalidConfig(
                "max_runs must be at least 1".to_string(),
            ));
        }
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(KeyguardError::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}",
                alpha
            )));
        }
        Ok(Self {
            phrase,
            max_runs,
            max_mistakes,
            alpha,
        })
    }
}

/// One matched keystroke of the current attempt
#[derive(Debug, Clone, Copy)]
struct Keystroke {
    pressed: Instant,
    released: Option<Instant>,
}

impl Keystroke {
    fn dwell_ms(&self) -> Option<f64> {
        self.released
            .map(|r| r.saturating_duration_since(self.pressed).as_secs_f64() * 1000.0)
    }
}

/// Capture state machine for one enrollment or authentication session
#[derive(Debug)]
pub struct SessionCapture {
    config: CaptureConfig,
    state: CaptureState,
    session_id: Uuid,
    started_at: u64,

    // current attempt
    typed: Vec<char>,
    keystrokes: Vec<Keystroke>,
    /// Held keys: slot in `keystrokes`, `None` for a mismatched press
    held: HashMap<char, VecDeque<Option<usize>>>,
    first_mismatch: Option<usize>,
    /// Submitted with the phrase typed but keys still held
    awaiting_release: bool,

    // session buffer
    runs: Vec<Run>,
    total_attempts: usize,
    mistakes: usize,
}

impl SessionCapture {
    /// Idle capture for the given configuration
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            session_id: Uuid::new_v4(),
            started_at: 0,
            typed: Vec::new(),
            keystrokes: Vec::new(),
            held: HashMap::new(),
            first_mismatch: None,
            awaiting_release: false,
            runs: Vec::new(),
            total_attempts: 0,
            mistakes: 0,
        }
    }

    /// Begin collecting: fresh session id, empty buffers
    ///
    /// `started_at` is wall-clock unix seconds, stored as metadata only.
    pub fn start(&mut self, started_at: u64) {
        self.session_id = Uuid::new_v4();
        self.started_at = started_at;
        self.clear_session_buffer();
        self.state = CaptureState::Collecting;
        info!(
            session = %self.session_id,
            phrase_len = self.config.phrase.len(),
            max_runs = self.config.max_runs,
            "capture session started"
        );
    }

    /// Clear every buffer and resume collecting under the same session id
    ///
    /// Used after a rejected authentication attempt and after the mistake
    /// limit is exceeded. A cancelled capture stays cancelled.
    pub fn soft_reset(&mut self) {
        if self.state == CaptureState::Cancelled || self.state == CaptureState::Idle {
            return;
        }
        self.clear_session_buffer();
        self.state = CaptureState::Collecting;
        debug!(session = %self.session_id, "capture soft reset");
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Accepted runs in the current session buffer
    pub fn accepted_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn total_attempts(&self) -> usize {
        self.total_attempts
    }

    /// Cumulative mistakes since the last reset
    pub fn mistakes(&self) -> usize {
        self.mistakes
    }

    /// Length of the correctly typed prefix of the current attempt
    pub fn matched(&self) -> usize {
        self.keystrokes.len()
    }

    /// Feed one event; returns the notifications it produced
    ///
    /// Events outside `Collecting` are ignored.
    pub fn handle(&mut self, event: KeyEvent) -> Result<Vec<CaptureNotice>> {
        if self.state != CaptureState::Collecting {
            debug!(state = ?self.state, ?event, "event ignored outside collecting state");
            return Ok(Vec::new());
        }

        match event {
            KeyEvent::KeyDown { ch, at } => Ok(self.key_down(ch, at)),
            KeyEvent::KeyUp { ch, at } => self.key_up(ch, at),
            KeyEvent::Submit => self.submit(),
            KeyEvent::Cancel => Ok(self.cancel()),
        }
    }

    fn key_down(&mut self, ch: char, at: Instant) -> Vec<CaptureNotice> {
        let mut notices = Vec::new();
        if self.awaiting_release {
            // a new press abandons the pending attempt; it was typed correctly
            debug!(session = %self.session_id, "pending attempt abandoned by new keystroke");
            self.clear_attempt();
            notices.push(CaptureNotice::AttemptAbandoned);
        }

        let position = self.typed.len();
        self.typed.push(ch);

        let expected = self.config.phrase.char_at(position);
        if self.first_mismatch.is_none() && expected == Some(ch) {
            self.keystrokes.push(Keystroke {
                pressed: at,
                released: None,
            });
            let slot = self.keystrokes.len() - 1;
            self.held.entry(ch).or_default().push_back(Some(slot));
            notices.push(CaptureNotice::CharMatched {
                position,
                matched: self.keystrokes.len(),
            });
            return notices;
        }

        self.held.entry(ch).or_default().push_back(None);
        let matched = self.matched();
        let first_mismatch = *self.first_mismatch.get_or_insert(position);

        notices.push(CaptureNotice::Mismatch {
            position,
            matched,
            first_mismatch,
        });
        if first_mismatch == position {
            notices.push(self.register_mistake());
        }
        notices
    }

    fn key_up(&mut self, ch: char, at: Instant) -> Result<Vec<CaptureNotice>> {
        let slot = self.held.get_mut(&ch).and_then(VecDeque::pop_front);
        match slot {
            Some(Some(index)) => {
                if let Some(stroke) = self.keystrokes.get_mut(index) {
                    stroke.released = Some(at);
                }
            }
            Some(None) => {}
            None => debug!(%ch, "release without matching press ignored"),
        }

        if self.awaiting_release {
            if let Some(run) = self.completed_run() {
                return self.accept_run(run);
            }
        }
        Ok(Vec::new())
    }

    fn submit(&mut self) -> Result<Vec<CaptureNotice>> {
        if self.awaiting_release {
            return Ok(Vec::new());
        }
        self.total_attempts += 1;
        let mut notices = Vec::new();

        if let Some(run) = self.completed_run() {
            return self.accept_run(run);
        }

        if self.typed_phrase() {
            let held = self.keystrokes.iter().filter(|k| k.released.is_none()).count();
            debug!(session = %self.session_id, held, "submit with keys held, awaiting release");
            self.awaiting_release = true;
            notices.push(CaptureNotice::AwaitingRelease { held });
            return Ok(notices);
        }

        if self.first_mismatch.is_none() {
            notices.push(self.register_mistake());
        }
        self.clear_attempt();
        notices.push(CaptureNotice::AttemptRejected);

        if self.mistakes > self.config.max_mistakes {
            info!(
                session = %self.session_id,
                mistakes = self.mistakes,
                limit = self.config.max_mistakes,
                "mistake limit exceeded, discarding collected runs"
            );
            self.clear_session_buffer();
            notices.push(CaptureNotice::SessionReset);
        }

        Ok(notices)
    }

    fn accept_run(&mut self, run: Run) -> Result<Vec<CaptureNotice>> {
        self.runs.push(run);
        self.clear_attempt();
        debug!(
            session = %self.session_id,
            accepted = self.runs.len(),
            required = self.config.max_runs,
            "run accepted"
        );
        let mut notices = vec![CaptureNotice::RunAccepted {
            accepted: self.runs.len(),
            required: self.config.max_runs,
        }];

        if self.runs.len() >= self.config.max_runs {
            let session = self.complete()?;
            notices.push(CaptureNotice::Completed(session));
        }
        Ok(notices)
    }

    /// Typed text of the current attempt equals the phrase
    fn typed_phrase(&self) -> bool {
        self.first_mismatch.is_none() && self.typed.as_slice() == self.config.phrase.chars()
    }

    /// Dwell vector of the current attempt if it is exactly the phrase and
    /// every key has been released
    fn completed_run(&self) -> Option<Run> {
        if !self.typed_phrase() {
            return None;
        }
        let run: Option<Run> = self.keystrokes.iter().map(Keystroke::dwell_ms).collect();
        run.filter(|r| r.len() == self.config.phrase.len())
    }

    fn register_mistake(&mut self) -> CaptureNotice {
        self.mistakes += 1;
        debug!(
            session = %self.session_id,
            mistakes = self.mistakes,
            limit = self.config.max_mistakes,
            "mistake registered"
        );
        CaptureNotice::MistakeRegistered {
            mistakes: self.mistakes,
            limit: self.config.max_mistakes,
        }
    }

    fn complete(&mut self) -> Result<Session> {
        let accepted_runs = self.runs.len();
        let runs = std::mem::take(&mut self.runs);
        let runs = remove_outliers_per_position(&runs, self.config.alpha)?;
        let (mean, stddev) = flattened_summary(&runs);

        self.state = CaptureState::Completed;
        info!(
            session = %self.session_id,
            accepted_runs,
            kept_runs = runs.len(),
            mean,
            stddev,
            "capture session completed"
        );

        Ok(Session {
            id: self.session_id,
            phrase: self.config.phrase.clone(),
            started_at: self.started_at,
            total_attempts: self.total_attempts,
            accepted_runs,
            runs,
            mean,
            stddev,
        })
    }

    fn cancel(&mut self) -> Vec<CaptureNotice> {
        self.clear_session_buffer();
        self.state = CaptureState::Cancelled;
        info!(session = %self.session_id, "capture session cancelled");
        vec![CaptureNotice::Cancelled]
    }

    fn clear_attempt(&mut self) {
        self.typed.clear();
        self.keystrokes.clear();
        self.held.clear();
        self.first_mismatch = None;
        self.awaiting_release = false;
    }

    fn clear_session_buffer(&mut self) {
        self.clear_attempt();
        self.runs.clear();
        self.total_attempts = 0;
        self.mistakes = 0;
    }
}
