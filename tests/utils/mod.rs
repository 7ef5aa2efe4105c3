// Integration test utilities
//
// Typing simulators shared by the scenario and CLI tests.

#![allow(dead_code)]

use keyguard::replay::{record_attempt, to_event_log, RecordedEvent};
use keyguard::KeyEvent;
use std::time::{Duration, Instant};

/// Gap between a release and the next press (ms)
pub const KEY_GAP_MS: f64 = 40.0;

/// Synthetic keyboard on a monotonic timeline
pub struct Typist {
    now: Instant,
}

impl Typist {
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
        }
    }

    fn advance(&mut self, ms: f64) -> Instant {
        self.now += Duration::from_secs_f64(ms / 1000.0);
        self.now
    }

    /// Press and release each character with the given dwell
    pub fn keys(&mut self, text: &str, dwells: &[f64]) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for (ch, dwell) in text.chars().zip(dwells) {
            let down = self.advance(KEY_GAP_MS);
            events.push(KeyEvent::KeyDown { ch, at: down });
            let up = self.advance(*dwell);
            events.push(KeyEvent::KeyUp { ch, at: up });
        }
        events
    }

    /// Press and release each character with the given dwell, then submit
    pub fn attempt(&mut self, text: &str, dwells: &[f64]) -> Vec<KeyEvent> {
        let mut events = self.keys(text, dwells);
        events.push(KeyEvent::Submit);
        events
    }

    /// Same dwell for every character
    pub fn steady(&mut self, text: &str, dwell: f64) -> Vec<KeyEvent> {
        let dwells = vec![dwell; text.chars().count()];
        self.attempt(text, &dwells)
    }
}

/// JSON-lines key log for a sequence of attempts
pub fn key_log(attempts: &[(&str, Vec<f64>)]) -> String {
    let mut events: Vec<RecordedEvent> = Vec::new();
    let mut t = 0.0;
    for (text, dwells) in attempts {
        let (mut attempt, end) = record_attempt(text, dwells, t, KEY_GAP_MS);
        events.append(&mut attempt);
        t = end + 500.0;
    }
    to_event_log(&events).unwrap()
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} within {} of {}",
        actual,
        tol,
        expected
    );
}
