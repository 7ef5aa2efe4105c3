//! Data model: phrases, runs, sessions and biometric profiles
//!
//! These are fixed-shape records. A [`Profile`] is handed to the engine by
//! value, mutated on a working copy and returned for the caller to persist.

use crate::error::{KeyguardError, Result};
use crate::stats::PositionStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One correctly typed attempt: dwell time in milliseconds per phrase position
pub type Run = Vec<f64>;

/// The fixed text a profile is trained on
///
/// Length is counted in characters, not bytes; every [`Run`] for this phrase
/// has exactly [`Phrase::len`] entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phrase {
    text: String,
    chars: Vec<char>,
}

impl Phrase {
    /// Create a phrase, rejecting the empty string
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(KeyguardError::EmptyPhrase);
        }
        let chars = text.chars().collect();
        Ok(Self { text, chars })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of characters (run vector length `L`)
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Expected character at `position`, if within the phrase
    pub fn char_at(&self, position: usize) -> Option<char> {
        self.chars.get(position).copied()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

impl TryFrom<String> for Phrase {
    type Error = KeyguardError;

    fn try_from(text: String) -> Result<Self> {
        Phrase::new(text)
    }
}

impl From<Phrase> for String {
    fn from(phrase: Phrase) -> Self {
        phrase.text
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A completed enrollment or authentication encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub phrase: Phrase,
    /// Wall-clock start, unix seconds
    pub started_at: u64,
    /// Submitted attempts (accepted and mistyped) since the last reset
    pub total_attempts: usize,
    /// Runs accepted before outlier filtering
    pub accepted_runs: usize,
    /// Accepted runs that survived outlier filtering
    pub runs: Vec<Run>,
    /// Mean of every dwell value in `runs` (ms)
    pub mean: f64,
    /// Sample standard deviation of every dwell value in `runs` (ms)
    pub stddev: f64,
}

impl Session {
    /// Number of runs retained after outlier filtering
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of accepted runs discarded as outliers
    pub fn rejected_runs(&self) -> usize {
        self.accepted_runs.saturating_sub(self.runs.len())
    }
}

/// Long-lived biometric template for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub phrase: Phrase,
    /// Per-position mean dwell time (empty before first enrollment)
    pub means: Vec<f64>,
    /// Per-position sample variance (empty before first enrollment)
    pub variances: Vec<f64>,
    /// Runs folded into `means`/`variances`
    pub total_runs: usize,
    pub sessions: Vec<Session>,
    /// Unix seconds
    pub created_at: u64,
    /// Unix seconds
    pub updated_at: u64,
}

impl Profile {
    /// Fresh untrained profile with a random id
    pub fn new(phrase: Phrase, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            phrase,
            means: Vec::new(),
            variances: Vec::new(),
            total_runs: 0,
            sessions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True once at least one run has been folded into the statistics
    pub fn is_trained(&self) -> bool {
        self.total_runs > 0 && !self.means.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Current per-position statistics, `None` before first enrollment
    pub fn position_stats(&self) -> Option<PositionStats> {
        if !self.is_trained() {
            return None;
        }
        Some(PositionStats {
            means: self.means.clone(),
            variances: self.variances.clone(),
            count: self.total_runs,
        })
    }
}

/// Current wall-clock time in unix seconds
pub fn unix_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
