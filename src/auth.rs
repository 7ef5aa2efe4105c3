//! Authentication decision rule and multi-attempt policy
//!
//! A candidate run passes a position when `|actual - mean|` is within
//! `max(threshold_factor * sqrt(variance), min_threshold)`. The run is
//! accepted only if every position passes.

use crate::capture::{CaptureConfig, CaptureNotice, CaptureState, KeyEvent, SessionCapture};
use crate::error::{KeyguardError, Result};
use crate::profile::Profile;
use crate::stats::PositionStats;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-position comparison of one candidate run against a profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthAttemptResult {
    /// |actual - mean| per position (ms)
    pub deltas: Vec<f64>,
    /// Effective threshold per position (ms)
    pub thresholds: Vec<f64>,
    pub ok_flags: Vec<bool>,
    /// True only if every position passed
    pub accepted: bool,
}

impl AuthAttemptResult {
    /// Positions that failed the threshold test
    pub fn failed_positions(&self) -> Vec<usize> {
        self.ok_flags
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Compare a candidate run with profile means and variances
///
/// # Errors
/// - `InsufficientData` when the profile statistics are empty
/// - `LengthMismatch` when the three vectors differ in length
///
/// # Example
/// ```
/// use keyguard::auth::calculate_authentication_delta;
///
/// let result = calculate_authentication_delta(
///     &[100.0, 100.0], &[100.0, 100.0], &[4.0, 4.0], 2.0, 5.0,
/// ).unwrap();
/// assert!(result.accepted);
/// assert_eq!(result.thresholds, vec![5.0, 5.0]);
/// ```
pub fn calculate_authentication_delta(
    actual: &[f64],
    means: &[f64],
    variances: &[f64],
    threshold_factor: f64,
    min_threshold: f64,
) -> Result<AuthAttemptResult> {
    if means.is_empty() {
        return Err(KeyguardError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if actual.len() != means.len() || means.len() != variances.len() {
        return Err(KeyguardError::LengthMismatch {
            actual: actual.len(),
            means: means.len(),
            variances: variances.len(),
        });
    }

    let mut deltas = Vec::with_capacity(actual.len());
    let mut thresholds = Vec::with_capacity(actual.len());
    let mut ok_flags = Vec::with_capacity(actual.len());

    for ((a, m), v) in actual.iter().zip(means).zip(variances) {
        let delta = (a - m).abs();
        let threshold = (threshold_factor * v.max(0.0).sqrt()).max(min_threshold);
        deltas.push(delta);
        thresholds.push(threshold);
        ok_flags.push(delta <= threshold);
    }

    let accepted = ok_flags.iter().all(|ok| *ok);
    Ok(AuthAttemptResult {
        deltas,
        thresholds,
        ok_flags,
        accepted,
    })
}

/// Decision thresholds and retry budget for authentication
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthPolicy {
    /// Capture-and-decide cycles allowed before rejecting
    pub max_attempts: usize,
    pub threshold_factor: f64,
    /// Threshold floor in milliseconds
    pub min_threshold_ms: f64,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            threshold_factor: 2.85,
            min_threshold_ms: 5.0,
        }
    }
}

impl AuthPolicy {
    /// Apply the decision rule to one candidate run
    pub fn decide(&self, actual: &[f64], stats: &PositionStats) -> Result<AuthAttemptResult> {
        calculate_authentication_delta(
            actual,
            &stats.means,
            &stats.variances,
            self.threshold_factor,
            self.min_threshold_ms,
        )
    }
}

/// Where an authentication stands after an event
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Current attempt still being typed
    Collecting,
    /// Attempt rejected; capture restarted for another try
    Retry {
        result: AuthAttemptResult,
        failures: usize,
        remaining: usize,
    },
    Accepted(AuthAttemptResult),
    /// Every allowed attempt was rejected
    Rejected {
        result: AuthAttemptResult,
        failures: usize,
    },
    /// The profile has no enrollment statistics to compare against
    InsufficientData,
    Cancelled,
}

impl AuthOutcome {
    /// True when no further events can change the outcome
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            AuthOutcome::Accepted(_)
                | AuthOutcome::Rejected { .. }
                | AuthOutcome::InsufficientData
                | AuthOutcome::Cancelled
        )
    }
}

/// Capture notices and authentication outcome produced by one event
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStep {
    pub notices: Vec<CaptureNotice>,
    pub outcome: AuthOutcome,
}

/// Multi-attempt authentication against one profile
#[derive(Debug)]
pub struct Authenticator {
    stats: Option<PositionStats>,
    policy: AuthPolicy,
    capture: SessionCapture,
    failures: usize,
    outcome: AuthOutcome,
}

impl Authenticator {
    /// Prepare an authentication session for `profile`
    ///
    /// An untrained profile yields an authenticator whose outcome is
    /// already `InsufficientData`.
    ///
    /// # Errors
    /// - `InvalidConfig` when `max_attempts` is 0 or `alpha` is out of range
    /// - `LengthMismatch` when the profile statistics do not cover the phrase
    pub fn new(
        profile: &Profile,
        policy: AuthPolicy,
        max_mistakes: usize,
        alpha: f64,
        started_at: u64,
    ) -> Result<Self> {
        if policy.max_attempts == 0 {
            return Err(KeyguardError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let stats = profile.position_stats();
        if let Some(s) = &stats {
            if s.means.len() != profile.phrase.len() || s.variances.len() != profile.phrase.len() {
                return Err(KeyguardError::LengthMismatch {
                    actual: profile.phrase.len(),
                    means: s.means.len(),
                    variances: s.variances.len(),
                });
            }
        }

        let config = CaptureConfig::new(profile.phrase.clone(), 1, max_mistakes, alpha)?;
        let mut capture = SessionCapture::new(config);

        let outcome = if stats.is_some() {
            capture.start(started_at);
            AuthOutcome::Collecting
        } else {
            info!(profile = %profile.id, "profile has no enrollment data, cannot authenticate");
            AuthOutcome::InsufficientData
        };

        Ok(Self {
            stats,
            policy,
            capture,
            failures: 0,
            outcome,
        })
    }

    pub fn outcome(&self) -> &AuthOutcome {
        &self.outcome
    }

    /// Rejected attempts so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    pub fn capture(&self) -> &SessionCapture {
        &self.capture
    }

    /// Feed one keyboard event
    pub fn handle(&mut self, event: KeyEvent) -> Result<AuthStep> {
        if self.outcome.is_final() {
            return Ok(AuthStep {
                notices: Vec::new(),
                outcome: self.outcome.clone(),
            });
        }

        let notices = self.capture.handle(event)?;
        if self.capture.state() == CaptureState::Cancelled {
            self.outcome = AuthOutcome::Cancelled;
        }

        let candidate = notices.iter().find_map(|n| match n {
            CaptureNotice::Completed(session) => session.runs.first().cloned(),
            _ => None,
        });
        if let Some(run) = candidate {
            self.outcome = self.decide(&run)?;
        } else if !self.outcome.is_final() {
            self.outcome = AuthOutcome::Collecting;
        }

        Ok(AuthStep {
            notices,
            outcome: self.outcome.clone(),
        })
    }

    fn decide(&mut self, run: &[f64]) -> Result<AuthOutcome> {
        let Some(stats) = &self.stats else {
            return Ok(AuthOutcome::InsufficientData);
        };
        let result = self.policy.decide(run, stats)?;
        debug!(
            deltas = ?result.deltas,
            thresholds = ?result.thresholds,
            "authentication attempt compared"
        );

        if result.accepted {
            info!(attempt = self.failures + 1, "authentication accepted");
            return Ok(AuthOutcome::Accepted(result));
        }

        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            info!(failures = self.failures, "authentication rejected, attempts exhausted");
            return Ok(AuthOutcome::Rejected {
                result,
                failures: self.failures,
            });
        }

        let remaining = self.policy.max_attempts - self.failures;
        info!(
            failures = self.failures,
            remaining,
            failed_positions = ?result.failed_positions(),
            "authentication attempt rejected"
        );
        self.capture.soft_reset();
        Ok(AuthOutcome::Retry {
            result,
            failures: self.failures,
            remaining,
        })
    }
}
