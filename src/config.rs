//! Engine configuration
//!
//! One serde record holds every tunable of the enroll/authenticate flow. It
//! can be built in code, taken from a preset, or read from a TOML file in
//! which any omitted field keeps its default.

use crate::auth::AuthPolicy;
use crate::capture::CaptureConfig;
use crate::error::{KeyguardError, Result};
use crate::profile::Phrase;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Enrollment phrase used when none is configured
pub const DEFAULT_PHRASE: &str = "щука бомба флюгер язик джміль щодня озеро грані";

/// Configuration for capture, outlier rejection and the decision rule
///
/// # Example
/// ```
/// use keyguard::config::EngineConfig;
///
/// let config = EngineConfig::from_toml_str("threshold_factor = 3.0").unwrap();
/// assert_eq!(config.threshold_factor, 3.0);
/// assert_eq!(config.max_training_runs, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Phrase new profiles are trained on
    pub phrase: String,

    /// Accepted runs per enrollment session
    pub max_training_runs: usize,

    /// Mistyped attempts tolerated before a session's runs are discarded
    pub max_mistakes: usize,

    /// Capture-and-decide cycles per authentication
    pub max_auth_attempts: usize,

    /// Significance level (alpha) of the outlier t-test
    ///
    /// - 0.05 (default): two-sided 95% critical values
    /// - 0.01: rejects fewer runs as outliers
    pub significance_level: f64,

    /// Per-position threshold in standard deviations
    pub threshold_factor: f64,

    /// Threshold floor in milliseconds, for positions with tiny variance
    pub min_threshold_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phrase: DEFAULT_PHRASE.to_string(),
            max_training_runs: 15,
            max_mistakes: 3,
            max_auth_attempts: 3,
            significance_level: 0.05,
            threshold_factor: 2.85,
            min_threshold_ms: 5.0,
        }
    }
}

impl EngineConfig {
    /// Tighter acceptance: fewer false accepts, more false rejects
    pub fn strict() -> Self {
        Self {
            max_training_runs: 20,
            max_auth_attempts: 1,
            threshold_factor: 2.0,
            min_threshold_ms: 3.0,
            ..Self::default()
        }
    }

    /// Looser acceptance: fewer false rejects, more false accepts
    pub fn permissive() -> Self {
        Self {
            max_training_runs: 10,
            max_mistakes: 5,
            max_auth_attempts: 5,
            threshold_factor: 3.5,
            min_threshold_ms: 10.0,
            ..Self::default()
        }
    }

    /// Parse a TOML document; omitted fields keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.phrase.is_empty() {
            return Err(KeyguardError::EmptyPhrase);
        }

        if self.max_training_runs == 0 {
            return Err(KeyguardError::InvalidConfig(
                "max_training_runs must be >= 1, got 0".to_string(),
            ));
        }

        if self.max_auth_attempts == 0 {
            return Err(KeyguardError::InvalidConfig(
                "max_auth_attempts must be >= 1, got 0".to_string(),
            ));
        }

        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(KeyguardError::InvalidConfig(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }

        if !(self.threshold_factor >= 0.0) {
            return Err(KeyguardError::InvalidConfig(format!(
                "threshold_factor must be non-negative, got {}",
                self.threshold_factor
            )));
        }

        if !(self.min_threshold_ms >= 0.0) {
            return Err(KeyguardError::InvalidConfig(format!(
                "min_threshold_ms must be non-negative, got {}",
                self.min_threshold_ms
            )));
        }

        Ok(())
    }

    pub fn phrase(&self) -> Result<Phrase> {
        Phrase::new(self.phrase.clone())
    }

    /// Capture limits for an enrollment session on `phrase`
    pub fn enrollment_capture(&self, phrase: Phrase) -> Result<CaptureConfig> {
        CaptureConfig::new(
            phrase,
            self.max_training_runs,
            self.max_mistakes,
            self.significance_level,
        )
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy {
            max_attempts: self.max_auth_attempts,
            threshold_factor: self.threshold_factor,
            min_threshold_ms: self.min_threshold_ms,
        }
    }
}
