//! Error taxonomy for the keystroke-dynamics engine
//!
//! Only contract violations, insufficient statistical data and storage
//! failures are errors. A mistyped phrase is a [`crate::capture::CaptureNotice`]
//! and a rejected login is [`crate::auth::AuthOutcome::Rejected`]; both occur on
//! every legitimate usage path and are returned as ordinary values.

use thiserror::Error;

/// Errors produced by the engine and its storage boundary
#[derive(Error, Debug)]
pub enum KeyguardError {
    /// Candidate run, means and variances disagree in length (caller bug)
    #[error(
        "Vector length mismatch: actual={actual}, means={means}, variances={variances}"
    )]
    LengthMismatch {
        actual: usize,
        means: usize,
        variances: usize,
    },

    /// Runs fed to a per-position computation have different lengths (caller bug)
    #[error("Run length mismatch: expected {expected} positions, found {found}")]
    RunLengthMismatch { expected: usize, found: usize },

    /// A phrase must contain at least one character (caller bug)
    #[error("Phrase must not be empty")]
    EmptyPhrase,

    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session phrase {found:?} does not match profile phrase {expected:?}")]
    PhraseMismatch { expected: String, found: String },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl KeyguardError {
    /// True for errors that indicate a programming-contract violation
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            KeyguardError::LengthMismatch { .. }
                | KeyguardError::RunLengthMismatch { .. }
                | KeyguardError::EmptyPhrase
        )
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, KeyguardError>;
