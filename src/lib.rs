//! Keyguard - keystroke-dynamics biometric authentication
//!
//! This library captures per-character key dwell times while a user types a
//! fixed phrase, cleans them with a t-test outlier filter, folds enrollment
//! sessions into a statistical profile, and accepts or rejects new typing
//! samples against that profile.
//!
//! The engine is pure: it consumes keyboard events and profile values and
//! produces sessions, decisions and updated profiles. Storage sits behind the
//! [`store::ProfileStore`] trait.

pub mod aggregate;
pub mod auth;
pub mod capture;
pub mod cli;
pub mod config;
pub mod enroll;
pub mod error;
pub mod outlier;
pub mod profile;
pub mod replay;
pub mod stats;
pub mod store;

pub use auth::{AuthOutcome, AuthPolicy, Authenticator};
pub use capture::{CaptureNotice, CaptureState, KeyEvent, SessionCapture};
pub use config::EngineConfig;
pub use error::{KeyguardError, Result};
pub use profile::{Phrase, Profile, Run, Session};
