//! Enrollment orchestration: capture, aggregate, persist
//!
//! The only place where a completed session reaches storage. The profile is
//! saved once per completed session; a cancelled session leaves the stored
//! profile untouched.

use crate::aggregate::fold_session;
use crate::capture::{CaptureNotice, CaptureState, KeyEvent, SessionCapture};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::profile::{unix_timestamp, Profile};
use crate::store::ProfileStore;
use tracing::info;
use uuid::Uuid;

/// Notices from one event, plus the saved profile if a session completed
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollStep {
    pub notices: Vec<CaptureNotice>,
    pub saved: Option<Profile>,
}

/// One enrollment session against a store
pub struct Enrollment<'s, S: ProfileStore> {
    store: &'s mut S,
    profile: Profile,
    capture: SessionCapture,
}

impl<'s, S: ProfileStore> Enrollment<'s, S> {
    /// Start enrolling into an existing profile, or a new one on `None`
    ///
    /// A new profile is created on the configured phrase and first reaches
    /// the store when its first session completes. An existing profile keeps
    /// its own phrase.
    pub fn begin(store: &'s mut S, profile_id: Option<Uuid>, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let profile = match profile_id {
            Some(id) => store.require(id)?,
            None => Profile::new(config.phrase()?, unix_timestamp()),
        };

        let mut capture = SessionCapture::new(config.enrollment_capture(profile.phrase.clone())?);
        capture.start(unix_timestamp());
        info!(
            profile = %profile.id,
            session = %capture.session_id(),
            "enrollment started"
        );

        Ok(Self {
            store,
            profile,
            capture,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn capture(&self) -> &SessionCapture {
        &self.capture
    }

    pub fn state(&self) -> CaptureState {
        self.capture.state()
    }

    /// Feed one keyboard event
    ///
    /// On completion the session is folded into a copy of the profile, the
    /// copy is saved, and only then replaces the in-memory profile.
    pub fn handle(&mut self, event: KeyEvent) -> Result<EnrollStep> {
        let notices = self.capture.handle(event)?;

        let completed = notices.iter().find_map(|n| match n {
            CaptureNotice::Completed(session) => Some(session.clone()),
            _ => None,
        });

        let saved = match completed {
            Some(session) => {
                let updated = fold_session(&self.profile, session, unix_timestamp())?;
                self.store.save(&updated)?;
                info!(
                    profile = %updated.id,
                    sessions = updated.session_count(),
                    total_runs = updated.total_runs,
                    "enrollment session saved"
                );
                self.profile = updated.clone();
                Some(updated)
            }
            None => None,
        };

        Ok(EnrollStep { notices, saved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryProfileStore;
    use std::time::{Duration, Instant};

    fn config() -> EngineConfig {
        EngineConfig {
            phrase: "ab".to_string(),
            max_training_runs: 2,
            ..EngineConfig::default()
        }
    }

    fn attempt(at: &mut Instant, text: &str, dwell_ms: u64) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            *at += Duration::from_millis(30);
            events.push(KeyEvent::KeyDown { ch, at: *at });
            *at += Duration::from_millis(dwell_ms);
            events.push(KeyEvent::KeyUp { ch, at: *at });
        }
        events.push(KeyEvent::Submit);
        events
    }

    #[test]
    fn test_enrollment_creates_and_saves_profile() {
        let mut store = MemoryProfileStore::new();
        let mut at = Instant::now();
        let mut saved = None;

        let mut enrollment = Enrollment::begin(&mut store, None, &config()).unwrap();
        let id = enrollment.profile().id;
        for dwell in [100, 110] {
            for event in attempt(&mut at, "ab", dwell) {
                if let Some(p) = enrollment.handle(event).unwrap().saved {
                    saved = Some(p);
                }
            }
        }
        assert_eq!(enrollment.state(), CaptureState::Completed);

        let saved = saved.expect("profile saved on completion");
        assert_eq!(saved.total_runs, 2);
        assert_eq!(saved.session_count(), 1);
        assert!((saved.means[0] - 105.0).abs() < 1e-6);

        let stored = store.require(id).unwrap();
        assert_eq!(stored, saved);
    }

    #[test]
    fn test_cancelled_enrollment_leaves_profile_untouched() {
        let mut store = MemoryProfileStore::new();
        let original = store.create(crate::profile::Phrase::new("ab").unwrap()).unwrap();
        let mut at = Instant::now();

        let mut enrollment = Enrollment::begin(&mut store, Some(original.id), &config()).unwrap();
        for event in attempt(&mut at, "ab", 100) {
            enrollment.handle(event).unwrap();
        }
        let step = enrollment.handle(KeyEvent::Cancel).unwrap();
        assert_eq!(step.notices, vec![CaptureNotice::Cancelled]);
        assert!(step.saved.is_none());

        assert_eq!(store.require(original.id).unwrap(), original);
    }

    #[test]
    fn test_new_profile_not_stored_until_completion() {
        let mut store = MemoryProfileStore::new();
        let mut at = Instant::now();

        let mut enrollment = Enrollment::begin(&mut store, None, &config()).unwrap();
        for event in attempt(&mut at, "ab", 100) {
            enrollment.handle(event).unwrap();
        }
        enrollment.handle(KeyEvent::Cancel).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_profile_is_error() {
        let mut store = MemoryProfileStore::new();
        assert!(Enrollment::begin(&mut store, Some(Uuid::new_v4()), &config()).is_err());
    }
}
