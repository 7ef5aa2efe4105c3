// End-to-end enrollment and authentication scenarios
//
// Keystrokes go through the public API only: capture, aggregation, the
// decision rule and the in-memory profile store.

mod utils;

use keyguard::aggregate::{pool_position_stats, update_aggregate_profile};
use keyguard::auth::{calculate_authentication_delta, AuthOutcome, AuthPolicy, Authenticator};
use keyguard::capture::{CaptureConfig, CaptureNotice, CaptureState, SessionCapture};
use keyguard::enroll::Enrollment;
use keyguard::stats::PositionStats;
use keyguard::store::{MemoryProfileStore, ProfileStore};
use keyguard::{EngineConfig, KeyEvent, Phrase, Profile};
use utils::{assert_close, Typist};

fn abc_config() -> EngineConfig {
    EngineConfig {
        phrase: "abc".to_string(),
        max_training_runs: 2,
        ..EngineConfig::default()
    }
}

/// Enroll one session typed with the given dwell vectors
fn enroll(store: &mut MemoryProfileStore, config: &EngineConfig, runs: &[Vec<f64>]) -> Profile {
    let mut typist = Typist::new();
    let mut enrollment = Enrollment::begin(store, None, config).unwrap();
    let mut saved = None;
    for dwells in runs {
        for event in typist.attempt(&config.phrase, dwells) {
            if let Some(profile) = enrollment.handle(event).unwrap().saved {
                saved = Some(profile);
            }
        }
    }
    saved.expect("session should complete")
}

// ============================================================================
// Scenario A: enrollment
// ============================================================================

#[test]
fn test_scenario_a_enrollment_session_stats() {
    let mut store = MemoryProfileStore::new();
    let profile = enroll(
        &mut store,
        &abc_config(),
        &[vec![100.0, 120.0, 110.0], vec![105.0, 115.0, 112.0]],
    );

    assert_eq!(profile.total_runs, 2);
    assert_eq!(profile.session_count(), 1);

    let expected_means = [102.5, 117.5, 111.0];
    let expected_variances = [12.5, 12.5, 2.0];
    for i in 0..3 {
        assert_close(profile.means[i], expected_means[i], 1e-6);
        assert_close(profile.variances[i], expected_variances[i], 1e-6);
    }

    let session = &profile.sessions[0];
    assert_eq!(session.run_count(), 2);
    assert_eq!(session.total_attempts, 2);

    // Profile after the first session equals the session's own stats
    let session_stats = keyguard::stats::column_stats(&session.runs).unwrap();
    assert_eq!(profile.position_stats(), Some(session_stats));

    assert_eq!(store.require(profile.id).unwrap(), profile);
}

#[test]
fn test_second_enrollment_session_extends_profile() {
    let mut store = MemoryProfileStore::new();
    let config = abc_config();
    let first = enroll(
        &mut store,
        &config,
        &[vec![100.0, 120.0, 110.0], vec![105.0, 115.0, 112.0]],
    );

    let mut typist = Typist::new();
    let mut enrollment = Enrollment::begin(&mut store, Some(first.id), &config).unwrap();
    let mut saved = None;
    for dwells in [[102.0, 118.0, 111.0], [104.0, 116.0, 109.0]] {
        for event in typist.attempt("abc", &dwells) {
            if let Some(profile) = enrollment.handle(event).unwrap().saved {
                saved = Some(profile);
            }
        }
    }
    let second = saved.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.total_runs, 4);
    assert_eq!(second.session_count(), 2);
    // (100 + 105 + 102 + 104) / 4
    assert_close(second.means[0], 102.75, 1e-6);
}

// ============================================================================
// Scenario B: incremental aggregation
// ============================================================================

#[test]
fn test_scenario_b_incremental_aggregation() {
    let current = PositionStats {
        means: vec![100.0, 100.0],
        variances: vec![25.0, 25.0],
        count: 10,
    };
    let session = PositionStats {
        means: vec![110.0, 90.0],
        variances: vec![16.0, 16.0],
        count: 5,
    };

    let pooled = pool_position_stats(&current, &session).unwrap();
    assert_eq!(pooled.count, 15);
    assert_close(pooled.means[0], (100.0 * 10.0 + 110.0 * 5.0) / 15.0, 1e-9);
    assert_close(pooled.means[1], (100.0 * 10.0 + 90.0 * 5.0) / 15.0, 1e-9);

    // M2 = 25*9 + 16*4 + 10^2 * 10*5/15, over 14 degrees of freedom
    let expected_var = (225.0 + 64.0 + 1000.0 / 3.0) / 14.0;
    assert_close(pooled.variances[0], expected_var, 1e-9);
    assert_close(pooled.variances[1], expected_var, 1e-9);
}

#[test]
fn test_scenario_b_through_profile_update() {
    let mut profile = Profile::new(Phrase::new("ab").unwrap(), 0);
    let mut typist = Typist::new();

    let config = CaptureConfig::new(profile.phrase.clone(), 3, 3, 0.05).unwrap();
    let mut capture = SessionCapture::new(config);
    capture.start(0);
    let mut session = None;
    for dwells in [[100.0, 90.0], [110.0, 80.0], [105.0, 85.0]] {
        for event in typist.attempt("ab", &dwells) {
            for notice in capture.handle(event).unwrap() {
                if let CaptureNotice::Completed(s) = notice {
                    session = Some(s);
                }
            }
        }
    }
    let session = session.unwrap();

    update_aggregate_profile(&mut profile, &session).unwrap();
    assert_eq!(profile.total_runs, 3);
    assert_close(profile.means[0], 105.0, 1e-6);
    assert_close(profile.means[1], 85.0, 1e-6);
    assert_close(profile.variances[0], 25.0, 1e-6);
}

// ============================================================================
// Scenarios C and D: decision rule
// ============================================================================

#[test]
fn test_scenario_c_auth_accept() {
    let result =
        calculate_authentication_delta(&[100.0, 100.0], &[100.0, 100.0], &[4.0, 4.0], 2.0, 5.0)
            .unwrap();
    assert_eq!(result.deltas, vec![0.0, 0.0]);
    assert_eq!(result.thresholds, vec![5.0, 5.0]);
    assert!(result.accepted);
}

#[test]
fn test_scenario_d_auth_reject() {
    let result =
        calculate_authentication_delta(&[130.0, 100.0], &[100.0, 100.0], &[4.0, 4.0], 2.0, 5.0)
            .unwrap();
    assert_eq!(result.deltas[0], 30.0);
    assert_eq!(result.ok_flags, vec![false, true]);
    assert!(!result.accepted);
}

// ============================================================================
// Scenario E: mistake-limit reset
// ============================================================================

#[test]
fn test_scenario_e_mistake_limit_reset() {
    let config = CaptureConfig::new(Phrase::new("abc").unwrap(), 5, 3, 0.05).unwrap();
    let mut capture = SessionCapture::new(config);
    capture.start(0);
    let mut typist = Typist::new();

    for event in typist.steady("abc", 100.0) {
        capture.handle(event).unwrap();
    }
    assert_eq!(capture.accepted_runs(), 1);

    let mut resets = 0;
    for _ in 0..4 {
        for event in typist.steady("abx", 100.0) {
            for notice in capture.handle(event).unwrap() {
                if notice == CaptureNotice::SessionReset {
                    resets += 1;
                }
            }
        }
    }

    assert_eq!(resets, 1);
    assert_eq!(capture.accepted_runs(), 0);
    assert_eq!(capture.mistakes(), 0);
    assert_eq!(capture.state(), CaptureState::Collecting);
}

#[test]
fn test_three_mistakes_do_not_reset() {
    let config = CaptureConfig::new(Phrase::new("abc").unwrap(), 5, 3, 0.05).unwrap();
    let mut capture = SessionCapture::new(config);
    capture.start(0);
    let mut typist = Typist::new();

    for event in typist.steady("abc", 100.0) {
        capture.handle(event).unwrap();
    }
    for _ in 0..3 {
        for event in typist.steady("xbc", 100.0) {
            capture.handle(event).unwrap();
        }
    }

    assert_eq!(capture.mistakes(), 3);
    assert_eq!(capture.accepted_runs(), 1);
}

#[test]
fn test_enter_before_last_release_completes_enrollment() {
    let mut store = MemoryProfileStore::new();
    let config = abc_config();
    let mut typist = Typist::new();
    let mut enrollment = Enrollment::begin(&mut store, None, &config).unwrap();
    let mut saved = None;

    for dwells in [[100.0, 120.0, 110.0], [104.0, 116.0, 112.0]] {
        let mut events = typist.keys("abc", &dwells);
        let last_up = events.pop().unwrap();
        events.push(KeyEvent::Submit);
        events.push(last_up);

        for event in events {
            let step = enrollment.handle(event).unwrap();
            assert!(!step.notices.contains(&CaptureNotice::SessionReset));
            if let Some(profile) = step.saved {
                saved = Some(profile);
            }
        }
    }

    assert_eq!(enrollment.capture().mistakes(), 0);
    let profile = saved.expect("session completes on the final release");
    assert_eq!(profile.total_runs, 2);
    assert_close(profile.means[2], 111.0, 1e-6);
    assert_eq!(store.require(profile.id).unwrap(), profile);
}

// ============================================================================
// Authentication flow
// ============================================================================

fn trained_profile() -> Profile {
    let mut store = MemoryProfileStore::new();
    enroll(
        &mut store,
        &abc_config(),
        &[vec![100.0, 120.0, 110.0], vec![105.0, 115.0, 112.0]],
    )
}

fn authenticator(profile: &Profile) -> Authenticator {
    Authenticator::new(profile, AuthPolicy::default(), 3, 0.05, 0).unwrap()
}

fn type_into(auth: &mut Authenticator, events: Vec<KeyEvent>) -> AuthOutcome {
    let mut outcome = auth.outcome().clone();
    for event in events {
        outcome = auth.handle(event).unwrap().outcome;
    }
    outcome
}

#[test]
fn test_genuine_typing_accepted_first_try() {
    let profile = trained_profile();
    let mut auth = authenticator(&profile);
    let mut typist = Typist::new();

    let outcome = type_into(&mut auth, typist.attempt("abc", &[103.0, 118.0, 111.0]));
    assert!(matches!(outcome, AuthOutcome::Accepted(_)));
    assert_eq!(auth.failures(), 0);
}

#[test]
fn test_retry_then_accept() {
    let profile = trained_profile();
    let mut auth = authenticator(&profile);
    let mut typist = Typist::new();

    let outcome = type_into(&mut auth, typist.attempt("abc", &[160.0, 118.0, 111.0]));
    match outcome {
        AuthOutcome::Retry {
            result,
            failures,
            remaining,
        } => {
            assert_eq!(result.failed_positions(), vec![0]);
            assert_eq!(failures, 1);
            assert_eq!(remaining, 2);
        }
        other => panic!("expected retry, got {:?}", other),
    }
    assert_eq!(auth.capture().state(), CaptureState::Collecting);

    let outcome = type_into(&mut auth, typist.attempt("abc", &[102.0, 117.0, 111.0]));
    assert!(matches!(outcome, AuthOutcome::Accepted(_)));
    assert_eq!(auth.failures(), 1);
}

#[test]
fn test_impostor_rejected_after_all_attempts() {
    let profile = trained_profile();
    let mut auth = authenticator(&profile);
    let mut typist = Typist::new();

    let mut outcome = AuthOutcome::Collecting;
    for _ in 0..3 {
        outcome = type_into(&mut auth, typist.steady("abc", 200.0));
    }
    assert!(matches!(outcome, AuthOutcome::Rejected { failures: 3, .. }));
    assert!(outcome.is_final());

    // Further typing does not change a final outcome
    let after = type_into(&mut auth, typist.attempt("abc", &[102.5, 117.5, 111.0]));
    assert_eq!(after, outcome);
}

#[test]
fn test_mistyped_auth_attempt_is_not_a_decision() {
    let profile = trained_profile();
    let mut auth = authenticator(&profile);
    let mut typist = Typist::new();

    let outcome = type_into(&mut auth, typist.steady("abd", 100.0));
    assert_eq!(outcome, AuthOutcome::Collecting);
    assert_eq!(auth.failures(), 0);
    assert_eq!(auth.capture().mistakes(), 1);
}

#[test]
fn test_untrained_profile_never_accepts() {
    let profile = Profile::new(Phrase::new("abc").unwrap(), 0);
    let mut auth = authenticator(&profile);
    assert_eq!(auth.outcome(), &AuthOutcome::InsufficientData);

    let mut typist = Typist::new();
    let outcome = type_into(&mut auth, typist.steady("abc", 100.0));
    assert_eq!(outcome, AuthOutcome::InsufficientData);
}

#[test]
fn test_cancel_during_auth() {
    let profile = trained_profile();
    let mut auth = authenticator(&profile);

    let step = auth.handle(KeyEvent::Cancel).unwrap();
    assert_eq!(step.outcome, AuthOutcome::Cancelled);
    assert_eq!(step.notices, vec![CaptureNotice::Cancelled]);
}

#[test]
fn test_profile_with_truncated_stats_is_rejected() {
    let mut profile = trained_profile();
    profile.means.pop();
    let err = Authenticator::new(&profile, AuthPolicy::default(), 3, 0.05, 0).unwrap_err();
    assert!(err.is_contract_violation());
}
