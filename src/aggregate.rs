//! Profile aggregation: incremental pooling and full rebuild
//!
//! Both paths use the sample (n-1) variance. The incremental path pools sums
//! of squared deviations (`M2 = var * (n - 1)`), which is exact for the n-1
//! convention, so folding sessions one by one agrees with a rebuild over the
//! same history up to floating-point rounding.

use crate::error::{KeyguardError, Result};
use crate::profile::{Profile, Run, Session};
use crate::stats::{column_stats, PositionStats};
use tracing::{debug, info};

/// Pool two groups of per-position statistics without the raw runs
///
/// An empty `current` (no runs yet) adopts `session` as-is.
///
/// The variance is the pooled sample (n-1) variance of the combined runs,
/// which differs from the population-form two-group identity
/// `(n_a*var_a + n_b*var_b)/n + n_a*n_b*d^2/n^2`.
///
/// # Example
/// ```
/// use keyguard::aggregate::pool_position_stats;
/// use keyguard::stats::PositionStats;
///
/// let old = PositionStats { means: vec![100.0], variances: vec![25.0], count: 10 };
/// let new = PositionStats { means: vec![110.0], variances: vec![16.0], count: 5 };
/// let pooled = pool_position_stats(&old, &new).unwrap();
///
/// assert_eq!(pooled.count, 15);
/// assert!((pooled.means[0] - 1550.0 / 15.0).abs() < 1e-12);
/// ```
pub fn pool_position_stats(current: &PositionStats, session: &PositionStats) -> Result<PositionStats> {
    if session.count == 0 {
        return Ok(current.clone());
    }
    if current.count == 0 || current.is_empty() {
        return Ok(session.clone());
    }
    if current.len() != session.len() {
        return Err(KeyguardError::RunLengthMismatch {
            expected: current.len(),
            found: session.len(),
        });
    }

    let n_old = current.count as f64;
    let n_new = session.count as f64;
    let n_total = n_old + n_new;

    let mut means = Vec::with_capacity(current.len());
    let mut variances = Vec::with_capacity(current.len());

    for pos in 0..current.len() {
        let (m_old, v_old) = (current.means[pos], current.variances[pos]);
        let (m_s, v_s) = (session.means[pos], session.variances[pos]);

        let delta = m_old - m_s;
        let m2 = v_old * (n_old - 1.0) + v_s * (n_new - 1.0) + delta * delta * (n_old * n_new / n_total);

        means.push((m_old * n_old + m_s * n_new) / n_total);
        variances.push(m2 / (n_total - 1.0));
    }

    Ok(PositionStats {
        means,
        variances,
        count: current.count + session.count,
    })
}

fn check_run_lengths(profile: &Profile, runs: &[Run]) -> Result<()> {
    let expected = profile.phrase.len();
    match runs.iter().find(|r| r.len() != expected) {
        Some(bad) => Err(KeyguardError::RunLengthMismatch {
            expected,
            found: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Fold a session's accepted runs into the profile statistics
///
/// Does not append the session to the history; see [`fold_session`]. The
/// profile is only written once every statistic has been computed.
pub fn update_aggregate_profile(profile: &mut Profile, session: &Session) -> Result<()> {
    if session.runs.is_empty() {
        debug!(session = %session.id, "session has no runs, profile unchanged");
        return Ok(());
    }
    check_run_lengths(profile, &session.runs)?;

    let session_stats = column_stats(&session.runs)?;
    let updated = match profile.position_stats() {
        Some(current) => pool_position_stats(&current, &session_stats)?,
        None => session_stats,
    };

    profile.means = updated.means;
    profile.variances = updated.variances;
    profile.total_runs = updated.count;

    debug!(
        profile = %profile.id,
        new_runs = session.runs.len(),
        total_runs = profile.total_runs,
        "profile statistics updated"
    );
    Ok(())
}

/// Recompute profile statistics from every run in the session history
pub fn rebuild_profile_from_history(profile: &mut Profile) -> Result<()> {
    let all_runs: Vec<&Run> = profile.sessions.iter().flat_map(|s| s.runs.iter()).collect();

    if all_runs.is_empty() {
        profile.means.clear();
        profile.variances.clear();
        profile.total_runs = 0;
        return Ok(());
    }

    let expected = profile.phrase.len();
    if let Some(bad) = all_runs.iter().find(|r| r.len() != expected) {
        return Err(KeyguardError::RunLengthMismatch {
            expected,
            found: bad.len(),
        });
    }

    let rebuilt = column_stats(&all_runs)?;
    profile.means = rebuilt.means;
    profile.variances = rebuilt.variances;
    profile.total_runs = rebuilt.count;

    info!(
        profile = %profile.id,
        sessions = profile.sessions.len(),
        total_runs = profile.total_runs,
        "profile rebuilt from history"
    );
    Ok(())
}

/// Append a completed enrollment session and update the statistics
///
/// Works on a copy: on error the caller's profile is untouched.
pub fn fold_session(profile: &Profile, session: Session, now: u64) -> Result<Profile> {
    if session.phrase != profile.phrase {
        return Err(KeyguardError::PhraseMismatch {
            expected: profile.phrase.to_string(),
            found: session.phrase.to_string(),
        });
    }

    let mut updated = profile.clone();
    update_aggregate_profile(&mut updated, &session)?;
    updated.sessions.push(session);
    updated.updated_at = now;
    Ok(updated)
}
