//! Gross-error rejection for dwell-time runs
//!
//! Detection is per phrase position: the most extreme value in a column is
//! tested with a t-statistic against the two-sided critical value at `n-2`
//! degrees of freedom and removed while it exceeds it. Removal is per run: a
//! run flagged at any position is dropped from the session entirely.
//!
//! Dropping whole runs changes the other columns, so detection is repeated
//! on the survivors until a pass flags nothing. The filter is therefore
//! idempotent.

use crate::error::{KeyguardError, Result};
use crate::profile::Run;
use crate::stats::{mean, stddev, t_critical};
use std::collections::BTreeSet;
use tracing::debug;

/// Default significance level for outlier rejection
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Minimum sample size for a rejection test
pub const MIN_SAMPLES: usize = 3;

/// Indices (into `values`) rejected as gross errors, in rejection order
///
/// Returns an empty list for fewer than [`MIN_SAMPLES`] values or a sample
/// with zero deviation.
pub fn outlier_indices(values: &[f64], alpha: f64) -> Result<Vec<usize>> {
    let mut working: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    let mut rejected = Vec::new();

    while working.len() >= MIN_SAMPLES {
        let sample: Vec<f64> = working.iter().map(|(_, v)| *v).collect();
        let n = sample.len();
        let m = mean(&sample)?;
        let sd = stddev(&sample)?;
        if sd == 0.0 {
            break;
        }

        let (slot, deviation) = sample
            .iter()
            .map(|v| (v - m).abs())
            .enumerate()
            .fold((0, f64::MIN), |best, (i, dev)| {
                if dev > best.1 {
                    (i, dev)
                } else {
                    best
                }
            });

        let t_stat = deviation / (sd / (n as f64).sqrt());
        let t_crit = t_critical((n - 2) as f64, alpha)?;
        if t_stat <= t_crit {
            break;
        }

        let (index, value) = working.remove(slot);
        debug!(index, value, t_stat, t_crit, "rejected gross error");
        rejected.push(index);
    }

    Ok(rejected)
}

/// Remove gross errors from a single sample
///
/// Samples with fewer than 3 values are returned unchanged.
///
/// # Example
/// ```
/// use keyguard::outlier::remove_outliers;
///
/// let data = [100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 250.0];
/// let cleaned = remove_outliers(&data, 0.05).unwrap();
/// assert!(!cleaned.contains(&250.0));
/// assert!(cleaned.len() < data.len());
/// ```
pub fn remove_outliers(values: &[f64], alpha: f64) -> Result<Vec<f64>> {
    let rejected: BTreeSet<usize> = outlier_indices(values, alpha)?.into_iter().collect();
    Ok(values
        .iter()
        .enumerate()
        .filter(|(i, _)| !rejected.contains(i))
        .map(|(_, v)| *v)
        .collect())
}

/// Indices of runs flagged as an outlier at any position (single pass)
///
/// # Errors
/// `RunLengthMismatch` when the runs differ in length.
pub fn outlier_runs(runs: &[Run], alpha: f64) -> Result<BTreeSet<usize>> {
    let mut flagged = BTreeSet::new();
    let Some(first) = runs.first() else {
        return Ok(flagged);
    };
    let width = first.len();
    if let Some(bad) = runs.iter().find(|r| r.len() != width) {
        return Err(KeyguardError::RunLengthMismatch {
            expected: width,
            found: bad.len(),
        });
    }

    if runs.len() < MIN_SAMPLES {
        return Ok(flagged);
    }

    for pos in 0..width {
        let column: Vec<f64> = runs.iter().map(|r| r[pos]).collect();
        for index in outlier_indices(&column, alpha)? {
            if flagged.insert(index) {
                debug!(run = index, position = pos, "run flagged as outlier");
            }
        }
    }

    Ok(flagged)
}

/// Drop every run that is an outlier at any phrase position
///
/// Fewer than 3 runs are returned unchanged. Run order is preserved.
pub fn remove_outliers_per_position(runs: &[Run], alpha: f64) -> Result<Vec<Run>> {
    let mut kept: Vec<Run> = runs.to_vec();

    loop {
        let flagged = outlier_runs(&kept, alpha)?;
        if flagged.is_empty() {
            break;
        }
        kept = kept
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !flagged.contains(i))
            .map(|(_, run)| run)
            .collect();
    }

    if kept.len() != runs.len() {
        debug!(
            before = runs.len(),
            after = kept.len(),
            "outlier runs removed from session"
        );
    }
    Ok(kept)
}
