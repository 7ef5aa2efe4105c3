// Descriptive statistics over dwell-time samples
//
// All variances use the unbiased (n-1) estimator. Profile, session and
// outlier computations share these functions so the incremental and
// rebuild aggregation paths agree to floating-point tolerance.

use crate::error::{KeyguardError, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean of a sample
///
/// # Errors
/// `InsufficientData` when `values` is empty.
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(KeyguardError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n-1 denominator)
///
/// # Errors
/// `InsufficientData` when fewer than 2 values are given.
///
/// # Example
/// ```
/// use keyguard::stats::variance;
///
/// let var = variance(&[2.0, 4.0, 6.0, 8.0]).unwrap();
/// assert!((var - 20.0 / 3.0).abs() < 1e-12);
/// ```
pub fn variance(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(KeyguardError::InsufficientData {
            required: 2,
            actual: values.len(),
        });
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation (n-1 denominator)
pub fn stddev(values: &[f64]) -> Result<f64> {
    variance(values).map(f64::sqrt)
}

/// Per-position mean and sample variance over a set of equal-length runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    /// Mean dwell time per phrase position (ms)
    pub means: Vec<f64>,
    /// Sample variance per phrase position (ms²)
    pub variances: Vec<f64>,
    /// Number of runs the statistics were computed from
    pub count: usize,
}

impl PositionStats {
    /// Number of phrase positions covered
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Per-position standard deviations
    pub fn stddevs(&self) -> Vec<f64> {
        self.variances.iter().map(|v| v.sqrt()).collect()
    }
}

/// Transpose runs by position and compute mean and sample variance per column
///
/// A single run yields variance 0 at every position.
///
/// # Errors
/// - `InsufficientData` when `runs` is empty
/// - `RunLengthMismatch` when the runs differ in length
pub fn column_stats<R: AsRef<[f64]>>(runs: &[R]) -> Result<PositionStats> {
    let first = runs.first().ok_or(KeyguardError::InsufficientData {
        required: 1,
        actual: 0,
    })?;
    let width = first.as_ref().len();

    for run in runs {
        let found = run.as_ref().len();
        if found != width {
            return Err(KeyguardError::RunLengthMismatch {
                expected: width,
                found,
            });
        }
    }

    let mut means = Vec::with_capacity(width);
    let mut variances = Vec::with_capacity(width);
    let mut column = Vec::with_capacity(runs.len());

    for pos in 0..width {
        column.clear();
        column.extend(runs.iter().map(|run| run.as_ref()[pos]));
        means.push(mean(&column)?);
        variances.push(if column.len() < 2 {
            0.0
        } else {
            variance(&column)?
        });
    }

    Ok(PositionStats {
        means,
        variances,
        count: runs.len(),
    })
}

/// Mean and sample standard deviation over every value of every run
///
/// Returns `(0.0, 0.0)` for no values and a zero deviation for a single value.
pub fn flattened_summary<R: AsRef<[f64]>>(runs: &[R]) -> (f64, f64) {
    let flat: Vec<f64> = runs
        .iter()
        .flat_map(|run| run.as_ref().iter().copied())
        .collect();

    let m = mean(&flat).unwrap_or(0.0);
    let sd = stddev(&flat).unwrap_or(0.0);
    (m, sd)
}
