// Statistical primitives for keystroke dwell-time analysis
//
// - descriptive: mean, sample variance/stdev, per-position column statistics
// - hypothesis: Student's t and Fisher's F critical values, F-test, pooled
//   and Welch t-tests
// - error rates over recorded authentication trial outcomes
//
// Quantiles come from statrs; everything else is plain f64 arithmetic so the
// profile statistics keep double precision end to end.

mod descriptive;
mod hypothesis;

pub use descriptive::{column_stats, flattened_summary, mean, stddev, variance, PositionStats};
pub use hypothesis::{
    compare_samples, f_critical, f_test, t_critical, t_test, FTest, SampleComparison, TTest,
    TTestMethod,
};

use serde::Serialize;

/// Error rates of the first and second kind over a set of trial outcomes
///
/// The computation is outcome-agnostic: the caller supplies a homogeneous
/// trial set (all genuine-user attempts, or all impostor attempts) and reads
/// the rate that applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorRates {
    /// Fraction of `false` outcomes (legitimate user rejected)
    pub type_one: f64,
    /// Fraction of `true` outcomes (impostor accepted)
    pub type_two: f64,
    /// Number of trials
    pub trials: usize,
}

/// Compute Type-I and Type-II error rates from boolean trial outcomes
///
/// # Example
/// ```
/// use keyguard::stats::calculate_error_rates;
///
/// let rates = calculate_error_rates(&[true, true, false, true]);
/// assert_eq!(rates.type_one, 0.25);
/// assert_eq!(rates.type_two, 0.75);
/// ```
pub fn calculate_error_rates(results: &[bool]) -> ErrorRates {
    let trials = results.len();
    if trials == 0 {
        return ErrorRates {
            type_one: 0.0,
            type_two: 0.0,
            trials,
        };
    }

    let rejected = results.iter().filter(|ok| !**ok).count();
    let accepted = trials - rejected;

    ErrorRates {
        type_one: rejected as f64 / trials as f64,
        type_two: accepted as f64 / trials as f64,
        trials,
    }
}
