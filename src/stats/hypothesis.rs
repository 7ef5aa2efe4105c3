// Critical values and two-sample hypothesis tests
//
// Wraps statrs' Student's t and Fisher-Snedecor quantile functions. The
// outlier filter needs only `t_critical`; the remaining tests are the
// offline comparison surface (e.g. comparing a user's dwell sample against
// an impostor's).

use crate::error::{KeyguardError, Result};
use crate::stats::descriptive::{mean, variance};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(KeyguardError::InvalidConfig(format!(
            "significance level must be in (0, 1), got {}",
            alpha
        )))
    }
}

/// Two-sided critical value of Student's t distribution
///
/// Returns the `1 - alpha/2` quantile at `df` degrees of freedom.
///
/// # Example
/// ```
/// use keyguard::stats::t_critical;
///
/// let t = t_critical(10.0, 0.05).unwrap();
/// assert!((t - 2.228).abs() < 1e-3);
/// ```
pub fn t_critical(df: f64, alpha: f64) -> Result<f64> {
    check_alpha(alpha)?;
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| KeyguardError::InvalidConfig(format!("Student's t (df={}): {}", df, e)))?;
    Ok(dist.inverse_cdf(1.0 - alpha / 2.0))
}

/// Upper critical value of Fisher's F distribution at `1 - alpha/2`
pub fn f_critical(dfn: f64, dfd: f64, alpha: f64) -> Result<f64> {
    check_alpha(alpha)?;
    let dist = FisherSnedecor::new(dfn, dfd).map_err(|e| {
        KeyguardError::InvalidConfig(format!("Fisher's F (dfn={}, dfd={}): {}", dfn, dfd, e))
    })?;
    Ok(dist.inverse_cdf(1.0 - alpha / 2.0))
}

/// Result of Fisher's equal-variance test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FTest {
    /// Larger variance over smaller variance
    pub statistic: f64,
    pub critical: f64,
    /// Null hypothesis (equal variances) not rejected
    pub equal_variances: bool,
}

/// Fisher's F-test for equality of two variances
///
/// The larger variance is placed in the numerator and its sample supplies
/// the numerator degrees of freedom.
///
/// # Errors
/// `InsufficientData` when either sample has fewer than 2 observations.
pub fn f_test(var1: f64, var2: f64, n1: usize, n2: usize, alpha: f64) -> Result<FTest> {
    if n1 < 2 || n2 < 2 {
        return Err(KeyguardError::InsufficientData {
            required: 2,
            actual: n1.min(n2),
        });
    }

    let (hi, lo, dfn, dfd) = if var1 >= var2 {
        (var1, var2, n1 - 1, n2 - 1)
    } else {
        (var2, var1, n2 - 1, n1 - 1)
    };

    let statistic = if hi == 0.0 {
        1.0
    } else if lo == 0.0 {
        f64::INFINITY
    } else {
        hi / lo
    };
    let critical = f_critical(dfn as f64, dfd as f64, alpha)?;

    Ok(FTest {
        statistic,
        critical,
        equal_variances: statistic < critical,
    })
}

/// Standard-error formula used by a two-sample t-test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TTestMethod {
    /// Student's test with pooled variance (equal variances)
    Pooled,
    /// Welch's test with Satterthwaite degrees of freedom (unequal variances)
    Welch,
}

/// Result of a two-sample t-test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTest {
    pub method: TTestMethod,
    /// |t| statistic
    pub statistic: f64,
    pub df: f64,
    pub critical: f64,
    /// Null hypothesis (equal means) not rejected
    pub means_equal: bool,
}

/// Two-sample t-test for equality of means
///
/// # Errors
/// `InsufficientData` when either sample has fewer than 2 observations.
pub fn t_test(sample1: &[f64], sample2: &[f64], alpha: f64, method: TTestMethod) -> Result<TTest> {
    let n1 = sample1.len();
    let n2 = sample2.len();
    if n1 < 2 || n2 < 2 {
        return Err(KeyguardError::InsufficientData {
            required: 2,
            actual: n1.min(n2),
        });
    }

    let (m1, m2) = (mean(sample1)?, mean(sample2)?);
    let (v1, v2) = (variance(sample1)?, variance(sample2)?);
    let (n1f, n2f) = (n1 as f64, n2 as f64);

    let (std_err, df) = match method {
        TTestMethod::Pooled => {
            let pooled = ((n1f - 1.0) * v1 + (n2f - 1.0) * v2) / (n1f + n2f - 2.0);
            (
                (pooled * (1.0 / n1f + 1.0 / n2f)).sqrt(),
                n1f + n2f - 2.0,
            )
        }
        TTestMethod::Welch => {
            let a = v1 / n1f;
            let b = v2 / n2f;
            let denom = a * a / (n1f - 1.0) + b * b / (n2f - 1.0);
            let df = if denom == 0.0 {
                n1f + n2f - 2.0
            } else {
                (a + b) * (a + b) / denom
            };
            ((a + b).sqrt(), df)
        }
    };

    let diff = (m1 - m2).abs();
    let statistic = if std_err == 0.0 {
        if diff == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        diff / std_err
    };
    let critical = t_critical(df, alpha)?;

    Ok(TTest {
        method,
        statistic,
        df,
        critical,
        means_equal: statistic < critical,
    })
}

/// Combined equal-variance and equal-mean comparison of two samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleComparison {
    pub f_test: FTest,
    pub t_test: TTest,
}

/// Compare two independent samples
///
/// Runs Fisher's F-test first; equal variances select the pooled t-test,
/// unequal variances select Welch's.
pub fn compare_samples(sample1: &[f64], sample2: &[f64], alpha: f64) -> Result<SampleComparison> {
    if sample1.len() < 2 || sample2.len() < 2 {
        return Err(KeyguardError::InsufficientData {
            required: 2,
            actual: sample1.len().min(sample2.len()),
        });
    }

    let f = f_test(
        variance(sample1)?,
        variance(sample2)?,
        sample1.len(),
        sample2.len(),
        alpha,
    )?;
    let method = if f.equal_variances {
        TTestMethod::Pooled
    } else {
        TTestMethod::Welch
    };
    let t = t_test(sample1, sample2, alpha, method)?;

    Ok(SampleComparison {
        f_test: f,
        t_test: t,
    })
}
