//! Normality diagnostics on log-returns, run before the scaling analysis.
//!
//! Reports descriptive statistics only: the Jarque–Bera statistic and the
//! Kolmogorov–Smirnov distance to N(0, 1) are returned as numbers, with no
//! p-values and no accept/reject decision.

use crate::errors::{validate_all_finite, MmarError, MmarResult};
use crate::math_utils::{mean, sample_variance, skewness_kurtosis};
use crate::returns::ReturnSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Minimum number of observations for the diagnostics.
pub const MIN_DIAGNOSTIC_OBSERVATIONS: usize = 5;

/// Shape statistics of a return sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalityDiagnostics {
    /// Sample size
    pub observations: usize,
    /// Sample mean
    pub mean: f64,
    /// Sample standard deviation (n − 1 denominator)
    pub std_dev: f64,
    /// Moment skewness
    pub skewness: f64,
    /// Moment kurtosis minus 3
    pub excess_kurtosis: f64,
    /// `n/6 · (S² + K²/4)`
    pub jarque_bera: f64,
    /// `sup |F_n(z) − Φ(z)|` over the standardized sample
    pub ks_distance: f64,
}

/// Diagnostics of an arbitrary sample.
pub fn normality_diagnostics(data: &[f64]) -> MmarResult<NormalityDiagnostics> {
    let n = data.len();
    if n < MIN_DIAGNOSTIC_OBSERVATIONS {
        return Err(MmarError::InvalidSeries {
            reason: format!(
                "normality diagnostics need at least {} observations, got {}",
                MIN_DIAGNOSTIC_OBSERVATIONS, n
            ),
        });
    }
    validate_all_finite(data, "returns")?;

    let mu = mean(data).unwrap_or(0.0);
    let std_dev = sample_variance(data).unwrap_or(0.0).sqrt();
    let (skewness, excess_kurtosis) =
        skewness_kurtosis(data).ok_or_else(|| MmarError::InvalidSeries {
            reason: "returns are constant; normality diagnostics are undefined".to_string(),
        })?;

    let jarque_bera =
        n as f64 / 6.0 * (skewness * skewness + excess_kurtosis * excess_kurtosis / 4.0);

    let normal = Normal::new(0.0, 1.0).map_err(|e| MmarError::NumericalError {
        reason: format!("standard normal construction failed: {}", e),
    })?;
    let mut standardized: Vec<f64> = data.iter().map(|x| (x - mu) / std_dev).collect();
    standardized.sort_by(f64::total_cmp);

    let ks_distance = standardized
        .iter()
        .enumerate()
        .map(|(i, &z)| {
            let cdf = normal.cdf(z);
            let above = (i + 1) as f64 / n as f64 - cdf;
            let below = cdf - i as f64 / n as f64;
            above.max(below)
        })
        .fold(0.0, f64::max);

    Ok(NormalityDiagnostics {
        observations: n,
        mean: mu,
        std_dev,
        skewness,
        excess_kurtosis,
        jarque_bera,
        ks_distance,
    })
}

/// Diagnostics of the adjacent log-returns of `returns`.
pub fn diagnose_returns(returns: &ReturnSeries) -> MmarResult<NormalityDiagnostics> {
    let diagnostics = normality_diagnostics(returns.adjacent())?;
    log::debug!(
        "Log-return diagnostics: skew {:.3}, excess kurtosis {:.3}, JB {:.2}, KS {:.4}",
        diagnostics.skewness,
        diagnostics.excess_kurtosis,
        diagnostics.jarque_bera,
        diagnostics.ks_distance
    );
    Ok(diagnostics)
}
