//! Numerical building blocks shared by the estimators.
//!
//! Least-squares fits are done on centered data; the quadratic fit solves the
//! 3x3 normal equations with an LU decomposition.

use crate::errors::{MmarError, MmarResult};
use nalgebra::{Matrix3, Vector3};

/// Numerical tolerances.
pub mod constants {
    /// Determinant floor below which a normal-equation matrix is treated as singular
    pub const MATRIX_CONDITION_EPSILON: f64 = 1e-12;

    /// Minimum spread of a regressor
    pub const MIN_VARIANCE: f64 = 1e-15;
}

/// Float comparison helpers.
pub mod float_ops {
    /// Approximate zero with an explicit epsilon.
    #[inline]
    pub fn approx_zero_eps(x: f64, epsilon: f64) -> bool {
        x.abs() <= epsilon
    }
}

/// Result of a simple linear regression `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Fitted slope
    pub slope: f64,
    /// Fitted intercept
    pub intercept: f64,
    /// Coefficient of determination (1.0 for an exact two-point fit)
    pub r_squared: f64,
}

/// Ordinary least squares of `y` on `x` with equal weights.
///
/// Two points are enough: the slope is then the secant through them.
pub fn ols_fit(x: &[f64], y: &[f64]) -> MmarResult<LinearFit> {
    if x.len() != y.len() {
        return Err(MmarError::NumericalError {
            reason: format!("Regression inputs differ in length: {} vs {}", x.len(), y.len()),
        });
    }
    if x.len() < 2 {
        return Err(MmarError::NumericalError {
            reason: format!("Regression needs at least 2 points, got {}", x.len()),
        });
    }
    if !x.iter().chain(y).all(|v| v.is_finite()) {
        return Err(MmarError::NumericalError {
            reason: "Non-finite values in regression data".to_string(),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let syy: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();

    if float_ops::approx_zero_eps(sxx, constants::MIN_VARIANCE) {
        return Err(MmarError::NumericalError {
            reason: "Predictor variable has zero variance (constant values)".to_string(),
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if float_ops::approx_zero_eps(syy, constants::MIN_VARIANCE) {
        1.0
    } else {
        (sxy * sxy) / (sxx * syy)
    };

    if !slope.is_finite() || !intercept.is_finite() {
        return Err(MmarError::NumericalError {
            reason: "Non-finite regression coefficients computed".to_string(),
        });
    }

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Least-squares quadratic `y ≈ a·x² + b·x + c`, returned as `(a, b, c)`.
pub fn fit_quadratic(x: &[f64], y: &[f64]) -> MmarResult<(f64, f64, f64)> {
    if x.len() != y.len() || x.len() < 3 {
        return Err(MmarError::NumericalError {
            reason: format!(
                "Quadratic fit needs at least 3 paired points, got {} x and {} y",
                x.len(),
                y.len()
            ),
        });
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_x2: f64 = x.iter().map(|xi| xi.powi(2)).sum();
    let sum_x3: f64 = x.iter().map(|xi| xi.powi(3)).sum();
    let sum_x4: f64 = x.iter().map(|xi| xi.powi(4)).sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(xi, yi)| xi * yi).sum();
    let sum_x2y: f64 = x.iter().zip(y).map(|(xi, yi)| xi.powi(2) * yi).sum();

    // Unknowns ordered (c, b, a).
    let normal = Matrix3::new(
        n, sum_x, sum_x2, //
        sum_x, sum_x2, sum_x3, //
        sum_x2, sum_x3, sum_x4,
    );
    let rhs = Vector3::new(sum_y, sum_xy, sum_x2y);

    if float_ops::approx_zero_eps(normal.determinant().abs(), constants::MATRIX_CONDITION_EPSILON)
    {
        return Err(MmarError::NumericalError {
            reason: "Quadratic normal equations are singular (need 3 distinct x values)"
                .to_string(),
        });
    }

    let coefficients = normal
        .lu()
        .solve(&rhs)
        .ok_or_else(|| MmarError::NumericalError {
            reason: "LU solve of quadratic normal equations failed".to_string(),
        })?;

    let (c, b, a) = (coefficients[0], coefficients[1], coefficients[2]);
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(MmarError::NumericalError {
            reason: "Non-finite quadratic coefficients computed".to_string(),
        });
    }
    Ok((a, b, c))
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    (!data.is_empty()).then(|| data.iter().sum::<f64>() / data.len() as f64)
}

/// Population variance (divides by n).
pub fn population_variance(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    Some(data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64)
}

/// Sample variance (divides by n - 1).
pub fn sample_variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data)?;
    Some(data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64)
}

/// Moment-based skewness and excess kurtosis, `None` for constant or short data.
pub fn skewness_kurtosis(data: &[f64]) -> Option<(f64, f64)> {
    if data.len() < 4 {
        return None;
    }
    let m = mean(data)?;
    let n = data.len() as f64;
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    if float_ops::approx_zero_eps(m2, constants::MIN_VARIANCE) {
        return None;
    }
    let m3 = data.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    let m4 = data.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n;
    Some((m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0))
}

/// All positive divisors of `n` in increasing order.
///
/// ```rust
/// use fractal_mmar::math_utils::divisors;
///
/// assert_eq!(divisors(12), vec![1, 2, 3, 4, 6, 12]);
/// assert!(divisors(0).is_empty());
/// ```
pub fn divisors(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let mut small = Vec::new();
    let mut large = Vec::new();
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            small.push(i);
            if i != n / i {
                large.push(n / i);
            }
        }
        i += 1;
    }
    small.extend(large.into_iter().rev());
    small
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_ols_recovers_exact_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|xi| 3.0 - 0.75 * xi).collect();
        let fit = ols_fit(&x, &y).unwrap();
        assert_approx_eq!(fit.slope, -0.75, 1e-12);
        assert_approx_eq!(fit.intercept, 3.0, 1e-12);
        assert_approx_eq!(fit.r_squared, 1.0, 1e-12);
    }

    #[test]
    fn test_ols_two_points_is_secant() {
        let fit = ols_fit(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert_approx_eq!(fit.slope, 2.0, 1e-12);
    }

    #[test]
    fn test_ols_rejects_degenerate_inputs() {
        assert!(ols_fit(&[1.0], &[1.0]).is_err());
        assert!(ols_fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(ols_fit(&[1.0, 2.0], &[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_quadratic_fit_exact() {
        let x: Vec<f64> = (0..8).map(|i| 0.5 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|q| -0.2 * q * q + 0.9 * q - 1.0).collect();
        let (a, b, c) = fit_quadratic(&x, &y).unwrap();
        assert_approx_eq!(a, -0.2, 1e-9);
        assert_approx_eq!(b, 0.9, 1e-9);
        assert_approx_eq!(c, -1.0, 1e-9);
    }

    #[test]
    fn test_quadratic_fit_needs_three_distinct_points() {
        assert!(fit_quadratic(&[1.0, 2.0], &[1.0, 2.0]).is_err());
        assert!(fit_quadratic(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_moments() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(mean(&data).unwrap(), 2.5, 1e-12);
        assert_approx_eq!(population_variance(&data).unwrap(), 1.25, 1e-12);
        assert_approx_eq!(sample_variance(&data).unwrap(), 5.0 / 3.0, 1e-12);
        let (skew, _) = skewness_kurtosis(&data).unwrap();
        assert_approx_eq!(skew, 0.0, 1e-12);
        assert!(skewness_kurtosis(&[1.0; 10]).is_none());
    }

    #[test]
    fn test_divisors_of_original_window() {
        let d = divisors(7560);
        assert_eq!(d.first(), Some(&1));
        assert_eq!(d.last(), Some(&7560));
        assert_eq!(d.len(), 64);
        assert!(d.windows(2).all(|w| w[0] < w[1]));
    }
}
