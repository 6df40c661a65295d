//! Multifractal spectrum f(α) from τ(q).
//!
//! Two independent routes are kept side by side for cross-validation:
//!
//! - **Legendre**: `α(q) = dτ/dq` by finite differences on the q grid
//!   (centered inside, one-sided at the two ends), `f(α) = q·α − τ(q)`.
//! - **Polynomial**: least-squares quadratic `τ(q) ≈ a·q² + b·q + c` over a
//!   caller-chosen index range, then closed form `α(q) = 2a·q + b` and
//!   `f(α) = q·α − τ̂(q) = a·q² − c`.
//!
//! Neither result is merged into the other.

use crate::errors::{MmarError, MmarResult};
use crate::grids::same_moment;
use crate::math_utils::fit_quadratic;
use crate::scaling::ScalingCurve;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Route used to compute a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpectrumMethod {
    /// Finite-difference Legendre transform
    Legendre,
    /// Closed-form transform of a quadratic fit (less sensitive to grid noise).
    ///
    /// The spectrum is only evaluated on the fitted q range, which by default
    /// starts at q = 1. For a concave fit f(q) = aq² − c peaks at q = 0, so the
    /// reported peak is usually the q = 1 end of the range: α₀ = τ̂′(1) rather
    /// than the parabola vertex `b`. On near-monofractal data that α₀ can fall
    /// just below H, giving a slightly negative σ² downstream.
    #[default]
    Polynomial,
}

/// Parallel arrays `(q, α, f(α))` from one route.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MultifractalSpectrum {
    /// Route that produced this spectrum
    pub method: SpectrumMethod,
    /// Moment orders the spectrum is indexed by
    pub q: Vec<f64>,
    /// Singularity strengths α(q)
    pub alpha: Vec<f64>,
    /// Spectrum values f(α(q))
    pub f_alpha: Vec<f64>,
}

/// Maximum of f(α).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectrumPeak {
    /// Moment order at the peak
    pub q: f64,
    /// α₀ = argmax f(α)
    pub alpha: f64,
    /// f(α₀)
    pub f_alpha: f64,
}

impl MultifractalSpectrum {
    /// α at the largest f(α); the first one wins on ties.
    pub fn peak(&self) -> Option<SpectrumPeak> {
        let mut best: Option<usize> = None;
        for (i, f) in self.f_alpha.iter().enumerate() {
            if !f.is_finite() {
                continue;
            }
            match best {
                Some(b) if self.f_alpha[b] >= *f => {}
                _ => best = Some(i),
            }
        }
        best.map(|i| SpectrumPeak {
            q: self.q[i],
            alpha: self.alpha[i],
            f_alpha: self.f_alpha[i],
        })
    }

    /// Width `α_max − α_min` of the spectrum, a common multifractality measure.
    pub fn width(&self) -> Option<f64> {
        let finite = self.alpha.iter().copied().filter(|a| a.is_finite());
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| {
            (lo.min(a), hi.max(a))
        });
        (min <= max).then(|| max - min)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// True if the spectrum has no points.
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }
}

/// Coefficients of the quadratic fit `τ(q) ≈ a·q² + b·q + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuadraticFit {
    /// q² coefficient
    pub a: f64,
    /// q coefficient
    pub b: f64,
    /// Constant term
    pub c: f64,
    /// Half-open index range of the grid that was fitted
    pub range: (usize, usize),
}

/// Normal-distribution reading of the quadratic, reported as a diagnostic only.
///
/// In α the closed-form spectrum is `f(α) = (α − b)² / (4a) − c`, a parabola
/// with vertex at α = b.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImpliedNormal {
    /// `1 / (4a)`, the coefficient of `(α − b)²` in f(α)
    pub mean: f64,
    /// `−2a`, variance of the Gaussian whose log-density has the curvature of f(α)
    pub variance: f64,
    /// `b`, vertex of the parabola
    pub peak_alpha: f64,
    /// `−c`, height of the vertex
    pub peak_f: f64,
}

impl QuadraticFit {
    /// τ̂(q) from the fitted coefficients.
    pub fn tau(&self, q: f64) -> f64 {
        self.a * q * q + self.b * q + self.c
    }

    /// Closed-form α(q) = 2a·q + b.
    pub fn alpha(&self, q: f64) -> f64 {
        2.0 * self.a * q + self.b
    }

    /// Closed-form f as a function of q: `a·q² − c`.
    pub fn f_of_q(&self, q: f64) -> f64 {
        self.a * q * q - self.c
    }

    /// Closed-form f as a function of α; `None` when the fit is linear.
    pub fn f_of_alpha(&self, alpha: f64) -> Option<f64> {
        (self.a != 0.0).then(|| (alpha - self.b).powi(2) / (4.0 * self.a) - self.c)
    }

    /// Diagnostic normal parameters; `None` when the fit is linear.
    pub fn implied_normal(&self) -> Option<ImpliedNormal> {
        (self.a != 0.0).then(|| ImpliedNormal {
            mean: 1.0 / (4.0 * self.a),
            variance: -2.0 * self.a,
            peak_alpha: self.b,
            peak_f: -self.c,
        })
    }
}

/// Polynomial-route spectrum together with its fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolynomialSpectrum {
    /// Closed-form spectrum over the fitted range
    pub spectrum: MultifractalSpectrum,
    /// Fitted coefficients
    pub fit: QuadraticFit,
    /// Diagnostic reading of the coefficients
    pub implied_normal: Option<ImpliedNormal>,
}

/// Finite-difference Legendre transform over the whole grid.
///
/// Needs at least two points and no gaps.
pub fn legendre_spectrum(curve: &ScalingCurve) -> MmarResult<MultifractalSpectrum> {
    let points = curve.require_complete()?;
    let n = points.len();
    if n < 2 {
        return Err(MmarError::InvalidGrid {
            reason: format!("Legendre transform needs at least 2 moment orders, got {}", n),
        });
    }

    let q: Vec<f64> = points.iter().map(|p| p.0).collect();
    let tau: Vec<f64> = points.iter().map(|p| p.1).collect();

    let alpha: Vec<f64> = (0..n)
        .map(|i| {
            let (lo, hi) = match i {
                0 => (0, 1),
                i if i == n - 1 => (n - 2, n - 1),
                i => (i - 1, i + 1),
            };
            (tau[hi] - tau[lo]) / (q[hi] - q[lo])
        })
        .collect();

    let f_alpha = q
        .iter()
        .zip(&alpha)
        .zip(&tau)
        .map(|((q, a), t)| q * a - t)
        .collect();

    Ok(MultifractalSpectrum {
        method: SpectrumMethod::Legendre,
        q,
        alpha,
        f_alpha,
    })
}

/// Default polynomial fit range: from the first q ≥ 1 to the end of the grid.
///
/// Small-q rows are dominated by estimation noise and left out.
pub fn default_fit_range(curve: &ScalingCurve) -> (usize, usize) {
    let start = curve
        .points()
        .iter()
        .position(|p| p.q >= 1.0 || same_moment(p.q, 1.0))
        .unwrap_or(0);
    (start, curve.len())
}

/// Quadratic fit over the half-open index range `range` and its closed-form spectrum.
pub fn polynomial_spectrum(
    curve: &ScalingCurve,
    range: (usize, usize),
) -> MmarResult<PolynomialSpectrum> {
    let (start, end) = range;
    if start >= end || end > curve.len() || end - start < 3 {
        return Err(MmarError::InvalidParameter {
            parameter: "polynomial_fit_range".to_string(),
            value: (end.saturating_sub(start)) as f64,
            constraint: format!(
                "a range of at least 3 moment orders within 0..{}, got {}..{}",
                curve.len(),
                start,
                end
            ),
        });
    }

    let points = curve.require_range(start, end)?;
    let q: Vec<f64> = points.iter().map(|p| p.0).collect();
    let tau: Vec<f64> = points.iter().map(|p| p.1).collect();

    let (a, b, c) = fit_quadratic(&q, &tau)?;
    let fit = QuadraticFit { a, b, c, range };

    let alpha = q.iter().map(|&qi| fit.alpha(qi)).collect();
    let f_alpha = q.iter().map(|&qi| fit.f_of_q(qi)).collect();

    Ok(PolynomialSpectrum {
        spectrum: MultifractalSpectrum {
            method: SpectrumMethod::Polynomial,
            q,
            alpha,
            f_alpha,
        },
        fit,
        implied_normal: fit.implied_normal(),
    })
}
