//! Synthetic price paths: fractional Brownian motion run on trading time.
//!
//! The path is `P(t) = P₀ + B_H(θ(t))` where `θ` is the trading-time clock and
//! `B_H` a fractional Brownian motion with `Var B_H(1) = m` (the magnitude).
//! For H = 1/2 the increments are drawn exactly as `√(m·Δθ)·Z`; otherwise
//! `B_H` is sampled on the integer grid `0..=⌈θ_max⌉` by circulant embedding
//! and read off at the clock ticks by linear interpolation.

use crate::errors::{validate_allocation_size, MmarError, MmarResult};
use crate::rng::SeededRng;
use crate::trading_time::TradingTimeClock;
use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::{num_complex::Complex, FftPlanner};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FFT sizes beyond 2^26 points are refused.
const MAX_FFT_SIZE: usize = 1 << 26;

/// Hurst values this close to 1/2 take the independent-increment path.
const BROWNIAN_TOLERANCE: f64 = 1e-12;

/// Autocovariance of unit-variance fractional Gaussian noise at lag `k`.
#[inline]
fn fgn_autocovariance(k: usize, hurst: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let k = k as f64;
    let two_h = 2.0 * hurst;
    0.5 * ((k + 1.0).powf(two_h) + (k - 1.0).powf(two_h) - 2.0 * k.powf(two_h))
}

/// `n` samples of fractional Gaussian noise with the given per-step variance.
///
/// Davies–Harte circulant embedding: the Toeplitz autocovariance of the first
/// `n' = n.next_power_of_two()` lags is embedded in a circulant of size
/// `2n'`, whose eigenvalues come from one FFT. For fGn with 0 < H < 1 this
/// embedding is non-negative definite; tiny negative eigenvalues from
/// rounding are clamped to zero.
pub fn fractional_gaussian_noise(
    n: usize,
    hurst: f64,
    variance: f64,
    rng: &mut SeededRng,
) -> MmarResult<Vec<f64>> {
    validate_path_parameters(hurst, variance)?;
    if n == 0 {
        return Ok(Vec::new());
    }

    let half = n.next_power_of_two();
    let m = 2 * half;
    if m > MAX_FFT_SIZE {
        return Err(MmarError::InvalidParameter {
            parameter: "length".to_string(),
            value: n as f64,
            constraint: format!("Must be ≤ {} for circulant embedding", MAX_FFT_SIZE / 2),
        });
    }
    validate_allocation_size(
        m * std::mem::size_of::<Complex<f64>>(),
        "circulant embedding buffer",
    )?;

    // First row of the circulant: γ(0), …, γ(n'), γ(n'−1), …, γ(1).
    let mut buffer: Vec<Complex<f64>> = (0..m)
        .map(|k| {
            let lag = if k <= half { k } else { m - k };
            Complex::new(fgn_autocovariance(lag, hurst), 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(m);
    fft.process(&mut buffer);

    let max_eigenvalue = buffer.iter().map(|x| x.re.abs()).fold(0.0, f64::max);
    let tolerance = (1e-10 * max_eigenvalue).max(1e-15);
    let mut clamped = 0usize;
    let mut min_eigenvalue = f64::INFINITY;
    for lambda in buffer.iter_mut() {
        if lambda.re < 0.0 {
            clamped += 1;
            min_eigenvalue = min_eigenvalue.min(lambda.re);
            lambda.re = 0.0;
        }
    }
    if clamped > 0 {
        if min_eigenvalue < -tolerance {
            log::warn!(
                "{} negative circulant eigenvalues clamped for H={:.3} (min: {:.2e})",
                clamped,
                hurst,
                min_eigenvalue
            );
        } else {
            log::debug!("{} round-off eigenvalues clamped to 0", clamped);
        }
    }

    // Y = FFT(√(λ/m)·(Z₁ + iZ₂)); Re(Y) has the circulant covariance exactly.
    let scale = 1.0 / m as f64;
    for lambda in buffer.iter_mut() {
        let amplitude = (lambda.re * scale).sqrt();
        let z1: f64 = rng.sample(StandardNormal);
        let z2: f64 = rng.sample(StandardNormal);
        *lambda = Complex::new(amplitude * z1, amplitude * z2);
    }
    fft.process(&mut buffer);

    let sd = variance.sqrt();
    Ok(buffer.iter().take(n).map(|y| y.re * sd).collect())
}

fn validate_path_parameters(hurst: f64, magnitude: f64) -> MmarResult<()> {
    if !(hurst.is_finite() && hurst > 0.0) {
        return Err(MmarError::DegenerateHurst { hurst });
    }
    if hurst >= 1.0 {
        return Err(MmarError::InvalidParameter {
            parameter: "hurst".to_string(),
            value: hurst,
            constraint: "(0, 1)".to_string(),
        });
    }
    if !(magnitude.is_finite() && magnitude > 0.0) {
        return Err(MmarError::InvalidParameter {
            parameter: "magnitude".to_string(),
            value: magnitude,
            constraint: "finite and > 0".to_string(),
        });
    }
    Ok(())
}

/// Synthetic price levels anchored to a starting price.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulatedPath {
    prices: Vec<f64>,
}

impl SimulatedPath {
    /// Price levels; the first is the anchor.
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Anchor price P₀.
    pub fn anchor(&self) -> f64 {
        self.prices.first().copied().unwrap_or(f64::NAN)
    }

    /// One-step price changes `P[i] − P[i−1]`.
    pub fn increments(&self) -> Vec<f64> {
        self.prices.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Number of price levels.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// True for a path simulated on an empty clock.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Consume the path, returning the price levels.
    pub fn into_prices(self) -> Vec<f64> {
        self.prices
    }
}

/// Composes a trading-time clock with a magnitude-scaled fractional process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSimulator {
    magnitude: f64,
    hurst: f64,
}

impl PathSimulator {
    /// Simulator with per-unit-trading-time variance `magnitude` and Hurst `hurst`.
    pub fn new(magnitude: f64, hurst: f64) -> Self {
        Self { magnitude, hurst }
    }

    /// Magnitude m.
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Hurst exponent of the driving process.
    pub fn hurst(&self) -> f64 {
        self.hurst
    }

    /// One path with `clock.len()` levels: `P[0] = anchor`,
    /// `P[i] = P[i−1] + B_H(θ_i) − B_H(θ_{i−1})`.
    pub fn simulate(
        &self,
        clock: &TradingTimeClock,
        anchor: f64,
        rng: &mut SeededRng,
    ) -> MmarResult<SimulatedPath> {
        validate_path_parameters(self.hurst, self.magnitude)?;
        if !(anchor.is_finite() && anchor > 0.0) {
            return Err(MmarError::InvalidParameter {
                parameter: "anchor".to_string(),
                value: anchor,
                constraint: "a finite positive price".to_string(),
            });
        }

        let ticks = clock.ticks();
        if ticks.is_empty() {
            return Ok(SimulatedPath { prices: Vec::new() });
        }

        let increments = if (self.hurst - 0.5).abs() < BROWNIAN_TOLERANCE {
            self.brownian_increments(ticks, rng)
        } else {
            self.fractional_increments(ticks, rng)?
        };

        let mut prices = Vec::with_capacity(ticks.len());
        let mut level = anchor;
        prices.push(level);
        for dx in increments {
            level += dx;
            prices.push(level);
        }

        log::debug!(
            "Simulated {} levels on trading time θ ∈ [0, {:.1}] with H = {:.4}, m = {:.4e}",
            prices.len(),
            clock.horizon(),
            self.hurst,
            self.magnitude
        );
        Ok(SimulatedPath { prices })
    }

    fn brownian_increments(&self, ticks: &[f64], rng: &mut SeededRng) -> Vec<f64> {
        ticks
            .windows(2)
            .map(|w| {
                let z: f64 = rng.sample(StandardNormal);
                (self.magnitude * (w[1] - w[0])).sqrt() * z
            })
            .collect()
    }

    fn fractional_increments(&self, ticks: &[f64], rng: &mut SeededRng) -> MmarResult<Vec<f64>> {
        let horizon = ticks.iter().copied().fold(0.0, f64::max);
        let steps = horizon.ceil().max(1.0) as usize;

        let noise = fractional_gaussian_noise(steps, self.hurst, self.magnitude, rng)?;
        let mut fbm = Vec::with_capacity(steps + 1);
        let mut running = 0.0;
        fbm.push(running);
        for x in noise {
            running += x;
            fbm.push(running);
        }

        let at = |theta: f64| -> f64 {
            let theta = theta.clamp(0.0, steps as f64);
            let lower = (theta.floor() as usize).min(steps - 1);
            let frac = theta - lower as f64;
            fbm[lower] + frac * (fbm[lower + 1] - fbm[lower])
        };

        Ok(ticks.windows(2).map(|w| at(w[1]) - at(w[0])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{CascadeGenerator, CascadeParameters, MassCascade};
    use crate::math_utils::{population_variance, sample_variance};
    use assert_approx_eq::assert_approx_eq;

    fn calendar_clock(n: usize) -> TradingTimeClock {
        TradingTimeClock::from_cascade(&MassCascade::from_masses(vec![1.0; n]).unwrap()).unwrap()
    }

    #[test]
    fn test_fgn_variance_and_reproducibility() {
        for &h in &[0.3, 0.5, 0.7] {
            let a = fractional_gaussian_noise(4096, h, 2.0, &mut SeededRng::with_seed(5)).unwrap();
            let b = fractional_gaussian_noise(4096, h, 2.0, &mut SeededRng::with_seed(5)).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.len(), 4096);
            let var = sample_variance(&a).unwrap();
            assert!((var - 2.0).abs() < 0.4, "H={} variance {}", h, var);
        }
    }

    #[test]
    fn test_fgn_lag_one_correlation_sign() {
        let lag1 = |xs: &[f64]| -> f64 {
            let m = xs.iter().sum::<f64>() / xs.len() as f64;
            let num: f64 = xs.windows(2).map(|w| (w[0] - m) * (w[1] - m)).sum();
            let den: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
            num / den
        };
        let persistent =
            fractional_gaussian_noise(8192, 0.8, 1.0, &mut SeededRng::with_seed(11)).unwrap();
        let rough = fractional_gaussian_noise(8192, 0.2, 1.0, &mut SeededRng::with_seed(11)).unwrap();
        // ρ(1) = 2^(2H−1) − 1: about 0.52 for H = 0.8, −0.34 for H = 0.2.
        assert!(lag1(&persistent) > 0.3);
        assert!(lag1(&rough) < -0.2);
    }

    #[test]
    fn test_path_is_anchored_and_matches_clock_length() {
        let params = CascadeParameters::estimate(0.5, 0.57).unwrap();
        let cascade = CascadeGenerator::new(9, params)
            .generate(&mut SeededRng::with_seed(1))
            .unwrap();
        let clock = TradingTimeClock::from_cascade(&cascade).unwrap();

        for &h in &[0.5, 0.6] {
            let path = PathSimulator::new(1e-4, h)
                .simulate(&clock, 8.25, &mut SeededRng::with_seed(2))
                .unwrap();
            assert_eq!(path.len(), clock.len());
            assert_eq!(path.anchor(), 8.25);
            assert!(path.prices().iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn test_brownian_increments_have_magnitude_variance_on_calendar_time() {
        let clock = calendar_clock(1 << 14);
        let path = PathSimulator::new(0.25, 0.5)
            .simulate(&clock, 100.0, &mut SeededRng::with_seed(77))
            .unwrap();
        let var = population_variance(&path.increments()).unwrap();
        assert_approx_eq!(var, 0.25, 0.02);
    }

    #[test]
    fn test_frozen_clock_freezes_price() {
        let cascade = MassCascade::from_masses(vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let clock = TradingTimeClock::from_cascade(&cascade).unwrap();
        for &h in &[0.5, 0.7] {
            let path = PathSimulator::new(1.0, h)
                .simulate(&clock, 10.0, &mut SeededRng::with_seed(4))
                .unwrap();
            let p = path.prices();
            assert_eq!(p[1], p[0]);
            assert_eq!(p[2], p[1]);
            assert_eq!(p[3], p[2]);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let clock = calendar_clock(8);
        let mut rng = SeededRng::with_seed(0);
        assert!(matches!(
            PathSimulator::new(1.0, 0.0).simulate(&clock, 1.0, &mut rng),
            Err(MmarError::DegenerateHurst { .. })
        ));
        assert!(matches!(
            PathSimulator::new(1.0, 1.0).simulate(&clock, 1.0, &mut rng),
            Err(MmarError::InvalidParameter { .. })
        ));
        assert!(matches!(
            PathSimulator::new(0.0, 0.5).simulate(&clock, 1.0, &mut rng),
            Err(MmarError::InvalidParameter { .. })
        ));
        assert!(matches!(
            PathSimulator::new(1.0, 0.5).simulate(&clock, -1.0, &mut rng),
            Err(MmarError::InvalidParameter { .. })
        ));
    }
}
