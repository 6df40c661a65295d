//! Lognormal binary multiplicative cascade.
//!
//! Parameters come in closed form from H and the spectrum peak α₀:
//! `λ = α₀ / H`, `σ² = 2(λ − 1) / ln 2`. The generator splits a unit mass
//! `K` times; every split draws two independent multipliers from the same law
//! and no renormalization is applied, so total mass drifts.
//!
//! Generation is iterative: a flat array of `2^K` slots is filled level by
//! level, the node at position `p` of a level with stride `s` spawning its
//! children at `p` and `p + s/2`. The final array reads left to right exactly
//! as a depth-first recursion would emit its leaves.

use crate::errors::{validate_allocation_size, MmarError, MmarResult};
use crate::rng::SeededRng;
use rand::distributions::Distribution;
use rand_distr::{LogNormal, Normal};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Branching factor of the cascade.
pub const CASCADE_BASE: usize = 2;

/// Deepest cascade accepted; 2^20 slots is about 8 MB of masses.
pub const MAX_CASCADE_LEVELS: usize = 20;

/// `(λ, σ²)` of the multiplier distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CascadeParameters {
    /// Location λ
    pub lambda: f64,
    /// Variance σ²; negative when α₀ < H, which no lognormal law can realize
    pub sigma_squared: f64,
}

impl CascadeParameters {
    /// Closed-form estimate from the Hurst exponent and the spectrum peak.
    ///
    /// ```rust
    /// use fractal_mmar::cascade::CascadeParameters;
    ///
    /// let params = CascadeParameters::estimate(0.5, 0.55).unwrap();
    /// assert!((params.lambda - 1.1).abs() < 1e-12);
    /// assert!(params.sigma_squared > 0.0);
    /// ```
    pub fn estimate(hurst: f64, alpha0: f64) -> MmarResult<Self> {
        if !(hurst.is_finite() && hurst > 0.0) {
            return Err(MmarError::DegenerateHurst { hurst });
        }
        if !alpha0.is_finite() {
            return Err(MmarError::InvalidParameter {
                parameter: "alpha0".to_string(),
                value: alpha0,
                constraint: "a finite spectrum peak".to_string(),
            });
        }

        let lambda = alpha0 / hurst;
        let sigma_squared = 2.0 * (lambda - 1.0) / (CASCADE_BASE as f64).ln();
        if sigma_squared < 0.0 {
            log::warn!(
                "Spectrum peak α₀ = {:.4} lies below H = {:.4}: σ² = {:.4} is negative",
                alpha0,
                hurst,
                sigma_squared
            );
        }
        Ok(Self {
            lambda,
            sigma_squared,
        })
    }

    /// Nearest parameters a multiplier law can realize.
    ///
    /// A negative σ² (α₀ just below H, typical of near-monofractal data) is
    /// clamped to 0, the deterministic monofractal limit. λ is kept as is.
    pub fn realizable(&self) -> Self {
        if self.sigma_squared >= 0.0 {
            return *self;
        }
        log::warn!(
            "Clamping σ² = {:.4} to 0: cascade multipliers become deterministic",
            self.sigma_squared
        );
        Self {
            lambda: self.lambda,
            sigma_squared: 0.0,
        }
    }

    /// Standard deviation σ; fails when σ² is negative or either value is non-finite.
    pub fn sigma(&self) -> MmarResult<f64> {
        if !self.lambda.is_finite() {
            return Err(MmarError::InvalidParameter {
                parameter: "lambda".to_string(),
                value: self.lambda,
                constraint: "finite".to_string(),
            });
        }
        if !(self.sigma_squared.is_finite() && self.sigma_squared >= 0.0) {
            return Err(MmarError::InvalidParameter {
                parameter: "sigma_squared".to_string(),
                value: self.sigma_squared,
                constraint: "finite and >= 0".to_string(),
            });
        }
        Ok(self.sigma_squared.sqrt())
    }
}

/// Law the split multipliers are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MultiplierLaw {
    /// `M = exp(V)`, `V ~ N(λ, σ²)`. Mass grows without bound with depth.
    #[default]
    LogNormal,
    /// `M = 2^(−V)`, `V ~ N(λ, σ²)`. With σ² = 2(λ − 1)/ln 2 this gives
    /// `E[M₀ + M₁] = 1`: mass is conserved in expectation, not pathwise.
    Dyadic,
}

enum Multiplier {
    LogNormal(LogNormal<f64>),
    Dyadic(Normal<f64>),
}

impl Multiplier {
    fn new(law: MultiplierLaw, params: &CascadeParameters) -> MmarResult<Self> {
        let sigma = params.sigma()?;
        let invalid = |e: rand_distr::NormalError| MmarError::InvalidParameter {
            parameter: "sigma".to_string(),
            value: sigma,
            constraint: format!("valid normal scale ({})", e),
        };
        Ok(match law {
            MultiplierLaw::LogNormal => {
                Multiplier::LogNormal(LogNormal::new(params.lambda, sigma).map_err(invalid)?)
            }
            MultiplierLaw::Dyadic => {
                Multiplier::Dyadic(Normal::new(params.lambda, sigma).map_err(invalid)?)
            }
        })
    }

    #[inline]
    fn sample(&self, rng: &mut SeededRng) -> f64 {
        match self {
            Multiplier::LogNormal(d) => d.sample(rng),
            Multiplier::Dyadic(d) => (CASCADE_BASE as f64).powf(-d.sample(rng)),
        }
    }
}

/// Leaf masses of a cascade of depth `K`, `2^K` non-negative values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassCascade {
    depth: usize,
    masses: Vec<f64>,
}

impl MassCascade {
    /// Wrap precomputed masses; the length must be a power of two.
    pub fn from_masses(masses: Vec<f64>) -> MmarResult<Self> {
        if masses.is_empty() || !masses.len().is_power_of_two() {
            return Err(MmarError::InvalidParameter {
                parameter: "cascade_length".to_string(),
                value: masses.len() as f64,
                constraint: "a power of two".to_string(),
            });
        }
        if let Some(m) = masses.iter().find(|m| !(m.is_finite() && **m >= 0.0)) {
            return Err(MmarError::InvalidParameter {
                parameter: "mass".to_string(),
                value: *m,
                constraint: "finite and >= 0".to_string(),
            });
        }
        let depth = masses.len().trailing_zeros() as usize;
        Ok(Self { depth, masses })
    }

    /// Number of levels K.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Leaf masses in time order.
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Sum of all leaf masses.
    pub fn total(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Number of leaves, `2^K`.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Never true for a generated cascade.
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }
}

/// Builds [`MassCascade`]s of a fixed depth and parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeGenerator {
    depth: usize,
    params: CascadeParameters,
    law: MultiplierLaw,
}

impl CascadeGenerator {
    /// Generator for `depth` levels with the default lognormal law.
    pub fn new(depth: usize, params: CascadeParameters) -> Self {
        Self {
            depth,
            params,
            law: MultiplierLaw::default(),
        }
    }

    /// Use a different multiplier law.
    pub fn with_law(mut self, law: MultiplierLaw) -> Self {
        self.law = law;
        self
    }

    /// Depth K.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Multiplier parameters.
    pub fn params(&self) -> &CascadeParameters {
        &self.params
    }

    /// Draw one cascade. Depth 0 returns `[1.0]` without touching `rng`;
    /// depth K consumes exactly `2^(K+1) − 2` multipliers.
    pub fn generate(&self, rng: &mut SeededRng) -> MmarResult<MassCascade> {
        if self.depth > MAX_CASCADE_LEVELS {
            return Err(MmarError::InvalidParameter {
                parameter: "cascade_depth".to_string(),
                value: self.depth as f64,
                constraint: format!("Must be ≤ {} to prevent memory overflow", MAX_CASCADE_LEVELS),
            });
        }
        let multiplier = Multiplier::new(self.law, &self.params)?;

        let len = 1usize << self.depth;
        validate_allocation_size(len * std::mem::size_of::<f64>(), "mass cascade")?;

        let mut masses = vec![0.0; len];
        masses[0] = 1.0;

        for level in 1..=self.depth {
            let stride = len >> (level - 1);
            let half = stride / 2;
            for p in (0..len).step_by(stride) {
                let v = masses[p];
                let m0 = multiplier.sample(rng);
                let m1 = multiplier.sample(rng);
                masses[p] = v * m0;
                masses[p + half] = v * m1;
            }
        }

        log::debug!(
            "Generated cascade: K = {}, λ = {:.4}, σ² = {:.4}, total mass {:.4e}",
            self.depth,
            self.params.lambda,
            self.params.sigma_squared,
            masses.iter().sum::<f64>()
        );

        Ok(MassCascade {
            depth: self.depth,
            masses,
        })
    }
}
