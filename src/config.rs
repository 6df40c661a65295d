//! # Pipeline Configuration
//!
//! Grids, cascade depth, simulation parameters and the random seed for one
//! analysis run. Presets mirror typical uses: a fast coarse run and the dense
//! grid of the reference USD/NOK study.

use crate::cascade::{CascadeParameters, MultiplierLaw, MAX_CASCADE_LEVELS};
use crate::errors::{validate_parameter, MmarError, MmarResult};
use crate::grids::{IncrementGrid, MomentGrid};
use crate::spectrum::SpectrumMethod;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the increment grid is obtained for a series.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IncrementRule {
    /// Use exactly these block sizes
    Explicit(Vec<usize>),
    /// All divisors of T − 1 that leave at least `min_blocks` blocks
    Divisors {
        /// Minimum number of non-overlapping blocks per increment
        min_blocks: usize,
    },
}

impl Default for IncrementRule {
    fn default() -> Self {
        IncrementRule::Divisors { min_blocks: 1 }
    }
}

/// Configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MmarConfig {
    /// Rule producing the Δt grid
    pub increments: IncrementRule,
    /// Moment orders q (positive, must contain 1)
    pub moments: Vec<f64>,
    /// Spectrum whose peak feeds the cascade parameters
    pub spectrum_method: SpectrumMethod,
    /// Half-open index range of the quadratic fit; `None` starts at the first q ≥ 1
    pub polynomial_fit_range: Option<(usize, usize)>,
    /// Cascade depth K
    pub cascade_depth: usize,
    /// Multiplier law of the cascade
    pub multiplier_law: MultiplierLaw,
    /// Per-unit-trading-time variance; `None` uses the variance of one-step price changes
    pub magnitude: Option<f64>,
    /// Hurst exponent of the simulated process; `None` uses the estimate
    pub path_hurst: Option<f64>,
    /// Seed for every random stage; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Cascade parameters to use instead of the estimated ones
    pub cascade_override: Option<CascadeParameters>,
    /// Compute normality diagnostics of the log-returns
    pub run_diagnostics: bool,
}

impl Default for MmarConfig {
    fn default() -> Self {
        Self {
            increments: IncrementRule::default(),
            moments: MomentGrid::reference().values().to_vec(),
            spectrum_method: SpectrumMethod::default(),
            polynomial_fit_range: None,
            cascade_depth: 10,
            multiplier_law: MultiplierLaw::default(),
            magnitude: None,
            path_hurst: None,
            seed: None,
            cascade_override: None,
            run_diagnostics: true,
        }
    }
}

impl MmarConfig {
    /// Coarse grids for fast runs and tests: six moment orders around q = 2,
    /// increments leaving at least 16 blocks, K = 8.
    pub fn quick() -> Self {
        Self {
            increments: IncrementRule::Divisors { min_blocks: 16 },
            moments: vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0],
            cascade_depth: 8,
            ..Self::default()
        }
    }

    /// The USD/NOK study: every divisor of T − 1, the dense 121-point q grid,
    /// and a cascade deep enough to cover 7561 observations.
    pub fn reference() -> Self {
        Self {
            increments: IncrementRule::Divisors { min_blocks: 1 },
            moments: MomentGrid::reference().values().to_vec(),
            cascade_depth: 13,
            ..Self::default()
        }
    }

    /// Same configuration with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Same configuration with cascade depth `depth`.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.cascade_depth = depth;
        self
    }

    /// Validated moment grid.
    pub fn moment_grid(&self) -> MmarResult<MomentGrid> {
        MomentGrid::new(self.moments.clone())
    }

    /// Increment grid for a series of `series_len` prices.
    pub fn increment_grid(&self, series_len: usize) -> MmarResult<IncrementGrid> {
        let grid = match &self.increments {
            IncrementRule::Explicit(values) => IncrementGrid::new(values.clone())?,
            IncrementRule::Divisors { min_blocks } => {
                IncrementGrid::for_series(series_len, *min_blocks)?
            }
        };
        grid.validate_for_length(series_len)?;
        Ok(grid)
    }

    /// Check everything that does not depend on the series.
    pub fn validate(&self) -> MmarResult<()> {
        let moments = self.moment_grid()?;

        if let IncrementRule::Explicit(values) = &self.increments {
            IncrementGrid::new(values.clone())?;
        }

        if self.cascade_depth > MAX_CASCADE_LEVELS {
            return Err(MmarError::InvalidParameter {
                parameter: "cascade_depth".to_string(),
                value: self.cascade_depth as f64,
                constraint: format!("Must be ≤ {}", MAX_CASCADE_LEVELS),
            });
        }

        if let Some((start, end)) = self.polynomial_fit_range {
            if start >= end || end > moments.len() || end - start < 3 {
                return Err(MmarError::InvalidParameter {
                    parameter: "polynomial_fit_range".to_string(),
                    value: end.saturating_sub(start) as f64,
                    constraint: format!(
                        "at least 3 moment orders within 0..{}, got {}..{}",
                        moments.len(),
                        start,
                        end
                    ),
                });
            }
        }

        if let Some(magnitude) = self.magnitude {
            if !(magnitude.is_finite() && magnitude > 0.0) {
                return Err(MmarError::InvalidParameter {
                    parameter: "magnitude".to_string(),
                    value: magnitude,
                    constraint: "finite and > 0".to_string(),
                });
            }
        }

        if let Some(hurst) = self.path_hurst {
            validate_parameter(hurst, f64::MIN_POSITIVE, 1.0 - f64::EPSILON, "path_hurst")?;
        }

        if let Some(params) = &self.cascade_override {
            params.sigma()?;
        }

        Ok(())
    }
}
