//! Increment (Δt) and moment-order (q) grids.

use crate::errors::{MmarError, MmarResult};
use crate::math_utils::divisors;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used when looking up a moment order by value.
pub const Q_MATCH_EPSILON: f64 = 1e-9;

/// True when two moment orders label the same grid row.
#[inline]
pub fn same_moment(a: f64, b: f64) -> bool {
    (a - b).abs() < Q_MATCH_EPSILON
}

/// Dense moment grid of the original USD/NOK study: sparse at small q, very
/// dense around q = 2 where τ(q) crosses zero, sparse again up to q = 30.
const REFERENCE_MOMENTS: [f64; 121] = [
    0.01, 0.1, 0.2, 0.3, 0.4, 0.5, 0.55, 0.6, 0.65, 0.7, //
    0.75, 0.8, 0.85, 0.9, 0.95, 1.0, 1.05, 1.1, 1.15, 1.2, //
    1.25, 1.3, 1.35, 1.4, 1.45, 1.5, 1.55, 1.6, 1.65, 1.7, //
    1.75, 1.8, 1.81, 1.82, 1.83, 1.84, 1.85, 1.86, 1.87, 1.88, //
    1.89, 1.9, 1.91, 1.92, 1.93, 1.94, 1.95, 1.96, 1.97, 1.98, //
    1.985, 1.99, 1.991, 1.992, 1.993, 1.994, 1.995, 1.996, 1.997, 1.998, //
    1.999, 2.0, 2.001, 2.002, 2.003, 2.004, 2.005, 2.006, 2.007, 2.008, //
    2.009, 2.01, 2.015, 2.02, 2.025, 2.03, 2.04, 2.05, 2.06, 2.07, //
    2.08, 2.09, 2.1, 2.15, 2.2, 2.25, 2.3, 2.35, 2.4, 2.45, //
    2.5, 2.6, 2.7, 2.8, 2.9, 3.0, 3.1, 3.2, 3.3, 3.4, //
    3.5, 3.6, 3.7, 3.8, 3.9, 4.0, 4.5, 5.0, 6.0, 7.0, //
    8.0, 9.0, 10.0, 12.5, 15.0, 17.5, 20.0, 22.5, 25.0, 27.5, //
    30.0,
];

/// Ordered set of block sizes Δt, always containing 1.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IncrementGrid {
    values: Vec<usize>,
}

impl IncrementGrid {
    /// Sorts and deduplicates `values`; rejects an empty grid, a zero
    /// increment, or a grid without Δt = 1.
    pub fn new(mut values: Vec<usize>) -> MmarResult<Self> {
        values.sort_unstable();
        values.dedup();

        if values.is_empty() {
            return Err(MmarError::InvalidGrid {
                reason: "increment grid is empty".to_string(),
            });
        }
        if values[0] == 0 {
            return Err(MmarError::InvalidGrid {
                reason: "increments must be positive".to_string(),
            });
        }
        if values[0] != 1 {
            return Err(MmarError::InvalidGrid {
                reason: "increment grid must contain 1".to_string(),
            });
        }
        Ok(Self { values })
    }

    /// All divisors of `n`.
    pub fn divisors_of(n: usize) -> MmarResult<Self> {
        Self::new(divisors(n))
    }

    /// Divisors of `series_len - 1` that leave at least `min_blocks`
    /// non-overlapping blocks.
    pub fn for_series(series_len: usize, min_blocks: usize) -> MmarResult<Self> {
        let span = series_len.saturating_sub(1);
        let min_blocks = min_blocks.max(1);
        Self::new(
            divisors(span)
                .into_iter()
                .filter(|dt| span / dt >= min_blocks)
                .collect(),
        )
    }

    /// Reject increments that cannot form a single pair in a series of length `len`.
    pub fn validate_for_length(&self, len: usize) -> MmarResult<()> {
        if let Some(&dt) = self.values.iter().find(|&&dt| dt >= len) {
            return Err(MmarError::InvalidGrid {
                reason: format!("increment {} is not below the series length {}", dt, len),
            });
        }
        let span = len.saturating_sub(1);
        let untidy = self.values.iter().filter(|&&dt| span % dt != 0).count();
        if untidy > 0 {
            log::debug!(
                "{} increments do not divide T-1 = {}; their last partial block is dropped",
                untidy,
                span
            );
        }
        Ok(())
    }

    /// Increments in increasing order.
    pub fn values(&self) -> &[usize] {
        &self.values
    }

    /// Number of increments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for a constructed grid.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered set of positive moment orders q, always containing 1.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MomentGrid {
    values: Vec<f64>,
}

impl MomentGrid {
    /// Sorts `values`; rejects non-positive, non-finite or repeated orders and
    /// a grid without q = 1.
    pub fn new(mut values: Vec<f64>) -> MmarResult<Self> {
        if values.is_empty() {
            return Err(MmarError::InvalidGrid {
                reason: "moment grid is empty".to_string(),
            });
        }
        if let Some(q) = values.iter().find(|q| !(q.is_finite() && **q > 0.0)) {
            return Err(MmarError::InvalidGrid {
                reason: format!("moment orders must be positive and finite, got {}", q),
            });
        }
        values.sort_by(f64::total_cmp);
        if values.windows(2).any(|w| w[1] - w[0] < Q_MATCH_EPSILON) {
            return Err(MmarError::InvalidGrid {
                reason: "moment orders must be distinct".to_string(),
            });
        }
        if !values.iter().any(|&q| same_moment(q, 1.0)) {
            return Err(MmarError::InvalidGrid {
                reason: "moment grid must contain the reference order q = 1".to_string(),
            });
        }
        Ok(Self { values })
    }

    /// The dense 121-point grid (0.01 to 30) used for the USD/NOK study.
    pub fn reference() -> Self {
        Self {
            values: REFERENCE_MOMENTS.to_vec(),
        }
    }

    /// Moment orders in increasing order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of moment orders.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for a constructed grid.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
