//! Trading-time clock θ(t) integrated from a mass cascade.

use crate::cascade::MassCascade;
use crate::errors::{MmarError, MmarResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Monotone non-decreasing clock, `θ[i] = 2^K · Σ_{j≤i} μ_j / Σ_j μ_j`.
///
/// The last tick always equals the number of cascade slots, so one unit of
/// trading time elapses per slot on average.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TradingTimeClock {
    ticks: Vec<f64>,
}

impl TradingTimeClock {
    /// Cumulative sum of the cascade, rescaled to end at `2^K`.
    pub fn from_cascade(cascade: &MassCascade) -> MmarResult<Self> {
        let total = cascade.total();
        if !(total.is_finite() && total > 0.0) {
            return Err(MmarError::ZeroMassCascade { total });
        }

        let horizon = cascade.len() as f64;
        let scale = horizon / total;
        let mut running = 0.0;
        let mut ticks: Vec<f64> = cascade
            .masses()
            .iter()
            .map(|m| {
                running += m;
                (running * scale).min(horizon)
            })
            .collect();

        // Pin the endpoint against accumulated rounding; the clamp above keeps
        // the ticks before it from overshooting.
        if let Some(last) = ticks.last_mut() {
            *last = horizon;
        }

        Ok(Self { ticks })
    }

    /// Clock values θ[0..2^K].
    pub fn ticks(&self) -> &[f64] {
        &self.ticks
    }

    /// Final clock value, `2^K`.
    pub fn horizon(&self) -> f64 {
        self.ticks.last().copied().unwrap_or(0.0)
    }

    /// Trading time elapsed in each slot, `θ[i] − θ[i−1]` with `θ[−1] = 0`.
    pub fn increments(&self) -> Vec<f64> {
        let mut previous = 0.0;
        self.ticks
            .iter()
            .map(|&t| {
                let dt = t - previous;
                previous = t;
                dt
            })
            .collect()
    }

    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Never true for a clock built from a cascade.
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
