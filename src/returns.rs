//! Log-return series built from raw prices.

use crate::data::PriceSeries;
use crate::errors::{MmarError, MmarResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum number of prices for any scaling analysis (one increment of size 1 and 2).
pub const MIN_SERIES_LENGTH: usize = 3;

/// Log-returns of a price series.
///
/// `relative[i] = ln P[i] - ln P[0]` has the same length T as the prices;
/// `adjacent[i - 1] = ln P[i] - ln P[i - 1]` has length T - 1.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReturnSeries {
    relative: Vec<f64>,
    adjacent: Vec<f64>,
    first_price: f64,
}

impl ReturnSeries {
    /// Build both return series, rejecting short series and non-positive prices.
    pub fn from_prices(prices: &[f64]) -> MmarResult<Self> {
        if prices.len() < MIN_SERIES_LENGTH {
            return Err(MmarError::InvalidSeries {
                reason: format!(
                    "need at least {} prices, got {}",
                    MIN_SERIES_LENGTH,
                    prices.len()
                ),
            });
        }
        if let Some((i, p)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && **p > 0.0))
        {
            return Err(MmarError::InvalidSeries {
                reason: format!("price at index {} is not strictly positive: {}", i, p),
            });
        }

        let logs: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
        let origin = logs[0];
        let relative = logs.iter().map(|l| l - origin).collect();
        let adjacent = logs.windows(2).map(|w| w[1] - w[0]).collect();

        Ok(Self {
            relative,
            adjacent,
            first_price: prices[0],
        })
    }

    /// Build from a validated price series.
    pub fn from_series(series: &PriceSeries) -> MmarResult<Self> {
        Self::from_prices(&series.prices())
    }

    /// Cumulative log-return relative to the first price.
    pub fn relative(&self) -> &[f64] {
        &self.relative
    }

    /// One-step log-returns.
    pub fn adjacent(&self) -> &[f64] {
        &self.adjacent
    }

    /// One-step log-returns multiplied by `factor` (100 gives percent-like units).
    pub fn scaled_adjacent(&self, factor: f64) -> Vec<f64> {
        self.adjacent.iter().map(|r| r * factor).collect()
    }

    /// Series length T (number of prices).
    pub fn len(&self) -> usize {
        self.relative.len()
    }

    /// Always false for a constructed series; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.relative.is_empty()
    }

    /// Price the relative returns are measured from.
    pub fn first_price(&self) -> f64 {
        self.first_price
    }
}
