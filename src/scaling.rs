//! Scaling function τ(q) from the partition function.
//!
//! Each q-row is fitted independently: ordinary least squares of
//! `ln S[q][Δt]` on `ln Δt`, equal weights, slope kept, intercept discarded.
//! Cells that are zero, negative or non-finite cannot be logged and are left
//! out of that row's sample; a row with fewer than two usable cells is a gap.

use crate::errors::{MmarError, MmarResult};
use crate::grids::same_moment;
use crate::math_utils::ols_fit;
use crate::partition::PartitionFunctionTable;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// τ(q) at one moment order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalingPoint {
    /// Moment order
    pub q: f64,
    /// Log-log slope, `None` when fewer than two cells were usable
    pub tau: Option<f64>,
    /// Number of cells that entered the regression
    pub points_used: usize,
    /// Goodness of fit of the row regression
    pub r_squared: Option<f64>,
}

/// Mapping q → τ(q) over the moment grid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalingCurve {
    points: Vec<ScalingPoint>,
}

/// Fit τ(q) for every row of the table.
pub fn estimate_scaling_curve(table: &PartitionFunctionTable) -> ScalingCurve {
    let log_dt: Vec<f64> = table
        .increments()
        .iter()
        .map(|&dt| (dt as f64).ln())
        .collect();

    let points: Vec<ScalingPoint> = table
        .moments()
        .iter()
        .zip(table.rows())
        .map(|(&q, row)| fit_row(q, row, &log_dt))
        .collect();

    let gaps = points.iter().filter(|p| p.tau.is_none()).count();
    if gaps > 0 {
        log::warn!(
            "Scaling function undefined at {} of {} moment orders",
            gaps,
            points.len()
        );
    }

    ScalingCurve { points }
}

fn fit_row(q: f64, row: &[f64], log_dt: &[f64]) -> ScalingPoint {
    let (xs, ys): (Vec<f64>, Vec<f64>) = row
        .iter()
        .zip(log_dt)
        .filter(|(s, x)| **s > 0.0 && s.is_finite() && x.is_finite())
        .map(|(s, x)| (*x, s.ln()))
        .unzip();

    let points_used = xs.len();
    if points_used < 2 {
        return ScalingPoint {
            q,
            tau: None,
            points_used,
            r_squared: None,
        };
    }

    match ols_fit(&xs, &ys) {
        Ok(fit) => ScalingPoint {
            q,
            tau: Some(fit.slope),
            points_used,
            r_squared: Some(fit.r_squared),
        },
        Err(e) => {
            log::debug!("τ({}) regression failed: {}", q, e);
            ScalingPoint {
                q,
                tau: None,
                points_used,
                r_squared: None,
            }
        }
    }
}

impl ScalingCurve {
    /// Build a curve from `(q, τ)` pairs, e.g. a theoretical τ(q).
    pub fn from_values(values: &[(f64, Option<f64>)]) -> Self {
        Self {
            points: values
                .iter()
                .map(|&(q, tau)| ScalingPoint {
                    q,
                    tau,
                    points_used: 0,
                    r_squared: None,
                })
                .collect(),
        }
    }

    /// Every moment order, including gaps.
    pub fn points(&self) -> &[ScalingPoint] {
        &self.points
    }

    /// Moment orders.
    pub fn moments(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.q).collect()
    }

    /// `(q, τ)` for the defined points only, in grid order.
    pub fn defined(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.tau.map(|tau| (p.q, tau)))
            .collect()
    }

    /// τ at `q`, `None` for a gap or an order not on the grid.
    pub fn tau(&self, q: f64) -> Option<f64> {
        self.points
            .iter()
            .find(|p| same_moment(p.q, q))
            .and_then(|p| p.tau)
    }

    /// τ values for the index range, failing on the first gap.
    ///
    /// Bounds past the end are clamped; a reversed range is rejected.
    pub fn require_range(&self, start: usize, end: usize) -> MmarResult<Vec<(f64, f64)>> {
        if start > end {
            return Err(MmarError::InvalidParameter {
                parameter: "start".to_string(),
                value: start as f64,
                constraint: format!("<= end ({})", end),
            });
        }
        let len = self.points.len();
        self.points[start.min(len)..end.min(len)]
            .iter()
            .map(|p| {
                p.tau.map(|tau| (p.q, tau)).ok_or(MmarError::UndefinedScalingPoint {
                    q: p.q,
                    valid_points: p.points_used,
                })
            })
            .collect()
    }

    /// τ values for the whole grid, failing on the first gap.
    pub fn require_complete(&self) -> MmarResult<Vec<(f64, f64)>> {
        self.require_range(0, self.points.len())
    }

    /// True if every moment order has a τ value.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|p| p.tau.is_some())
    }

    /// Number of moment orders.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True for a curve over an empty grid.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_function;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_recovers_power_law_exponent() {
        let k = 0.37;
        let moments = vec![0.5, 1.0, 1.5, 2.0, 3.0];
        let increments = vec![1, 2, 3, 5, 8, 13, 21];
        let values = moments
            .iter()
            .map(|q| {
                increments
                    .iter()
                    .map(|&dt| (dt as f64).powf(k * q))
                    .collect()
            })
            .collect();
        let table =
            PartitionFunctionTable::from_parts(moments.clone(), increments, values).unwrap();

        let curve = estimate_scaling_curve(&table);
        for (q, tau) in curve.defined() {
            assert_approx_eq!(tau, k * q, 1e-10);
        }
        assert!(curve.is_complete());
    }

    #[test]
    fn test_zero_cells_are_dropped_from_row() {
        let table = PartitionFunctionTable::from_parts(
            vec![1.0],
            vec![1, 2, 4, 8],
            vec![vec![1.0, 2.0, 4.0, 0.0]],
        )
        .unwrap();
        let curve = estimate_scaling_curve(&table);
        let point = curve.points()[0];
        assert_eq!(point.points_used, 3);
        assert_approx_eq!(point.tau.unwrap(), 1.0, 1e-12);
    }

    #[test]
    fn test_row_with_one_valid_cell_is_a_gap() {
        let table = PartitionFunctionTable::from_parts(
            vec![1.0, 2.0],
            vec![1, 2, 4],
            vec![vec![3.0, 0.0, 0.0], vec![1.0, 4.0, 16.0]],
        )
        .unwrap();
        let curve = estimate_scaling_curve(&table);
        assert_eq!(curve.tau(1.0), None);
        assert_approx_eq!(curve.tau(2.0).unwrap(), 2.0, 1e-12);
        assert!(!curve.is_complete());
        assert_eq!(curve.defined().len(), 1);

        match curve.require_complete() {
            Err(MmarError::UndefinedScalingPoint { q, valid_points }) => {
                assert_eq!(q, 1.0);
                assert_eq!(valid_points, 1);
            }
            other => panic!("Expected UndefinedScalingPoint, got {:?}", other),
        }
        assert!(curve.require_range(1, 2).is_ok());
    }

    #[test]
    fn test_require_range_bounds() {
        let curve = ScalingCurve::from_values(&[(1.0, Some(-0.5)), (2.0, Some(0.0)), (3.0, Some(0.5))]);
        assert!(matches!(
            curve.require_range(2, 1),
            Err(MmarError::InvalidParameter { .. })
        ));
        assert_eq!(curve.require_range(1, 10).unwrap(), vec![(2.0, 0.0), (3.0, 0.5)]);
        assert!(curve.require_range(5, 9).unwrap().is_empty());
        assert!(curve.require_range(1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_constant_series_gives_all_gaps() {
        let relative = vec![0.0; 64];
        let table = partition_function(&relative, &[1, 3, 7, 9], &[0.5, 1.0, 2.0]);
        let curve = estimate_scaling_curve(&table);
        assert!(curve.points().iter().all(|p| p.tau.is_none()));
        assert!(curve.points().iter().all(|p| p.points_used == 0));
    }
}
