//! Partition function S_q(Δt) of the cumulative log-return.
//!
//! For every block size Δt the series is cut into `floor(T/Δt)` adjacent,
//! non-overlapping pairs `(i·Δt, i·Δt + Δt)`; pairs whose right index falls
//! outside the series are dropped. `S[q][Δt]` is the sum of `|ΔX|^q` over the
//! surviving pairs.
//!
//! Zero increments contribute `0` for every q ≠ 0 and `1` for q = 0, so
//! `S[0][Δt]` is always the pair count and a flat stretch never produces NaN
//! for fractional q. An increment with no surviving pair yields an all-zero
//! column; the scaling regression drops such cells.

use crate::errors::{MmarError, MmarResult};
use crate::grids::{same_moment, IncrementGrid, MomentGrid};
use crate::returns::ReturnSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Matrix `S[q][Δt]`: one row per moment order, one column per increment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionFunctionTable {
    moments: Vec<f64>,
    increments: Vec<usize>,
    values: Vec<Vec<f64>>,
    pair_counts: Vec<usize>,
}

/// `|d|^q` with zero increments pinned to 0 (or 1 when q = 0).
#[inline]
fn abs_power(abs_diff: f64, q: f64) -> f64 {
    if abs_diff == 0.0 {
        if q == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        abs_diff.powf(q)
    }
}

/// Absolute increments over the non-overlapping pairs of one block size.
fn block_increments(relative: &[f64], dt: usize) -> Vec<f64> {
    let len = relative.len();
    if dt == 0 {
        return Vec::new();
    }
    (0..len / dt)
        .map(|i| i * dt)
        .filter(|left| left + dt < len)
        .map(|left| (relative[left + dt] - relative[left]).abs())
        .collect()
}

/// One column of the table: `S[q][dt]` for every q, plus the pair count.
fn column(relative: &[f64], dt: usize, moments: &[f64]) -> (Vec<f64>, usize) {
    let diffs = block_increments(relative, dt);
    let sums = moments
        .iter()
        .map(|&q| diffs.iter().map(|&d| abs_power(d, q)).sum())
        .collect();
    (sums, diffs.len())
}

/// Compute the partition function for every (q, Δt) cell.
///
/// Never fails and never exits early: increments at or beyond the series
/// length produce zero columns rather than errors.
pub fn partition_function(
    relative: &[f64],
    increments: &[usize],
    moments: &[f64],
) -> PartitionFunctionTable {
    #[cfg(feature = "parallel")]
    let columns: Vec<(Vec<f64>, usize)> = {
        use rayon::prelude::*;
        increments
            .par_iter()
            .map(|&dt| column(relative, dt, moments))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let columns: Vec<(Vec<f64>, usize)> = increments
        .iter()
        .map(|&dt| column(relative, dt, moments))
        .collect();

    let pair_counts = columns.iter().map(|(_, count)| *count).collect();
    let values = (0..moments.len())
        .map(|row| columns.iter().map(|(sums, _)| sums[row]).collect())
        .collect();

    log::debug!(
        "Partition function computed: {} moments x {} increments over {} points",
        moments.len(),
        increments.len(),
        relative.len()
    );

    PartitionFunctionTable {
        moments: moments.to_vec(),
        increments: increments.to_vec(),
        values,
        pair_counts,
    }
}

/// Validate the grids against the series, then compute the table.
pub fn estimate_partition_function(
    returns: &ReturnSeries,
    increments: &IncrementGrid,
    moments: &MomentGrid,
) -> MmarResult<PartitionFunctionTable> {
    increments.validate_for_length(returns.len())?;
    Ok(partition_function(
        returns.relative(),
        increments.values(),
        moments.values(),
    ))
}

impl PartitionFunctionTable {
    /// Assemble a table from precomputed values (`values[row][column]`).
    ///
    /// Pair counts are unknown for such a table and reported as zero.
    pub fn from_parts(
        moments: Vec<f64>,
        increments: Vec<usize>,
        values: Vec<Vec<f64>>,
    ) -> MmarResult<Self> {
        if values.len() != moments.len() || values.iter().any(|r| r.len() != increments.len()) {
            return Err(MmarError::InvalidGrid {
                reason: format!(
                    "table shape does not match {} moments x {} increments",
                    moments.len(),
                    increments.len()
                ),
            });
        }
        let pair_counts = vec![0; increments.len()];
        Ok(Self {
            moments,
            increments,
            values,
            pair_counts,
        })
    }

    /// Row labels.
    pub fn moments(&self) -> &[f64] {
        &self.moments
    }

    /// Column labels.
    pub fn increments(&self) -> &[usize] {
        &self.increments
    }

    /// All rows, `rows()[i][j] = S[moments[i]][increments[j]]`.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Number of pairs that contributed to each column.
    pub fn pair_counts(&self) -> &[usize] {
        &self.pair_counts
    }

    /// Cell lookup by label value rather than by position.
    pub fn value(&self, q: f64, dt: usize) -> Option<f64> {
        let row = self
            .moments
            .iter()
            .position(|&m| same_moment(m, q))?;
        let col = self.increments.iter().position(|&d| d == dt)?;
        Some(self.values[row][col])
    }

    /// Column used to normalize each row: Δt = 1, or the smallest increment
    /// present when 1 is missing.
    pub fn reference_column(&self) -> Option<usize> {
        if let Some(col) = self.increments.iter().position(|&d| d == 1) {
            return Some(col);
        }
        let fallback = self
            .increments
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| **d)
            .map(|(col, _)| col);
        if let Some(col) = fallback {
            log::warn!(
                "Increment 1 not in table; normalizing by smallest increment {}",
                self.increments[col]
            );
        }
        fallback
    }

    /// `ln(S[q][Δt] / S[q][Δt_ref])` per row.
    ///
    /// A cell is `None` when it or its row's reference value is zero or
    /// non-finite; no cell is coerced to a default.
    pub fn log_normalized(&self) -> Vec<Vec<Option<f64>>> {
        let Some(reference) = self.reference_column() else {
            return vec![Vec::new(); self.values.len()];
        };
        self.values
            .iter()
            .map(|row| {
                let denom = row[reference];
                row.iter()
                    .map(|&s| {
                        let ratio = s / denom;
                        (s > 0.0 && denom > 0.0 && ratio.is_finite()).then(|| ratio.ln())
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_pairs_are_non_overlapping_and_tail_is_dropped() {
        let relative = [0.0, 1.0, 3.0, 6.0, 10.0, 15.0, 21.0];
        assert_eq!(block_increments(&relative, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(block_increments(&relative, 2), vec![3.0, 7.0, 11.0]);
        // floor(7/3) = 2 pairs: (0,3) and (3,6); (6,9) would be out of range.
        assert_eq!(block_increments(&relative, 3), vec![6.0, 15.0]);
        assert!(block_increments(&relative, 7).is_empty());
        assert!(block_increments(&relative, 0).is_empty());
    }

    #[test]
    fn test_table_cells() {
        let relative = [0.0, 1.0, -1.0, 2.0, 2.0];
        let table = partition_function(&relative, &[1, 2], &[1.0, 2.0]);

        // dt = 1: |1|, |-2|, |3|, |0|
        assert_approx_eq!(table.value(1.0, 1).unwrap(), 6.0, 1e-12);
        assert_approx_eq!(table.value(2.0, 1).unwrap(), 14.0, 1e-12);
        // dt = 2: (0,2) -> 1, (2,4) -> 3
        assert_approx_eq!(table.value(1.0, 2).unwrap(), 4.0, 1e-12);
        assert_approx_eq!(table.value(2.0, 2).unwrap(), 10.0, 1e-12);
        assert_eq!(table.pair_counts(), &[4, 2]);
        assert!(table.value(3.0, 1).is_none());
    }

    #[test]
    fn test_zero_increment_with_fractional_q_is_zero_not_nan() {
        let table = partition_function(&[0.0, 0.0, 0.0], &[1], &[0.0, 0.3, 1.0]);
        assert_eq!(table.value(0.0, 1), Some(2.0));
        assert_eq!(table.value(0.3, 1), Some(0.0));
        assert_eq!(table.value(1.0, 1), Some(0.0));
    }

    #[test]
    fn test_increment_beyond_series_gives_zero_column() {
        let table = partition_function(&[0.0, 0.5, 0.2], &[1, 3, 5], &[1.0, 2.0]);
        assert_eq!(table.pair_counts(), &[2, 0, 0]);
        for row in table.rows() {
            assert_eq!(row[1], 0.0);
            assert_eq!(row[2], 0.0);
        }
    }

    #[test]
    fn test_log_normalized_uses_unit_increment() {
        let table = PartitionFunctionTable::from_parts(
            vec![1.0, 2.0],
            vec![1, 2, 4],
            vec![vec![2.0, 4.0, 0.0], vec![1.0, 1.0, 8.0]],
        )
        .unwrap();
        let norm = table.log_normalized();
        assert_eq!(norm[0][0], Some(0.0));
        assert_approx_eq!(norm[0][1].unwrap(), std::f64::consts::LN_2, 1e-12);
        assert_eq!(norm[0][2], None);
        assert_approx_eq!(norm[1][2].unwrap(), 8f64.ln(), 1e-12);
    }

    #[test]
    fn test_log_normalized_falls_back_to_smallest_increment() {
        let table = PartitionFunctionTable::from_parts(
            vec![1.0],
            vec![4, 2, 8],
            vec![vec![8.0, 2.0, 32.0]],
        )
        .unwrap();
        assert_eq!(table.reference_column(), Some(1));
        let norm = table.log_normalized();
        assert_approx_eq!(norm[0][0].unwrap(), 4f64.ln(), 1e-12);
        assert_approx_eq!(norm[0][1].unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_from_parts_checks_shape() {
        let result = PartitionFunctionTable::from_parts(vec![1.0], vec![1, 2], vec![vec![1.0]]);
        assert!(matches!(result, Err(MmarError::InvalidGrid { .. })));
    }

    #[test]
    fn test_estimate_rejects_increment_at_series_length() {
        let returns = ReturnSeries::from_prices(&[1.0, 1.1, 1.2, 1.3]).unwrap();
        let increments = IncrementGrid::new(vec![1, 4]).unwrap();
        let moments = MomentGrid::new(vec![1.0]).unwrap();
        assert!(matches!(
            estimate_partition_function(&returns, &increments, &moments),
            Err(MmarError::InvalidGrid { .. })
        ));
    }
}
