//! Hurst exponent from the zero crossing of τ(q).
//!
//! For a process with `τ(q*) = 0` the Hurst exponent is `H = 1/q*`; Brownian
//! scaling (`τ(q) = q/2 - 1`) crosses at q = 2 and gives H = 0.5.

use crate::errors::{MmarError, MmarResult};
use crate::scaling::ScalingCurve;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hurst exponent with the τ(q) bracket it was interpolated from.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HurstEstimate {
    /// H = 1 / q*
    pub hurst: f64,
    /// Interpolated zero crossing of τ(q)
    pub zero_crossing: f64,
    /// Moment order left of the crossing
    pub q_left: f64,
    /// τ at `q_left`
    pub tau_left: f64,
    /// Moment order right of the crossing
    pub q_right: f64,
    /// τ at `q_right`
    pub tau_right: f64,
}

/// Scan τ(q) in increasing q for the first sign change and invert it.
///
/// Gaps in the curve are skipped: adjacency is taken over defined points.
/// Fails with [`MmarError::NoZeroCrossing`] when τ never changes sign,
/// including when no point is defined at all.
pub fn estimate_hurst(curve: &ScalingCurve) -> MmarResult<HurstEstimate> {
    let defined = curve.defined();
    let moments = curve.moments();
    let no_crossing = || MmarError::NoZeroCrossing {
        q_min: moments.first().copied().unwrap_or(f64::NAN),
        q_max: moments.last().copied().unwrap_or(f64::NAN),
    };

    let bracket = defined
        .windows(2)
        .find(|w| w[0].1 * w[1].1 <= 0.0)
        .ok_or_else(no_crossing)?;
    let (q_left, tau_left) = bracket[0];
    let (q_right, tau_right) = bracket[1];

    let zero_crossing = if tau_left == 0.0 {
        q_left
    } else if tau_right == 0.0 {
        q_right
    } else {
        q_left - tau_left * (q_right - q_left) / (tau_right - tau_left)
    };

    if !(zero_crossing.is_finite() && zero_crossing > 0.0) {
        return Err(MmarError::DegenerateHurst {
            hurst: 1.0 / zero_crossing,
        });
    }

    let estimate = HurstEstimate {
        hurst: 1.0 / zero_crossing,
        zero_crossing,
        q_left,
        tau_left,
        q_right,
        tau_right,
    };
    log::debug!(
        "τ(q) crosses zero at q* = {:.4} between q = {} and q = {}",
        zero_crossing,
        q_left,
        q_right
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn brownian_curve(moments: &[f64]) -> ScalingCurve {
        let values: Vec<(f64, Option<f64>)> =
            moments.iter().map(|&q| (q, Some(q / 2.0 - 1.0))).collect();
        ScalingCurve::from_values(&values)
    }

    #[test]
    fn test_brownian_scaling_gives_half() {
        let curve = brownian_curve(&[0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        let estimate = estimate_hurst(&curve).unwrap();
        assert_approx_eq!(estimate.hurst, 0.5, 1e-12);
        assert_eq!(estimate.q_right, 2.0);
    }

    #[test]
    fn test_interpolates_between_grid_points() {
        let curve = brownian_curve(&[0.5, 1.0, 1.7, 2.3, 3.0]);
        let estimate = estimate_hurst(&curve).unwrap();
        assert_eq!(estimate.q_left, 1.7);
        assert_eq!(estimate.q_right, 2.3);
        assert_approx_eq!(estimate.zero_crossing, 2.0, 1e-12);
        assert_approx_eq!(estimate.hurst, 0.5, 1e-12);
    }

    #[test]
    fn test_persistent_process() {
        // τ(q) = qH - 1 with H = 0.7
        let values: Vec<(f64, Option<f64>)> = [0.5, 1.0, 1.5, 2.0]
            .iter()
            .map(|&q| (q, Some(0.7 * q - 1.0)))
            .collect();
        let estimate = estimate_hurst(&ScalingCurve::from_values(&values)).unwrap();
        assert_approx_eq!(estimate.hurst, 0.7, 1e-12);
    }

    #[test]
    fn test_gaps_are_skipped() {
        let curve = ScalingCurve::from_values(&[
            (1.0, Some(-0.5)),
            (1.5, None),
            (3.0, Some(0.5)),
        ]);
        let estimate = estimate_hurst(&curve).unwrap();
        assert_approx_eq!(estimate.zero_crossing, 2.0, 1e-12);
    }

    #[test]
    fn test_no_sign_change() {
        let curve = brownian_curve(&[0.5, 1.0, 1.5]);
        match estimate_hurst(&curve) {
            Err(MmarError::NoZeroCrossing { q_min, q_max }) => {
                assert_eq!(q_min, 0.5);
                assert_eq!(q_max, 1.5);
            }
            other => panic!("Expected NoZeroCrossing, got {:?}", other),
        }

        let empty = ScalingCurve::from_values(&[(1.0, None), (2.0, None)]);
        assert!(matches!(
            estimate_hurst(&empty),
            Err(MmarError::NoZeroCrossing { .. })
        ));
    }
}
