//! Error types and validation functions for the scaling-analysis pipeline.
//!
//! Every stage of the pipeline returns [`MmarResult`]. All errors are terminal
//! for the run that produced them: nothing is retried automatically, and a
//! caller may re-run with adjusted grids or parameters.

use std::sync::Arc;
use thiserror::Error;

/// Error taxonomy for the multifractal pipeline.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum MmarError {
    /// The price series is empty, too short, or contains a non-positive or non-finite price.
    #[error("Invalid series: {reason}")]
    InvalidSeries {
        /// What is wrong with the series
        reason: String,
    },

    /// An increment or moment grid is unusable for the series at hand.
    #[error("Invalid grid: {reason}")]
    InvalidGrid {
        /// What is wrong with the grid
        reason: String,
    },

    /// A moment order has fewer than two valid log-log points, so τ(q) is undefined.
    #[error("Scaling exponent undefined at q = {q}: only {valid_points} valid log-log points")]
    UndefinedScalingPoint {
        /// Moment order of the undefined row
        q: f64,
        /// Number of usable (positive, finite) partition values in that row
        valid_points: usize,
    },

    /// τ(q) never changes sign over the moment grid.
    #[error("No zero crossing of the scaling function over q in [{q_min}, {q_max}]")]
    NoZeroCrossing {
        /// Smallest moment order scanned
        q_min: f64,
        /// Largest moment order scanned
        q_max: f64,
    },

    /// The Hurst exponent is not strictly positive.
    #[error("Degenerate Hurst exponent: H = {hurst}")]
    DegenerateHurst {
        /// Offending Hurst value
        hurst: f64,
    },

    /// The cascade carries no mass, so trading time cannot be normalized.
    #[error("Mass cascade has non-positive total mass: {total}")]
    ZeroMassCascade {
        /// Total mass of the cascade
        total: f64,
    },

    /// Invalid parameter value for a stage or configuration.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Numerical computation failed (singular system, overflow, non-finite result).
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
    },

    /// I/O operation error while loading a price series.
    #[error("I/O operation failed: {operation}")]
    IoError {
        /// I/O operation that failed
        operation: String,
        /// Underlying error if available
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// Malformed input record.
    #[error("Parse error at record {line}: {reason}")]
    ParseError {
        /// 1-based record number
        line: usize,
        /// What could not be parsed
        reason: String,
    },
}

impl From<std::io::Error> for MmarError {
    fn from(err: std::io::Error) -> Self {
        MmarError::IoError {
            operation: err.kind().to_string(),
            source: Some(Arc::new(err)),
        }
    }
}

impl From<csv::Error> for MmarError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.record() as usize + 1)
            .unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => MmarError::from(io),
            kind => MmarError::ParseError {
                line,
                reason: format!("{:?}", kind),
            },
        }
    }
}

/// Result type for pipeline operations.
pub type MmarResult<T> = Result<T, MmarError>;

/// Validates that a parameter is within expected bounds (inclusive).
///
/// # Example
/// ```rust
/// use fractal_mmar::errors::validate_parameter;
///
/// assert!(validate_parameter(0.5, 0.0, 1.0, "hurst").is_ok());
/// assert!(validate_parameter(1.5, 0.0, 1.0, "hurst").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> MmarResult<()> {
    if value.is_nan() {
        return Err(MmarError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(MmarError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
        });
    }

    if value < min || value > max {
        Err(MmarError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value, reporting its index.
pub fn validate_all_finite(data: &[f64], name: &str) -> MmarResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(MmarError::NumericalError {
            reason: format!("{} contains non-finite value at index {}: {}", name, i, value),
        });
    }
    Ok(())
}

/// Rejects allocations above 1 GiB.
///
/// Cascade depth and FFT sizes grow as powers of two, so a bad parameter turns
/// into an enormous allocation long before anything else notices.
///
/// ```rust
/// use fractal_mmar::errors::validate_allocation_size;
///
/// assert!(validate_allocation_size(1000, "test").is_ok());
/// assert!(validate_allocation_size(2_000_000_000, "test").is_err());
/// ```
pub fn validate_allocation_size(size: usize, operation: &str) -> MmarResult<()> {
    const MAX_SAFE_ALLOCATION: usize = 1 << 30;

    if size > MAX_SAFE_ALLOCATION {
        return Err(MmarError::NumericalError {
            reason: format!(
                "Allocation of {} bytes ({:.2} GB) in '{}' exceeds the limit of {} bytes",
                size,
                size as f64 / (1024.0 * 1024.0 * 1024.0),
                operation,
                MAX_SAFE_ALLOCATION
            ),
        });
    }

    Ok(())
}
