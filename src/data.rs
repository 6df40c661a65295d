//! Price series input.
//!
//! A [`PriceSeries`] is the validated form of what the price-history store
//! hands to the pipeline: `(timestamp, price)` pairs, strictly increasing in
//! time, with positive prices and no required sampling frequency.

use crate::errors::{MmarError, MmarResult};
use chrono::{NaiveDate, NaiveDateTime};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One observation of the price series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PricePoint {
    /// Observation time
    pub timestamp: NaiveDateTime,
    /// Observed price, strictly positive
    pub price: f64,
}

/// Time-ordered price observations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

/// Layout of a delimited price file.
///
/// Defaults match the central-bank FX export (`;`-separated, `TIME_PERIOD`
/// and `OBS_VALUE` columns).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CsvFormat {
    /// Field delimiter
    pub delimiter: u8,
    /// Header of the timestamp column
    pub time_column: String,
    /// Header of the price column
    pub price_column: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b';',
            time_column: "TIME_PERIOD".to_string(),
            price_column: "OBS_VALUE".to_string(),
        }
    }
}

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d %H%M%S"];

/// Parse a timestamp in one of the accepted formats; bare dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl PriceSeries {
    /// Build a series, rejecting non-positive prices and non-increasing timestamps.
    pub fn new(points: Vec<PricePoint>) -> MmarResult<Self> {
        if let Some((i, p)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.price.is_finite() && p.price > 0.0))
        {
            return Err(MmarError::InvalidSeries {
                reason: format!("price at index {} is not strictly positive: {}", i, p.price),
            });
        }
        if let Some(i) = points
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(MmarError::InvalidSeries {
                reason: format!(
                    "timestamps must be strictly increasing: {} then {}",
                    points[i].timestamp,
                    points[i + 1].timestamp
                ),
            });
        }
        Ok(Self { points })
    }

    /// Read a delimited file.
    ///
    /// Rows whose price is missing, non-numeric or non-positive are dropped
    /// with a warning; rows are sorted by time and later duplicates of a
    /// timestamp are dropped. An unparsable timestamp is an error.
    pub fn from_csv_reader<R: Read>(reader: R, format: &CsvFormat) -> MmarResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| -> MmarResult<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| MmarError::ParseError {
                    line: 1,
                    reason: format!("missing column '{}'", name),
                })
        };
        let time_idx = column(&format.time_column)?;
        let price_idx = column(&format.price_column)?;

        let mut points = Vec::new();
        let mut dropped = 0usize;
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let line = row + 2;

            let raw_time = record.get(time_idx).unwrap_or_default();
            let timestamp = parse_timestamp(raw_time).ok_or_else(|| MmarError::ParseError {
                line,
                reason: format!("unrecognized timestamp '{}'", raw_time),
            })?;

            match record.get(price_idx).and_then(|p| p.parse::<f64>().ok()) {
                Some(price) if price.is_finite() && price > 0.0 => {
                    points.push(PricePoint { timestamp, price })
                }
                _ => dropped += 1,
            }
        }

        points.sort_by_key(|p| p.timestamp);
        let before = points.len();
        points.dedup_by_key(|p| p.timestamp);
        let duplicates = before - points.len();

        if dropped > 0 || duplicates > 0 {
            log::warn!(
                "Dropped {} rows with unusable prices and {} duplicate timestamps",
                dropped,
                duplicates
            );
        }
        log::debug!("Loaded {} price points", points.len());

        Self::new(points)
    }

    /// Read a delimited file from disk.
    pub fn from_csv_path<P: AsRef<Path>>(path: P, format: &CsvFormat) -> MmarResult<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| MmarError::IoError {
            operation: format!("open {}", path.as_ref().display()),
            source: Some(std::sync::Arc::new(e)),
        })?;
        Self::from_csv_reader(file, format)
    }

    /// Observations on calendar days `start..=end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let points = self
            .points
            .iter()
            .filter(|p| {
                let day = p.timestamp.date();
                day >= start && day <= end
            })
            .copied()
            .collect();
        Self { points }
    }

    /// The first `n` observations.
    pub fn take_first(&self, n: usize) -> Self {
        Self {
            points: self.points.iter().take(n).copied().collect(),
        }
    }

    /// All observations.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Price column.
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// First observation.
    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there are no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
