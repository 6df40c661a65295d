//! # MMAR Pipeline
//!
//! [`MmarAnalyzer`] chains the stages leaf-first. Each stage fully
//! materializes its output before the next one reads it, and any error ends
//! the run:
//!
//! 1. prices → [`ReturnSeries`]
//! 2. returns, grids → [`PartitionFunctionTable`](crate::partition::PartitionFunctionTable)
//! 3. table → τ(q) ([`ScalingCurve`](crate::scaling::ScalingCurve))
//! 4. τ(q) → H
//! 5. τ(q) → Legendre and polynomial spectra, peak α₀
//! 6. (H, α₀) → cascade parameters (λ, σ²)
//! 7. cascade → trading time → simulated path
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use fractal_mmar::{MmarAnalyzer, MmarConfig, PriceSeries, CsvFormat};
//!
//! # fn main() -> Result<(), fractal_mmar::MmarError> {
//! let series = PriceSeries::from_csv_path("USD_NOK.csv", &CsvFormat::default())?
//!     .take_first(7561);
//! let analyzer = MmarAnalyzer::new(MmarConfig::reference().with_seed(7))?;
//! let report = analyzer.run_series(&series)?;
//! println!("H = {:.4}", report.analysis.hurst_exponent());
//! # Ok(())
//! # }
//! ```

use crate::cascade::{CascadeGenerator, CascadeParameters};
use crate::config::MmarConfig;
use crate::data::PriceSeries;
use crate::diagnostics::diagnose_returns;
use crate::errors::{MmarError, MmarResult};
use crate::hurst::estimate_hurst;
use crate::math_utils::sample_variance;
use crate::partition::estimate_partition_function;
use crate::results::{MmarReport, ScalingAnalysis, SimulationOutput};
use crate::returns::ReturnSeries;
use crate::rng::SeededRng;
use crate::scaling::estimate_scaling_curve;
use crate::simulation::PathSimulator;
use crate::spectrum::{default_fit_range, legendre_spectrum, polynomial_spectrum, SpectrumMethod};
use crate::trading_time::TradingTimeClock;

/// Stream ids of the per-stage generators derived from the run seed.
const CASCADE_STREAM: u64 = 1;
const PATH_STREAM: u64 = 2;

/// Runs the scaling analysis and the cascade simulation for one configuration.
#[derive(Debug, Clone)]
pub struct MmarAnalyzer {
    config: MmarConfig,
}

impl Default for MmarAnalyzer {
    fn default() -> Self {
        Self {
            config: MmarConfig::default(),
        }
    }
}

impl MmarAnalyzer {
    /// Analyzer for a validated configuration.
    pub fn new(config: MmarConfig) -> MmarResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &MmarConfig {
        &self.config
    }

    /// Estimation stages 1–6 on a raw price series.
    pub fn analyze(&self, prices: &[f64]) -> MmarResult<ScalingAnalysis> {
        let returns = ReturnSeries::from_prices(prices)?;

        let diagnostics = if self.config.run_diagnostics {
            match diagnose_returns(&returns) {
                Ok(d) => Some(d),
                Err(e) => {
                    log::warn!("Normality diagnostics skipped: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let increments = self.config.increment_grid(returns.len())?;
        let moments = self.config.moment_grid()?;
        log::debug!(
            "Analyzing {} prices over {} increments and {} moment orders",
            returns.len(),
            increments.len(),
            moments.len()
        );

        let partition = estimate_partition_function(&returns, &increments, &moments)?;
        let scaling = estimate_scaling_curve(&partition);
        let hurst = estimate_hurst(&scaling)?;

        let legendre = legendre_spectrum(&scaling);
        let fit_range = self
            .config
            .polynomial_fit_range
            .unwrap_or_else(|| default_fit_range(&scaling));
        let polynomial = polynomial_spectrum(&scaling, fit_range);

        let selected = match self.config.spectrum_method {
            SpectrumMethod::Legendre => legendre.clone().map(|s| s.peak()),
            SpectrumMethod::Polynomial => polynomial.clone().map(|p| p.spectrum.peak()),
        }?;
        let peak = selected.ok_or_else(|| MmarError::NumericalError {
            reason: "selected spectrum has no finite f(α) value".to_string(),
        })?;

        let cascade_parameters = CascadeParameters::estimate(hurst.hurst, peak.alpha)?;

        let price_changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let price_change_variance = sample_variance(&price_changes).unwrap_or(0.0);

        log::info!(
            "Scaling analysis: H = {:.4} (q* = {:.4}), α₀ = {:.4}, λ = {:.4}, σ² = {:.4}",
            hurst.hurst,
            hurst.zero_crossing,
            peak.alpha,
            cascade_parameters.lambda,
            cascade_parameters.sigma_squared
        );

        Ok(ScalingAnalysis {
            series_length: returns.len(),
            first_price: returns.first_price(),
            price_change_variance,
            diagnostics,
            partition,
            scaling,
            hurst,
            legendre: log_spectrum_failure(legendre, "Legendre"),
            polynomial: log_spectrum_failure(polynomial, "polynomial"),
            spectrum_method: self.config.spectrum_method,
            peak,
            cascade_parameters,
        })
    }

    /// Generation stages 7–9 from a finished analysis.
    ///
    /// Uses `cascade_override` when configured, the estimated parameters
    /// otherwise, with a negative σ² clamped to 0. The cascade and the path
    /// draw from separate generators derived from the configured seed.
    pub fn simulate(
        &self,
        analysis: &ScalingAnalysis,
        anchor: f64,
        magnitude: f64,
    ) -> MmarResult<SimulationOutput> {
        let cascade_parameters = self
            .config
            .cascade_override
            .unwrap_or(analysis.cascade_parameters)
            .realizable();
        let hurst = self.config.path_hurst.unwrap_or(analysis.hurst.hurst);

        let root = SeededRng::from_optional_seed(self.config.seed);
        let mut cascade_rng = root.derive(CASCADE_STREAM);
        let mut path_rng = root.derive(PATH_STREAM);

        let cascade = CascadeGenerator::new(self.config.cascade_depth, cascade_parameters)
            .with_law(self.config.multiplier_law)
            .generate(&mut cascade_rng)?;
        let clock = TradingTimeClock::from_cascade(&cascade)?;
        let path = PathSimulator::new(magnitude, hurst).simulate(&clock, anchor, &mut path_rng)?;

        log::info!(
            "Simulated {} prices from P₀ = {} (K = {}, H = {:.4}, m = {:.4e})",
            path.len(),
            anchor,
            self.config.cascade_depth,
            hurst,
            magnitude
        );

        Ok(SimulationOutput {
            cascade_parameters,
            cascade,
            clock,
            magnitude,
            hurst,
            seed: root.seed(),
            path,
        })
    }

    /// Full pipeline on raw prices, anchored at the first price.
    pub fn run(&self, prices: &[f64]) -> MmarResult<MmarReport> {
        let analysis = self.analyze(prices)?;
        let magnitude = self
            .config
            .magnitude
            .unwrap_or(analysis.price_change_variance);
        let simulation = self.simulate(&analysis, analysis.first_price, magnitude)?;
        Ok(MmarReport {
            config: self.config.clone(),
            analysis,
            simulation,
        })
    }

    /// Full pipeline on a timestamped series.
    pub fn run_series(&self, series: &PriceSeries) -> MmarResult<MmarReport> {
        if let (Some(first), Some(last)) = (series.first(), series.points().last()) {
            log::info!(
                "Running MMAR pipeline on {} observations from {} to {}",
                series.len(),
                first.timestamp,
                last.timestamp
            );
        }
        self.run(&series.prices())
    }
}

fn log_spectrum_failure<T>(result: MmarResult<T>, method: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{} spectrum unavailable: {}", method, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeParameters;
    use crate::config::IncrementRule;
    use rand::Rng;
    use rand_distr::StandardNormal;

    fn random_walk_prices(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = SeededRng::with_seed(seed);
        let mut log_price = 0.0;
        (0..n)
            .map(|i| {
                if i > 0 {
                    log_price += 0.01 * rng.sample::<f64, _>(StandardNormal);
                }
                100.0 * f64::exp(log_price)
            })
            .collect()
    }

    fn quick_analyzer() -> MmarAnalyzer {
        MmarAnalyzer::new(MmarConfig {
            cascade_override: Some(CascadeParameters::estimate(0.5, 0.55).unwrap()),
            ..MmarConfig::quick().with_seed(17)
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = MmarConfig {
            moments: vec![2.0, 3.0],
            ..MmarConfig::quick()
        };
        assert!(matches!(
            MmarAnalyzer::new(config),
            Err(MmarError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn test_analysis_artifacts_are_consistent() {
        let prices = random_walk_prices(1025, 3);
        let analysis = quick_analyzer().analyze(&prices).unwrap();

        assert_eq!(analysis.series_length, 1025);
        assert_eq!(analysis.partition.moments().len(), 6);
        assert_eq!(analysis.scaling.len(), 6);
        assert!(analysis.legendre.is_some());
        assert!(analysis.polynomial.is_some());
        assert!(analysis.selected_spectrum().is_some());
        assert!(analysis.diagnostics.is_some());
        assert!(analysis.hurst_exponent() > 0.3 && analysis.hurst_exponent() < 0.7);
        assert!(analysis.price_change_variance > 0.0);
    }

    #[test]
    fn test_run_is_reproducible_with_seed() {
        let prices = random_walk_prices(1025, 8);
        let analyzer = quick_analyzer();
        let a = analyzer.run(&prices).unwrap();
        let b = analyzer.run(&prices).unwrap();
        assert_eq!(a.simulation.cascade, b.simulation.cascade);
        assert_eq!(a.simulation.path, b.simulation.path);
        assert_eq!(a.simulation.path.len(), 256);
        assert_eq!(a.simulation.path.anchor(), prices[0]);
        assert_eq!(a.simulation.seed, Some(17));
    }

    #[test]
    fn test_negative_estimated_variance_still_simulates() {
        let analyzer = MmarAnalyzer::new(MmarConfig::quick().with_seed(7)).unwrap();
        let mut analysis = analyzer.analyze(&random_walk_prices(1025, 9)).unwrap();
        analysis.cascade_parameters = CascadeParameters::estimate(0.520, 0.519).unwrap();

        let output = analyzer.simulate(&analysis, 100.0, 1e-4).unwrap();
        assert_eq!(output.cascade_parameters.sigma_squared, 0.0);
        // σ² = 0 splits every node identically, so trading time is uniform.
        let first = output.cascade.masses()[0];
        assert!(output.cascade.masses().iter().all(|&m| m == first));
        assert_eq!(output.path.len(), 256);
    }

    #[test]
    fn test_increment_at_series_length_fails() {
        let analyzer = MmarAnalyzer::new(MmarConfig {
            increments: IncrementRule::Explicit(vec![1, 2, 64]),
            ..MmarConfig::quick()
        })
        .unwrap();
        assert!(matches!(
            analyzer.analyze(&random_walk_prices(64, 1)),
            Err(MmarError::InvalidGrid { .. })
        ));
    }
}
