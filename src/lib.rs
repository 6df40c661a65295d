//! # Multifractal Model of Asset Returns
//!
//! Scaling analysis of a price series and synthesis of price paths with the
//! same multifractal statistics.
//!
//! The estimation side computes the partition function `S_q(Δt)` of the
//! cumulative log-return, fits the scaling function τ(q), reads the Hurst
//! exponent off its zero crossing and derives the multifractal spectrum f(α)
//! by two independent routes. The generation side turns the spectrum peak and
//! H into a lognormal binary cascade, integrates it into a trading-time clock
//! and runs fractional Brownian motion on that clock.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fractal_mmar::{MmarAnalyzer, MmarConfig};
//! use rand::prelude::*;
//! use rand_distr::StandardNormal;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Geometric random walk, 4097 prices so that T - 1 = 2^12.
//!     let mut rng = StdRng::seed_from_u64(1);
//!     let mut log_price = 0.0f64;
//!     let prices: Vec<f64> = (0..4097)
//!         .map(|_| {
//!             let price = 100.0 * log_price.exp();
//!             log_price += 0.01 * rng.sample::<f64, _>(StandardNormal);
//!             price
//!         })
//!         .collect();
//!
//!     let analyzer = MmarAnalyzer::new(MmarConfig::quick().with_seed(42))?;
//!     let report = analyzer.run(&prices)?;
//!
//!     println!("H = {:.3}", report.analysis.hurst_exponent());
//!     for point in report.analysis.scaling.points() {
//!         println!("tau({}) = {:?}", point.q, point.tau);
//!     }
//!     println!("simulated {} prices", report.simulation.path.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Stages
//!
//! - [`returns`]: relative and adjacent log-returns
//! - [`partition`]: `S_q(Δt)` over non-overlapping blocks
//! - [`scaling`]: τ(q) by per-row log-log regression
//! - [`hurst`]: H = 1/q* from τ(q*) = 0
//! - [`spectrum`]: Legendre and quadratic-fit spectra
//! - [`cascade`]: (λ, σ²) and the multiplicative cascade
//! - [`trading_time`]: cascade mass → trading-time clock
//! - [`simulation`]: fractional Brownian motion on trading time
//!
//! [`MmarAnalyzer`] runs them in order.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod errors;
pub mod grids;
pub mod math_utils;
pub mod pipeline;
pub mod results;
pub mod rng;

// Pipeline stages
pub mod cascade;
pub mod hurst;
pub mod partition;
pub mod returns;
pub mod scaling;
pub mod simulation;
pub mod spectrum;
pub mod trading_time;

// Re-exports for convenience - main public API
pub use config::{IncrementRule, MmarConfig};
pub use data::{CsvFormat, PricePoint, PriceSeries};
pub use errors::{MmarError, MmarResult};
pub use pipeline::MmarAnalyzer;
pub use results::{MmarReport, ScalingAnalysis, SimulationOutput};
pub use rng::SeededRng;

// Stage exports
pub use cascade::{
    CascadeGenerator, CascadeParameters, MassCascade, MultiplierLaw, MAX_CASCADE_LEVELS,
};
pub use diagnostics::{diagnose_returns, normality_diagnostics, NormalityDiagnostics};
pub use grids::{IncrementGrid, MomentGrid};
pub use hurst::{estimate_hurst, HurstEstimate};
pub use partition::{estimate_partition_function, partition_function, PartitionFunctionTable};
pub use returns::ReturnSeries;
pub use scaling::{estimate_scaling_curve, ScalingCurve, ScalingPoint};
pub use simulation::{fractional_gaussian_noise, PathSimulator, SimulatedPath};
pub use spectrum::{
    default_fit_range, legendre_spectrum, polynomial_spectrum, ImpliedNormal,
    MultifractalSpectrum, PolynomialSpectrum, QuadraticFit, SpectrumMethod, SpectrumPeak,
};
pub use trading_time::TradingTimeClock;
