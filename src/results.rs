//! # Pipeline Results
//!
//! Plain, owned, serializable artifacts of one run. Nothing here refers back
//! into the pipeline, so a reporting layer can consume each table on its own.

use crate::cascade::{CascadeParameters, MassCascade};
use crate::config::MmarConfig;
use crate::diagnostics::NormalityDiagnostics;
use crate::hurst::HurstEstimate;
use crate::partition::PartitionFunctionTable;
use crate::scaling::ScalingCurve;
use crate::simulation::SimulatedPath;
use crate::spectrum::{MultifractalSpectrum, PolynomialSpectrum, SpectrumMethod, SpectrumPeak};
use crate::trading_time::TradingTimeClock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything estimated from the observed series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalingAnalysis {
    /// Number of prices T
    pub series_length: usize,
    /// First observed price
    pub first_price: f64,
    /// Variance of one-step price changes, the default simulation magnitude
    pub price_change_variance: f64,
    /// Normality diagnostics of the log-returns, when requested
    pub diagnostics: Option<NormalityDiagnostics>,
    /// S[q][Δt]
    pub partition: PartitionFunctionTable,
    /// τ(q), with gaps where a row had too few usable cells
    pub scaling: ScalingCurve,
    /// H from the zero crossing of τ(q)
    pub hurst: HurstEstimate,
    /// Finite-difference spectrum; `None` when τ(q) has gaps
    pub legendre: Option<MultifractalSpectrum>,
    /// Quadratic-fit spectrum; `None` when the fit range has gaps or too few points
    pub polynomial: Option<PolynomialSpectrum>,
    /// Method whose peak was used
    pub spectrum_method: SpectrumMethod,
    /// Peak α₀ of the selected spectrum
    pub peak: SpectrumPeak,
    /// (λ, σ²) derived from H and α₀
    pub cascade_parameters: CascadeParameters,
}

impl ScalingAnalysis {
    /// Estimated Hurst exponent.
    pub fn hurst_exponent(&self) -> f64 {
        self.hurst.hurst
    }

    /// Spectrum chosen for α₀.
    pub fn selected_spectrum(&self) -> Option<&MultifractalSpectrum> {
        match self.spectrum_method {
            SpectrumMethod::Legendre => self.legendre.as_ref(),
            SpectrumMethod::Polynomial => self.polynomial.as_ref().map(|p| &p.spectrum),
        }
    }

    /// `ln(S[q][Δt] / S[q][1])`, the normalized partition function.
    pub fn normalized_partition(&self) -> Vec<Vec<Option<f64>>> {
        self.partition.log_normalized()
    }
}

/// One simulated realization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationOutput {
    /// Parameters the cascade was drawn with
    pub cascade_parameters: CascadeParameters,
    /// Leaf masses
    pub cascade: MassCascade,
    /// Integrated trading time
    pub clock: TradingTimeClock,
    /// Magnitude m used for the path
    pub magnitude: f64,
    /// Hurst exponent of the driving process
    pub hurst: f64,
    /// Seed of the run, if it was seeded
    pub seed: Option<u64>,
    /// Synthetic prices
    pub path: SimulatedPath,
}

/// Full run: analysis, simulation and the configuration that produced them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MmarReport {
    /// Configuration of the run
    pub config: MmarConfig,
    /// Estimation stages
    pub analysis: ScalingAnalysis,
    /// Generation stages
    pub simulation: SimulationOutput,
}
