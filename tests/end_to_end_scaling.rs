//! End-to-end scaling analysis on series with known scaling.
//!
//! Geometric Brownian motion has τ(q) = q/2 − 1 and H = 1/2; a constant series
//! has no signal at all and must fail rather than report a spurious H.

use assert_approx_eq::assert_approx_eq;
use fractal_mmar::*;
use rand::Rng;
use rand_distr::StandardNormal;

const BROWNIAN_MOMENTS: [f64; 6] = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0];

/// 4097 prices of a driftless geometric Brownian motion (T − 1 = 4096 steps).
fn geometric_brownian_motion(seed: u64, volatility: f64) -> Vec<f64> {
    let mut rng = SeededRng::with_seed(seed);
    let mut log_price = 0.0f64;
    let mut prices = Vec::with_capacity(4097);
    prices.push(50.0);
    for _ in 0..4096 {
        log_price += volatility * rng.sample::<f64, _>(StandardNormal);
        prices.push(50.0 * log_price.exp());
    }
    prices
}

// Full divisor grids include Δt with only a handful of blocks; their ln S is
// noisy enough that a single run's H lands anywhere in 0.36..0.56 (or has no
// zero crossing). Keeping at least 16 blocks per increment and averaging over
// seeds is what makes the ±0.05 check meaningful.
fn brownian_config() -> MmarConfig {
    MmarConfig {
        increments: IncrementRule::Divisors { min_blocks: 16 },
        moments: BROWNIAN_MOMENTS.to_vec(),
        ..MmarConfig::quick().with_seed(99)
    }
}

#[test]
fn test_gbm_scaling_function_and_hurst() {
    let analyzer = MmarAnalyzer::new(brownian_config()).unwrap();
    let seeds = [1u64, 2, 3];

    let mut hurst_sum = 0.0;
    for &seed in &seeds {
        let prices = geometric_brownian_motion(seed, 0.01);
        let analysis = analyzer.analyze(&prices).unwrap();

        // Divisors of 4096 leaving at least 16 blocks: 1, 2, 4, ..., 256.
        assert_eq!(analysis.partition.increments(), &[1, 2, 4, 8, 16, 32, 64, 128, 256]);
        assert!(analysis.scaling.is_complete());

        for point in analysis.scaling.points() {
            let tau = point.tau.unwrap();
            assert!(
                (tau - (point.q / 2.0 - 1.0)).abs() < 0.2,
                "seed {}: τ({}) = {:.4}",
                seed,
                point.q,
                tau
            );
        }
        hurst_sum += analysis.hurst_exponent();
    }

    let mean_hurst = hurst_sum / seeds.len() as f64;
    assert_approx_eq!(mean_hurst, 0.5, 0.05);
}

#[test]
fn test_gbm_full_run_without_override() {
    // Near-monofractal input puts α₀ on either side of H, so the estimated σ²
    // is sometimes slightly negative; the run must still produce a path.
    let analyzer = MmarAnalyzer::new(MmarConfig::quick().with_seed(7)).unwrap();
    for seed in 0..20u64 {
        let prices = geometric_brownian_motion(seed, 0.01);
        let report = analyzer
            .run(&prices)
            .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));

        let simulation = &report.simulation;
        assert!(simulation.cascade_parameters.sigma_squared >= 0.0);
        assert_eq!(
            simulation.cascade_parameters.lambda,
            report.analysis.cascade_parameters.lambda
        );
        assert_eq!(simulation.path.len(), 256);
        assert_eq!(simulation.path.anchor(), prices[0]);
        assert!(simulation.path.prices().iter().all(|p| p.is_finite()));
    }
}

#[test]
fn test_gbm_partition_entries_are_non_negative_and_q0_counts_pairs() {
    let prices = geometric_brownian_motion(11, 0.01);
    let returns = ReturnSeries::from_prices(&prices).unwrap();
    let increments = IncrementGrid::for_series(prices.len(), 1).unwrap();

    let mut moments = vec![0.0];
    moments.extend_from_slice(&BROWNIAN_MOMENTS);
    let table = partition_function(returns.relative(), increments.values(), &moments);

    assert!(table.rows().iter().flatten().all(|s| *s >= 0.0));
    for (col, &dt) in table.increments().iter().enumerate() {
        assert_eq!(table.rows()[0][col], table.pair_counts()[col] as f64);
        assert_eq!(table.pair_counts()[col], 4096 / dt);
    }
}

#[test]
fn test_gbm_spectra_agree_on_peak() {
    let analyzer = MmarAnalyzer::new(brownian_config()).unwrap();
    let analysis = analyzer.analyze(&geometric_brownian_motion(5, 0.01)).unwrap();

    let legendre = analysis.legendre.as_ref().unwrap();
    let polynomial = analysis.polynomial.as_ref().unwrap();
    assert_eq!(legendre.len(), BROWNIAN_MOMENTS.len());
    // Default fit range starts at q = 1.
    assert_eq!(polynomial.fit.range, (1, BROWNIAN_MOMENTS.len()));

    let a0_legendre = legendre.peak().unwrap().alpha;
    let a0_polynomial = polynomial.spectrum.peak().unwrap().alpha;
    assert!((a0_legendre - 0.5).abs() < 0.15, "Legendre α₀ = {}", a0_legendre);
    assert!((a0_polynomial - 0.5).abs() < 0.15, "polynomial α₀ = {}", a0_polynomial);
    assert_eq!(analysis.peak.alpha, a0_polynomial);
}

#[test]
fn test_volatility_does_not_change_scaling() {
    // Scaling prices' log-returns by a constant shifts ln S but not its slope.
    let analyzer = MmarAnalyzer::new(brownian_config()).unwrap();
    let calm = analyzer.analyze(&geometric_brownian_motion(21, 0.001)).unwrap();
    let wild = analyzer.analyze(&geometric_brownian_motion(21, 0.03)).unwrap();
    for (a, b) in calm.scaling.points().iter().zip(wild.scaling.points()) {
        assert_approx_eq!(a.tau.unwrap(), b.tau.unwrap(), 1e-9);
    }
}

#[test]
fn test_constant_series_has_no_signal() {
    let prices = vec![7.5; 4097];
    let returns = ReturnSeries::from_prices(&prices).unwrap();
    let increments = IncrementGrid::for_series(prices.len(), 1).unwrap();
    let table = partition_function(returns.relative(), increments.values(), &[0.0, 0.5, 1.0, 2.0]);

    for (col, count) in table.pair_counts().iter().enumerate() {
        assert_eq!(table.rows()[0][col], *count as f64);
    }
    for row in &table.rows()[1..] {
        assert!(row.iter().all(|s| *s == 0.0));
    }

    let curve = estimate_scaling_curve(&table);
    assert!(curve.points().iter().skip(1).all(|p| p.tau.is_none()));
    assert!(matches!(
        estimate_hurst(&curve),
        Err(MmarError::NoZeroCrossing { .. })
    ));

    let analyzer = MmarAnalyzer::new(MmarConfig::quick()).unwrap();
    assert!(matches!(
        analyzer.analyze(&prices),
        Err(MmarError::NoZeroCrossing { .. })
    ));
}
