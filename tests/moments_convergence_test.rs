// tests/moments_convergence_test.rs
use approx::assert_relative_eq;
use gbm_moments::analytics::gbm_analytic;
use gbm_moments::mc::mc_engine::{simulate, Averaging, Execution, Retain, SimConfig};
use gbm_moments::rng::{self, NormalSource};
use gbm_moments::stats::moments::{compute_moments, KurtosisConvention};
use gbm_moments::SdeError;

#[test]
fn test_moments_of_standard_normal_draws() {
    let mut source = rng::seed_rng_from_u64(17);
    let mut draws = vec![0.0; 200_000];
    source.fill_standard_normal(&mut draws);

    let m = compute_moments(&draws, KurtosisConvention::Fisher).unwrap();
    assert!(m.mean.abs() < 0.01, "mean {}", m.mean);
    assert!((m.variance - 1.0).abs() < 0.01, "variance {}", m.variance);
    assert!(m.skewness.abs() < 0.03, "skewness {}", m.skewness);
    assert!(m.kurtosis.abs() < 0.06, "excess kurtosis {}", m.kurtosis);

    let ci = m.mean_confidence_interval(0.999).unwrap();
    assert!(ci.contains(0.0));
}

#[test]
fn test_terminal_moments_match_log_normal() {
    let (s0, r, sigma, t) = (100.0, 0.03, 0.3, 1.0);
    let cfg = SimConfig {
        s0,
        r,
        sigma,
        t,
        steps: 4,
        paths: 400_000,
        seed: Some(31),
        retain: Retain::TERMINAL,
        execution: Execution::Parallel,
        ..Default::default()
    };
    let out = simulate(&cfg).unwrap();
    let sim = compute_moments(&out.terminal.unwrap(), KurtosisConvention::Fisher).unwrap();
    let exact = gbm_analytic::terminal_moments(s0, r, sigma, t, KurtosisConvention::Fisher);

    println!("simulated: {:?}", sim);
    println!("exact:     {:?}", exact);

    assert_relative_eq!(sim.mean, exact.mean, max_relative = 0.005);
    assert_relative_eq!(sim.variance, exact.variance, max_relative = 0.02);
    assert!(
        (sim.skewness - exact.skewness).abs() < 0.1,
        "skewness {} vs {}",
        sim.skewness,
        exact.skewness
    );
    assert!(
        (sim.kurtosis - exact.kurtosis).abs() < 0.5,
        "excess kurtosis {} vs {}",
        sim.kurtosis,
        exact.kurtosis
    );
}

#[test]
fn test_averaged_sample_statistics() {
    let cfg = SimConfig {
        steps: 52,
        paths: 50_000,
        seed: Some(404),
        ..Default::default()
    };
    let out = simulate(&cfg).unwrap();

    let averaged = compute_moments(&out.averaged, KurtosisConvention::Pearson).unwrap();
    let expected = gbm_analytic::expected_average_price(
        cfg.s0,
        cfg.r,
        cfg.t,
        cfg.steps,
        Averaging::ExcludeInitial,
    );

    let ci = averaged.mean_confidence_interval(0.999).unwrap();
    assert!(
        ci.contains(expected),
        "E[S̄] = {} outside [{}, {}]",
        expected,
        ci.lower,
        ci.upper
    );

    // Averaging damps dispersion relative to the terminal price
    let terminal = gbm_analytic::terminal_moments(
        cfg.s0,
        cfg.r,
        cfg.sigma,
        cfg.t,
        KurtosisConvention::Pearson,
    );
    assert!(averaged.variance < terminal.variance);
    assert!(averaged.skewness > 0.0);
    assert!(averaged.kurtosis > 3.0);
}

#[test]
fn test_degenerate_sample_policy() {
    let cfg = SimConfig {
        sigma: 0.0,
        steps: 10,
        paths: 2,
        seed: Some(1),
        ..Default::default()
    };
    let out = simulate(&cfg).unwrap();
    let m = compute_moments(&out.averaged, KurtosisConvention::Fisher).unwrap();

    assert_eq!(m.variance, 0.0);
    assert!(m.is_degenerate());
    assert!(m.skewness.is_nan() && m.kurtosis.is_nan());
    assert_eq!(m.std_dev(), 0.0);

    let single = simulate(&SimConfig { paths: 1, ..cfg }).unwrap();
    assert!(matches!(
        compute_moments(&single.averaged, KurtosisConvention::Fisher),
        Err(SdeError::InsufficientData {
            required: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_zero_volatility_with_inexact_price_is_degenerate() {
    // 0.1 has no exact binary form, so the averaged price picks up rounding
    let cfg = SimConfig {
        s0: 0.1,
        r: 0.0,
        sigma: 0.0,
        steps: 3,
        paths: 7,
        seed: Some(5),
        retain: Retain::TERMINAL,
        ..Default::default()
    };
    let out = simulate(&cfg).unwrap();
    let terminal = out.terminal.unwrap();
    for moments in [
        compute_moments(&out.averaged, KurtosisConvention::Pearson).unwrap(),
        compute_moments(&terminal, KurtosisConvention::Fisher).unwrap(),
    ] {
        assert_relative_eq!(moments.mean, 0.1, max_relative = 1e-15);
        assert_eq!(moments.variance, 0.0);
        assert!(moments.is_degenerate());
        assert!(moments.skewness.is_nan() && moments.kurtosis.is_nan());
    }
}

#[test]
fn test_symmetric_sample_has_zero_skew() {
    let m = compute_moments(&[-3.0, -1.0, 1.0, 3.0], false.into()).unwrap();
    assert_relative_eq!(m.skewness, 0.0, epsilon = 1e-15);
    assert_relative_eq!(m.kurtosis, 1.64, epsilon = 1e-12);
}
