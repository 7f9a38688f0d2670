// src/analytics/gbm_analytic.rs
//! Closed-form reference values for GBM simulation output
//!
//! # Mathematical Foundation
//!
//! Under the risk-neutral measure
//! ```text
//! S_t = S_0 * exp((r - σ²/2)t + σW_t),     E[S_t] = S_0 e^{rt}
//! ```
//! so S_T is log-normal with log-variance s² = σ²T. These values are the
//! targets a correct simulation converges to as the number of paths grows.

use crate::mc::mc_engine::Averaging;
use crate::stats::moments::KurtosisConvention;

/// Exact moments of a distribution (not estimated from a sample)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionMoments {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// Risk-neutral expectation of the terminal price
///
/// # Formula
/// ```text
/// E[S_T] = S_0 e^{rT}
/// ```
pub fn expected_terminal_price(s0: f64, r: f64, t: f64) -> f64 {
    s0 * (r * t).exp()
}

/// Expectation of the discrete time average produced by the simulator
///
/// # Formula
/// ```text
/// E[S̄] = (1/N) Σ_{k=1..N} S_0 e^{r k dt}          (ExcludeInitial)
/// E[S̄] = (1/(N+1)) Σ_{k=0..N} S_0 e^{r k dt}      (IncludeInitial)
/// ```
/// The expectation does not depend on σ.
pub fn expected_average_price(s0: f64, r: f64, t: f64, steps: usize, averaging: Averaging) -> f64 {
    let dt = t / steps as f64;
    let first = match averaging {
        Averaging::ExcludeInitial => 1,
        Averaging::IncludeInitial => 0,
    };
    let count = (steps + 1 - first) as f64;
    let sum: f64 = (first..=steps).map(|k| (r * k as f64 * dt).exp()).sum();
    s0 * sum / count
}

/// Exact moments of the log-normal terminal price S_T
///
/// # Formula
/// With w = e^{σ²T}:
/// ```text
/// mean            = S_0 e^{rT}
/// variance        = mean² (w - 1)
/// skewness        = (w + 2) √(w - 1)
/// excess kurtosis = w⁴ + 2w³ + 3w² - 6
/// ```
/// For σ = 0 the price is deterministic: variance is zero and skewness and
/// kurtosis are `NaN`, matching the sample estimator.
pub fn terminal_moments(
    s0: f64,
    r: f64,
    sigma: f64,
    t: f64,
    convention: KurtosisConvention,
) -> DistributionMoments {
    let mean = expected_terminal_price(s0, r, t);
    let s2 = sigma * sigma * t;
    let w_minus_1 = s2.exp_m1();

    if w_minus_1 == 0.0 {
        return DistributionMoments {
            mean,
            variance: 0.0,
            skewness: f64::NAN,
            kurtosis: f64::NAN,
        };
    }

    let w = w_minus_1 + 1.0;
    let excess = w.powi(4) + 2.0 * w.powi(3) + 3.0 * w * w - 6.0;
    DistributionMoments {
        mean,
        variance: mean * mean * w_minus_1,
        skewness: (w + 2.0) * w_minus_1.sqrt(),
        kurtosis: match convention {
            KurtosisConvention::Fisher => excess,
            KurtosisConvention::Pearson => excess + 3.0,
        },
    }
}
