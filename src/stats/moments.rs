// src/stats/moments.rs
//! Sample moments of a Monte Carlo output
//!
//! # Definitions
//!
//! For a sample x_1..x_n with mean x̄ and centered values d_i = x_i - x̄:
//! ```text
//! m_k      = (1/n) Σ d_i^k          (population central moments)
//! variance = m_2
//! skewness = m_3 / m_2^1.5
//! kurtosis = m_4 / m_2²              (Pearson)
//!          = m_4 / m_2² - 3          (Fisher, excess)
//! ```
//!
//! # Reduction Order
//!
//! Plain left-to-right sums over the slice: one for the mean, one for the
//! largest deviation, and one accumulating d², d³ and d⁴ together. Centering
//! before raising to a power keeps the higher moments well conditioned for
//! samples with a large mean and a small spread (e.g. averaged prices).
//!
//! # Degenerate Samples
//!
//! When every value is identical, skewness and kurtosis are undefined. The
//! check is made on the values themselves, not on the computed variance,
//! which rounding can leave slightly above zero. Such samples report the
//! common value as mean, a variance of exactly zero, `NaN` skewness and
//! kurtosis, and [`MomentResult::is_degenerate`] returns true.
//!
//! # Range
//!
//! Any finite sample is accepted: the mean falls back to summing `x / n`
//! when the plain sum overflows, and centered values are rescaled before
//! being raised to powers. The variance alone can still overflow when the
//! spread itself exceeds `sqrt(f64::MAX)`, and a spread so small that the
//! variance underflows to zero is reported as degenerate.

use crate::error::{validation::validate_sample_len, SdeResult};
use crate::math_utils::normal_quantile;
use tracing::debug;

/// Minimum sample size accepted by [`compute_moments`]
pub const MIN_SAMPLE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KurtosisConvention {
    /// Raw fourth standardized moment; 3 for a normal distribution
    #[default]
    Pearson,
    /// Excess kurtosis; 0 for a normal distribution
    Fisher,
}

impl From<bool> for KurtosisConvention {
    /// `true` selects the Fisher (excess) convention
    fn from(use_fisher: bool) -> Self {
        if use_fisher {
            KurtosisConvention::Fisher
        } else {
            KurtosisConvention::Pearson
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentResult {
    pub mean: f64,
    /// Population variance (divisor n)
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub convention: KurtosisConvention,
    /// Number of observations
    pub n: usize,
}

/// Two-sided confidence interval for the sample mean
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl MomentResult {
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Standard error of the mean, sqrt(variance / n)
    pub fn standard_error(&self) -> f64 {
        (self.variance / self.n as f64).sqrt()
    }

    /// No spread in the sample (all observations identical); skewness and
    /// kurtosis are NaN
    pub fn is_degenerate(&self) -> bool {
        self.variance == 0.0
    }

    /// Normal-approximation interval `mean ± z · standard_error` at `level`
    /// (e.g. 0.95). Returns `None` unless `0 < level < 1`.
    pub fn mean_confidence_interval(&self, level: f64) -> Option<ConfidenceInterval> {
        if !(level > 0.0 && level < 1.0) {
            return None;
        }
        let z = normal_quantile(0.5 + 0.5 * level);
        let margin = z * self.standard_error();
        Some(ConfidenceInterval {
            lower: self.mean - margin,
            upper: self.mean + margin,
            level,
        })
    }
}

/// Largest power of two not above `x`; 1 for zero or subnormal `x`.
fn pow2_floor(x: f64) -> f64 {
    if x.is_normal() {
        f64::from_bits(x.to_bits() & 0x7ff0_0000_0000_0000)
    } else {
        1.0
    }
}

/// Mean, population variance, skewness and kurtosis of `sample`
///
/// # Errors
///
/// `SdeError::InsufficientData` when the sample has fewer than two values.
pub fn compute_moments(sample: &[f64], convention: KurtosisConvention) -> SdeResult<MomentResult> {
    validate_sample_len(sample.len(), MIN_SAMPLE_LEN)?;
    let n = sample.len() as f64;

    let first = sample[0];
    if sample.iter().all(|&x| x == first) {
        debug!(n = sample.len(), "identical values, skewness and kurtosis undefined");
        return Ok(MomentResult {
            mean: first,
            variance: 0.0,
            skewness: f64::NAN,
            kurtosis: f64::NAN,
            convention,
            n: sample.len(),
        });
    }

    let mut mean = sample.iter().sum::<f64>() / n;
    if !mean.is_finite() {
        // sum overflowed; values are finite, so scale before adding
        mean = sample.iter().map(|&x| x / n).sum::<f64>();
    }

    // Centered values are rescaled by a power of two so d⁴ neither
    // overflows nor underflows; the rescaling is exact.
    let max_dev = sample
        .iter()
        .map(|&x| (x - mean).abs())
        .fold(0.0, f64::max);
    let scale = pow2_floor(max_dev);

    let (mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0);
    for &x in sample {
        let d = (x - mean) / scale;
        let d2 = d * d;
        s2 += d2;
        s3 += d2 * d;
        s4 += d2 * d2;
    }
    let u2 = s2 / n;
    let variance = u2 * scale * scale;

    let (skewness, kurtosis) = if variance == 0.0 {
        debug!(n = sample.len(), "zero variance, skewness and kurtosis undefined");
        (f64::NAN, f64::NAN)
    } else {
        let raw = (s4 / n) / (u2 * u2);
        let kurtosis = match convention {
            KurtosisConvention::Pearson => raw,
            KurtosisConvention::Fisher => raw - 3.0,
        };
        ((s3 / n) / u2.powf(1.5), kurtosis)
    };

    Ok(MomentResult {
        mean,
        variance,
        skewness,
        kurtosis,
        convention,
        n: sample.len(),
    })
}
