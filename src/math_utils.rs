// src/math_utils.rs
use statrs::function::erf;
use std::f64::consts::SQRT_2;

/// Inverse of the standard normal CDF, `p` in (0, 1)
pub fn normal_quantile(p: f64) -> f64 {
    SQRT_2 * erf::erf_inv(2.0 * p - 1.0)
}

pub struct Timer {
    start_time: std::time::Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_quantile() {
        assert_relative_eq!(normal_quantile(0.5), 0.0, epsilon = 1e-12);
        for p in [0.025, 0.3, 0.8] {
            assert_relative_eq!(normal_quantile(p), -normal_quantile(1.0 - p), epsilon = 1e-12);
        }
        assert_relative_eq!(normal_quantile(0.8413447460685429), 1.0, max_relative = 1e-8);
        assert_relative_eq!(normal_quantile(0.975), 1.959963984540054, max_relative = 1e-8);
    }
}
