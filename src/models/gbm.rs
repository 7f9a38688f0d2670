// src/models/gbm.rs
//! Geometric Brownian motion under the risk-neutral measure
//!
//! ```text
//! dS_t = r S_t dt + σ S_t dW_t
//! S_{t+dt} = S_t * exp((r - σ²/2)dt + σ√dt * Z),  Z ~ N(0,1)
//! ```
//! The exponential update is the exact transition of the process, so the
//! only discretization error comes from sampling at the grid points.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gbm {
    pub s0: f64,
    pub r: f64,
    pub sigma: f64,
}

/// Per-step constants of the exact GBM transition for a fixed `dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbmStep {
    pub dt: f64,
    /// (r - σ²/2) dt
    pub drift: f64,
    /// σ √dt
    pub vol_step: f64,
}

impl Gbm {
    /// Parameters are taken as given; `SimConfig::validate` checks them
    /// before a simulation builds the model.
    pub fn new(s0: f64, r: f64, sigma: f64) -> Self {
        Gbm { s0, r, sigma }
    }

    /// Split horizon `t` into `steps` equal intervals.
    pub fn step_constants(&self, t: f64, steps: usize) -> GbmStep {
        let dt = t / steps as f64;
        GbmStep {
            dt,
            drift: (self.r - 0.5 * self.sigma * self.sigma) * dt,
            vol_step: self.sigma * dt.sqrt(),
        }
    }
}

impl GbmStep {
    #[inline]
    pub fn advance(&self, s_t: f64, normal_draw: f64) -> f64 {
        s_t * (self.drift + self.vol_step * normal_draw).exp()
    }

    /// Advance every price in place with the matching draw.
    pub fn advance_all(&self, prices: &mut [f64], draws: &[f64]) {
        debug_assert_eq!(prices.len(), draws.len());
        for (s, &z) in prices.iter_mut().zip(draws) {
            *s = self.advance(*s, z);
        }
    }
}
