// src/mc/mc_engine.rs
use crate::error::{validation::*, SdeError, SdeResult};
use crate::models::gbm::{Gbm, GbmStep};
use crate::rng::{self, NormalSource, RngFactory};
use bitflags::bitflags;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

bitflags! {
    /// Optional outputs kept alongside the averaged sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Retain: u32 {
        const NONE     = 0;
        const TERMINAL = 1 << 0;
        const PATHS    = 1 << 1;
    }
}

/// Which grid points enter a path's time average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Averaging {
    /// Mean of S_1..S_N (the initial price is not an observation)
    #[default]
    ExcludeInitial,
    /// Mean of S_0..S_N
    IncludeInitial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One generator, batches drawn back to back
    #[default]
    Sequential,
    /// Batches spread over the rayon pool, one substream per batch
    Parallel,
}

/// Default batch sizing: `min(paths, max(min_batch, cell_budget / steps))`.
///
/// `cell_budget` bounds the number of price cells (`batch × steps`) touched
/// by a single batch; long paths shrink the batch, short ones are floored at
/// `min_batch` to keep per-batch overhead low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub min_batch: usize,
    pub cell_budget: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            min_batch: 10_000,
            cell_budget: 1_000_000,
        }
    }
}

impl BatchPolicy {
    pub fn batch_size(&self, paths: usize, steps: usize) -> usize {
        paths.min(self.min_batch.max(self.cell_budget / steps.max(1)))
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub paths: usize,
    pub steps: usize,
    pub s0: f64,
    pub r: f64,
    pub sigma: f64,
    pub t: f64,
    pub seed: Option<u64>, // None: fresh entropy, reported back in the metadata
    pub batch_size: Option<usize>,
    pub batch_policy: BatchPolicy,
    pub retain: Retain,
    pub averaging: Averaging,
    pub execution: Execution,
}

impl SimConfig {
    /// Validate the simulation configuration
    pub fn validate(&self) -> SdeResult<()> {
        validate_count("steps", self.steps)?;
        validate_count("paths", self.paths)?;
        validate_finite("s0", self.s0)?;
        validate_positive("s0", self.s0)?;
        validate_finite("r", self.r)?;
        validate_finite("sigma", self.sigma)?;
        validate_non_negative("sigma", self.sigma)?;
        validate_finite("t", self.t)?;
        validate_positive("t", self.t)?;

        if let Some(batch) = self.batch_size {
            validate_count("batch_size", batch)?;
        }
        validate_count("batch_policy.min_batch", self.batch_policy.min_batch)?;
        validate_count("batch_policy.cell_budget", self.batch_policy.cell_budget)?;

        Ok(())
    }

    /// Batch size actually used, never larger than `paths`
    pub fn resolved_batch_size(&self) -> usize {
        match self.batch_size {
            Some(batch) => batch.min(self.paths),
            None => self.batch_policy.batch_size(self.paths, self.steps),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            paths: 100_000,
            steps: 252,
            s0: 100.0,
            r: 0.01,
            sigma: 0.2,
            t: 1.0,
            seed: None,
            batch_size: None,
            batch_policy: BatchPolicy::default(),
            retain: Retain::NONE,
            averaging: Averaging::ExcludeInitial,
            execution: Execution::Sequential,
        }
    }
}

/// Resolved inputs of a run, enough to replay or audit it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationMeta {
    pub s0: f64,
    pub r: f64,
    pub sigma: f64,
    pub t: f64,
    pub steps: usize,
    pub paths: usize,
    pub dt: f64,
    pub batch_size: usize,
    /// `None` when draws came from a caller-supplied source
    pub seed: Option<u64>,
    pub averaging: Averaging,
    pub execution: Execution,
}

#[derive(Debug, Clone)]
pub struct SampleOutputs {
    /// Time-averaged price of every path
    pub averaged: Vec<f64>,
    pub terminal: Option<Vec<f64>>,
    /// `paths × (steps + 1)`, row i is path i starting at S_0
    pub paths: Option<Array2<f64>>,
    pub meta: SimulationMeta,
}

/// Working state of one batch: current prices and running sums.
struct PathBatch {
    prices: Vec<f64>,
    sums: Vec<f64>,
    draws: Vec<f64>,
}

impl PathBatch {
    fn new(s0: f64, len: usize) -> Self {
        PathBatch {
            prices: vec![s0; len],
            sums: vec![0.0; len],
            draws: vec![0.0; len],
        }
    }
}

/// Disjoint output slices owned by one batch.
struct BatchSlot<'a> {
    index: usize,
    averaged: &'a mut [f64],
    terminal: Option<&'a mut [f64]>,
    paths: Option<&'a mut [f64]>,
}

/// Simulates `paths` GBM paths and returns their time averages
///
/// # Math Framework
///
/// Each path is advanced with the exact GBM transition
/// ```text
/// S_k = S_{k-1} * exp((r - σ²/2)dt + σ√dt * Z_k),   dt = T/N
/// ```
/// and reduced to
/// ```text
/// S̄ = (1/N) Σ_{k=1..N} S_k          (Averaging::ExcludeInitial)
/// S̄ = (1/(N+1)) Σ_{k=0..N} S_k      (Averaging::IncludeInitial)
/// ```
///
/// # Batching
///
/// Paths are processed `batch_size` at a time. Within a batch, all paths
/// take step k before any takes step k+1, so draws are consumed batch by
/// batch and step by step inside a batch. The sample therefore depends on
/// the seed, `paths`, `steps`, `batch_size` and the execution mode together;
/// changing any of them changes the realization.
///
/// # Zero Volatility
///
/// With `sigma = 0` and `r = 0` every step multiplies by `exp(0) = 1`, so
/// every path stays at exactly `S0`. The averages are `(N · S0) / N` summed
/// step by step, which reproduces `S0` bit for bit only when the partial sums
/// are representable (e.g. `S0 = 100`). For a value like `S0 = 0.1` the
/// averages may differ from `S0` by a few ulps, but all paths still agree
/// with each other, so `compute_moments` reports the sample as degenerate.
///
/// # Errors
///
/// Returns `SdeError` for:
/// - Invalid configuration parameters
/// - A path matrix too large to index or allocate
/// - Non-finite averages produced from finite inputs (overflow)
pub fn simulate(cfg: &SimConfig) -> SdeResult<SampleOutputs> {
    cfg.validate()?;
    let seed = cfg.seed.unwrap_or_else(rng::entropy_seed);

    match cfg.execution {
        Execution::Sequential => {
            let mut source = rng::seed_rng_from_u64(seed);
            run(cfg, Some(seed), |slots, ctx| {
                for slot in slots {
                    ctx.run_batch(slot, &mut source);
                }
            })
        }
        Execution::Parallel => {
            let factory = RngFactory::new(seed);
            run(cfg, Some(seed), |slots, ctx| {
                slots.into_par_iter().for_each(|slot| {
                    let mut source = factory.create_batch_rng(slot.index as u64);
                    ctx.run_batch(slot, &mut source);
                });
            })
        }
    }
}

/// Same as [`simulate`], drawing from a caller-owned source.
///
/// `cfg.seed` and `cfg.execution` are ignored: batches run sequentially on
/// `source`, and the source is left advanced so later calls continue the
/// same stream.
pub fn simulate_with_source<S: NormalSource + ?Sized>(
    cfg: &SimConfig,
    source: &mut S,
) -> SdeResult<SampleOutputs> {
    cfg.validate()?;
    let mut out = run(cfg, None, |slots, ctx| {
        for slot in slots {
            ctx.run_batch(slot, &mut *source);
        }
    })?;
    out.meta.execution = Execution::Sequential;
    Ok(out)
}

/// Constants shared read-only by every batch of one call.
struct BatchContext {
    s0: f64,
    steps: usize,
    step: GbmStep,
    averaging: Averaging,
}

impl BatchContext {
    fn run_batch<S: NormalSource + ?Sized>(&self, slot: BatchSlot<'_>, source: &mut S) {
        let b = slot.averaged.len();
        let width = self.steps + 1;
        let mut paths = slot.paths;
        let mut batch = PathBatch::new(self.s0, b);

        if let Some(rows) = paths.as_deref_mut() {
            for row in rows.chunks_exact_mut(width) {
                row[0] = self.s0;
            }
        }

        for k in 1..=self.steps {
            source.fill_standard_normal(&mut batch.draws);
            self.step.advance_all(&mut batch.prices, &batch.draws);
            for (sum, &s) in batch.sums.iter_mut().zip(&batch.prices) {
                *sum += s;
            }
            if let Some(rows) = paths.as_deref_mut() {
                for (row, &s) in rows.chunks_exact_mut(width).zip(&batch.prices) {
                    row[k] = s;
                }
            }
        }

        match self.averaging {
            Averaging::ExcludeInitial => {
                let n = self.steps as f64;
                for (avg, &sum) in slot.averaged.iter_mut().zip(&batch.sums) {
                    *avg = sum / n;
                }
            }
            Averaging::IncludeInitial => {
                let n = (self.steps + 1) as f64;
                for (avg, &sum) in slot.averaged.iter_mut().zip(&batch.sums) {
                    *avg = (self.s0 + sum) / n;
                }
            }
        }

        if let Some(terminal) = slot.terminal {
            terminal.copy_from_slice(&batch.prices);
        }

        debug!(batch = slot.index, paths = b, "batch complete");
    }
}

/// Allocate outputs, cut them into per-batch slots and hand the slots to
/// `drive`, which decides how batches are scheduled and where draws come
/// from.
fn run<F>(cfg: &SimConfig, seed: Option<u64>, drive: F) -> SdeResult<SampleOutputs>
where
    F: FnOnce(Vec<BatchSlot<'_>>, &BatchContext),
{
    let gbm = Gbm::new(cfg.s0, cfg.r, cfg.sigma);
    let step = gbm.step_constants(cfg.t, cfg.steps);
    let batch_size = cfg.resolved_batch_size();
    let width = cfg.steps + 1;

    info!(
        s0 = cfg.s0,
        r = cfg.r,
        sigma = cfg.sigma,
        t = cfg.t,
        steps = cfg.steps,
        paths = cfg.paths,
        batch_size,
        seed,
        execution = ?cfg.execution,
        "starting GBM simulation"
    );

    let mut averaged = vec![0.0; cfg.paths];
    let mut terminal = cfg
        .retain
        .contains(Retain::TERMINAL)
        .then(|| vec![0.0; cfg.paths]);
    let mut path_buf = if cfg.retain.contains(Retain::PATHS) {
        Some(allocate_path_buffer(cfg.paths, width)?)
    } else {
        None
    };

    let ctx = BatchContext {
        s0: gbm.s0,
        steps: cfg.steps,
        step,
        averaging: cfg.averaging,
    };

    {
        let mut terminal_chunks = terminal.as_deref_mut().map(|t| t.chunks_mut(batch_size));
        let mut path_chunks = path_buf
            .as_deref_mut()
            .map(|p| p.chunks_mut(batch_size * width));

        let slots: Vec<BatchSlot<'_>> = averaged
            .chunks_mut(batch_size)
            .enumerate()
            .map(|(index, averaged)| BatchSlot {
                index,
                averaged,
                terminal: terminal_chunks.as_mut().and_then(Iterator::next),
                paths: path_chunks.as_mut().and_then(Iterator::next),
            })
            .collect();

        drive(slots, &ctx);
    }

    if let Some(bad) = averaged.iter().position(|v| !v.is_finite()) {
        return Err(SdeError::NumericalInstability {
            method: "GBM path simulation".to_string(),
            reason: format!("path {} produced a non-finite average {}", bad, averaged[bad]),
        });
    }

    let paths = match path_buf {
        Some(buf) => Some(Array2::from_shape_vec((cfg.paths, width), buf).map_err(|e| {
            SdeError::ResourceExhausted {
                resource: "path matrix".to_string(),
                requested: format!("{} x {}", cfg.paths, width),
                reason: e.to_string(),
            }
        })?),
        None => None,
    };

    info!(
        paths = cfg.paths,
        batches = (cfg.paths + batch_size - 1) / batch_size,
        "GBM simulation complete"
    );

    Ok(SampleOutputs {
        averaged,
        terminal,
        paths,
        meta: SimulationMeta {
            s0: cfg.s0,
            r: cfg.r,
            sigma: cfg.sigma,
            t: cfg.t,
            steps: cfg.steps,
            paths: cfg.paths,
            dt: step.dt,
            batch_size,
            seed,
            averaging: cfg.averaging,
            execution: cfg.execution,
        },
    })
}

/// Row-major `rows × width` buffer; refuses instead of aborting when the
/// request cannot be satisfied.
fn allocate_path_buffer(rows: usize, width: usize) -> SdeResult<Vec<f64>> {
    let requested = format!("{} x {} f64", rows, width);
    let cells = rows
        .checked_mul(width)
        .filter(|cells| cells.checked_mul(std::mem::size_of::<f64>()).is_some())
        .ok_or_else(|| SdeError::ResourceExhausted {
            resource: "path matrix".to_string(),
            requested: requested.clone(),
            reason: "size overflows the address space".to_string(),
        })?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(cells)
        .map_err(|e| SdeError::ResourceExhausted {
            resource: "path matrix".to_string(),
            requested,
            reason: e.to_string(),
        })?;
    buf.resize(cells, 0.0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        SimConfig {
            paths: 25,
            steps: 8,
            seed: Some(9),
            batch_size: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_batch_policy() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.batch_size(20_000, 252), 10_000);
        assert_eq!(policy.batch_size(1_000_000, 10), 100_000);
        assert_eq!(policy.batch_size(500, 252), 500);
        assert_eq!(policy.batch_size(2_000_000, 1), 1_000_000);

        let tight = BatchPolicy {
            min_batch: 100,
            cell_budget: 10_000,
        };
        assert_eq!(tight.batch_size(1_000_000, 50), 200);
        assert_eq!(tight.batch_size(1_000_000, 500), 100);
    }

    #[test]
    fn test_explicit_batch_is_clamped_to_paths() {
        let cfg = SimConfig {
            paths: 5,
            batch_size: Some(64),
            ..small_config()
        };
        assert_eq!(cfg.resolved_batch_size(), 5);
        let out = simulate(&cfg).unwrap();
        assert_eq!(out.meta.batch_size, 5);
    }

    #[test]
    fn test_validation_rejects_bad_inputs() {
        let bad = [
            SimConfig { steps: 0, ..small_config() },
            SimConfig { paths: 0, ..small_config() },
            SimConfig { sigma: -0.01, ..small_config() },
            SimConfig { t: 0.0, ..small_config() },
            SimConfig { t: -1.0, ..small_config() },
            SimConfig { s0: 0.0, ..small_config() },
            SimConfig { r: f64::NAN, ..small_config() },
            SimConfig { batch_size: Some(0), ..small_config() },
        ];
        for cfg in &bad {
            assert!(simulate(cfg).is_err(), "accepted {:?}", cfg);
        }

        assert!(matches!(
            simulate(&SimConfig { sigma: -0.01, ..small_config() }),
            Err(SdeError::InvalidParameters { ref parameter, .. }) if parameter == "sigma"
        ));
        assert!(matches!(
            simulate(&SimConfig { steps: 0, ..small_config() }),
            Err(SdeError::InvalidConfiguration { ref field, .. }) if field == "steps"
        ));
    }

    #[test]
    fn test_short_last_batch_is_filled() {
        let cfg = SimConfig {
            retain: Retain::TERMINAL,
            ..small_config()
        };
        let out = simulate(&cfg).unwrap();
        assert_eq!(out.averaged.len(), 25);
        assert!(out.averaged.iter().all(|v| v.is_finite() && *v > 0.0));
        assert!(out.terminal.unwrap().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_retained_paths_record_every_step() {
        let cfg = SimConfig {
            retain: Retain::TERMINAL | Retain::PATHS,
            ..small_config()
        };
        let out = simulate(&cfg).unwrap();
        let paths = out.paths.unwrap();
        let terminal = out.terminal.unwrap();

        assert_eq!(paths.dim(), (25, 9));
        for (i, row) in paths.outer_iter().enumerate() {
            assert_eq!(row[0], cfg.s0);
            assert_eq!(row[8], terminal[i]);
            let avg = row.iter().skip(1).sum::<f64>() / 8.0;
            assert!((avg - out.averaged[i]).abs() <= 1e-12 * avg);
            // prices actually move
            assert!(row.iter().skip(1).any(|&s| s != cfg.s0));
        }
    }

    #[test]
    fn test_sequential_matches_borrowed_source() {
        let cfg = small_config();
        let owned = simulate(&cfg).unwrap();

        let mut source = rng::seed_rng_from_u64(9);
        let borrowed = simulate_with_source(&cfg, &mut source).unwrap();

        assert_eq!(owned.averaged, borrowed.averaged);
        assert_eq!(owned.meta.seed, Some(9));
        assert_eq!(borrowed.meta.seed, None);
    }

    #[test]
    fn test_entropy_seed_is_reported() {
        let cfg = SimConfig {
            seed: None,
            ..small_config()
        };
        let first = simulate(&cfg).unwrap();
        let seed = first.meta.seed.expect("resolved seed");

        let replay = simulate(&SimConfig {
            seed: Some(seed),
            ..cfg
        })
        .unwrap();
        assert_eq!(first.averaged, replay.averaged);
    }

    #[test]
    fn test_oversized_path_matrix_is_refused() {
        assert!(matches!(
            allocate_path_buffer(usize::MAX / 2, 3),
            Err(SdeError::ResourceExhausted { .. })
        ));
        assert!(matches!(
            allocate_path_buffer(usize::MAX / 8, 1),
            Err(SdeError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        let cfg = SimConfig {
            s0: 1e300,
            r: 500.0,
            sigma: 0.0,
            t: 10.0,
            ..small_config()
        };
        assert!(matches!(
            simulate(&cfg),
            Err(SdeError::NumericalInstability { .. })
        ));
    }
}
