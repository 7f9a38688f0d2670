// scripts/benchmark.rs
use gbm_moments::analytics::gbm_analytic;
use gbm_moments::math_utils::Timer;
use gbm_moments::mc::mc_engine::{simulate, Averaging, Execution, Retain, SimConfig};
use gbm_moments::output;
use gbm_moments::stats::moments::{compute_moments, KurtosisConvention};
use std::env;
use std::fs::File;
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_cores: usize,
    rustc_flags: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_cores: num_cpus::get(),
            rustc_flags: env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
            rayon_threads: rayon::current_num_threads(),
        }
    }
}

struct BenchmarkResult {
    name: String,
    paths: usize,
    steps: usize,
    batch_size: usize,
    time_ms: f64,
    throughput_paths_per_sec: f64,
    mean: f64,
    expected: f64,
    relative_error: f64,
    skewness: f64,
    excess_kurtosis: f64,
}

fn run_simulation_benchmarks() -> Vec<BenchmarkResult> {
    let mut results = Vec::new();

    let grid = [(10_000, 252), (100_000, 252), (1_000_000, 12), (200_000, 1_000)];

    for &(paths, steps) in &grid {
        for execution in [Execution::Sequential, Execution::Parallel] {
            println!("Running {:?} with {} paths x {} steps...", execution, paths, steps);

            let cfg = SimConfig {
                paths,
                steps,
                s0: 100.0,
                r: 0.02,
                sigma: 0.2,
                t: 1.0,
                seed: Some(42),
                execution,
                ..Default::default()
            };

            let mut timer = Timer::new();
            timer.start();
            let out = simulate(&cfg).expect("Valid configuration");
            let time_ms = timer.elapsed_ms();

            let moments = compute_moments(&out.averaged, KurtosisConvention::Fisher)
                .expect("At least two paths");
            let expected = gbm_analytic::expected_average_price(
                cfg.s0,
                cfg.r,
                cfg.t,
                steps,
                Averaging::ExcludeInitial,
            );

            results.push(BenchmarkResult {
                name: format!("{:?} ({}k x {})", execution, paths / 1000, steps),
                paths,
                steps,
                batch_size: out.meta.batch_size,
                time_ms,
                throughput_paths_per_sec: paths as f64 / (time_ms / 1000.0),
                mean: moments.mean,
                expected,
                relative_error: (moments.mean - expected).abs() / expected,
                skewness: moments.skewness,
                excess_kurtosis: moments.kurtosis,
            });
        }
    }

    results
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &SystemInfo,
    filename: &str,
) -> std::io::Result<()> {
    let mut file = File::create(filename)?;

    writeln!(file, "# System Information")?;
    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# RUSTFLAGS: {}", system_info.rustc_flags)?;
    writeln!(file, "# Rayon Threads: {}", system_info.rayon_threads)?;
    writeln!(
        file,
        "# Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "#")?;

    writeln!(
        file,
        "Benchmark,Paths,Steps,Batch,Time_ms,Throughput_paths_per_sec,Mean,Expected,Relative_Error,Skewness,Excess_Kurtosis"
    )?;
    for result in results {
        writeln!(
            file,
            "{},{},{},{},{:.2},{:.0},{:.6},{:.6},{:.6},{:.6},{:.6}",
            result.name,
            result.paths,
            result.steps,
            result.batch_size,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.mean,
            result.expected,
            result.relative_error,
            result.skewness,
            result.excess_kurtosis
        )?;
    }

    println!("Results written to {}", filename);
    Ok(())
}

/// `--dump-sample <file>`: write the reference scenario sample and its
/// summary next to the benchmark results.
fn dump_reference_sample(filename: &str) -> std::io::Result<()> {
    let cfg = SimConfig {
        paths: 20_000,
        steps: 252,
        s0: 100.0,
        r: 0.02,
        sigma: 0.2,
        t: 1.0,
        seed: Some(123),
        retain: Retain::TERMINAL,
        ..Default::default()
    };
    let out = simulate(&cfg).expect("Valid configuration");
    let moments =
        compute_moments(&out.averaged, KurtosisConvention::Fisher).expect("At least two paths");

    output::write_sample_to_csv(filename, &out)?;

    let meta = &out.meta;
    let summary = [
        ("s0", meta.s0.to_string()),
        ("r", meta.r.to_string()),
        ("sigma", meta.sigma.to_string()),
        ("t", meta.t.to_string()),
        ("steps", meta.steps.to_string()),
        ("paths", meta.paths.to_string()),
        ("dt", meta.dt.to_string()),
        ("batch_size", meta.batch_size.to_string()),
        ("seed", format!("{:?}", meta.seed)),
        ("mean", moments.mean.to_string()),
        ("variance", moments.variance.to_string()),
        ("skewness", moments.skewness.to_string()),
        ("excess_kurtosis", moments.kurtosis.to_string()),
    ];
    let summary_file = format!("{}.summary.csv", filename.trim_end_matches(".csv"));
    output::write_summary_to_csv(&summary_file, &summary)?;

    println!("Sample written to {} (summary: {})", filename, summary_file);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("gbm-moments Benchmark Suite");
    println!("===========================\n");

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  RUSTFLAGS: {}", system_info.rustc_flags);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|a| a == "--dump-sample") {
        let filename = args
            .get(pos + 1)
            .map(String::as_str)
            .unwrap_or("reference_sample.csv");
        if let Err(e) = dump_reference_sample(filename) {
            eprintln!("Failed to write sample: {}", e);
        }
    }

    println!("Running simulation benchmarks...");
    let results = run_simulation_benchmarks();

    println!("\n{:=<96}", "");
    println!("BENCHMARK RESULTS");
    println!("{:=<96}", "");
    println!(
        "{:<28} {:>8} {:>12} {:>15} {:>10} {:>10} {:>10}",
        "Benchmark", "Batch", "Time (ms)", "Throughput", "Mean", "Expected", "Rel Error"
    );
    println!("{:-<96}", "");
    for result in &results {
        println!(
            "{:<28} {:>8} {:>12.2} {:>15.0} {:>10.4} {:>10.4} {:>9.3}%",
            result.name,
            result.batch_size,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.mean,
            result.expected,
            result.relative_error * 100.0
        );
    }
    println!("{:=<96}", "");

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("benchmark_results_{}.csv", timestamp);
    if let Err(e) = write_results_to_csv(&results, &system_info, &filename) {
        eprintln!("Failed to write results: {}", e);
    }

    println!("\nBenchmark complete!");
    println!("To reproduce: cargo run --bin benchmark --release");
}
