//! Benchmark driver: random dense graph, blocked solve, optional check
//! against the unblocked baseline.
//!
//! Built only with the `bench-cli` feature.
//!
//! ```text
//! cargo run --release --features bench-cli --bin apsp-bench -- 2048 5 --block-size 64 --threads 8
//! RUST_LOG=blocked_apsp=debug apsp-bench 512 --verify
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use blocked_apsp::{baseline, KernelKind, Solver, SolverConfig, WeightMatrix};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "apsp-bench", about = "Benchmark blocked Floyd-Warshall on a random dense graph")]
struct Args {
    /// Number of vertices.
    n: usize,

    /// Number of timed runs.
    #[arg(default_value_t = 1)]
    iterations: usize,

    /// TOML file with solver settings; flags override it.
    #[arg(long, env = "APSP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    block_size: Option<usize>,

    #[arg(long)]
    threads: Option<usize>,

    /// `scalar` or `vectorized`.
    #[arg(long)]
    kernel: Option<KernelKind>,

    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Compare the result with the unblocked triple loop.
    #[arg(long)]
    verify: bool,
}

fn random_graph(n: usize, rng: &mut StdRng) -> anyhow::Result<WeightMatrix<f32>> {
    let data: Vec<f32> = (0..n * n)
        .map(|idx| if idx % (n + 1) == 0 { 0.0 } else { rng.gen_range(0.0..1.0) })
        .collect();
    Ok(WeightMatrix::from_dense(n, data)?)
}

fn load_config(args: &Args) -> anyhow::Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SolverConfig::default(),
    };
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(kernel) = args.kernel {
        config.kernel = kernel;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let solver = Solver::new(config)?;
    info!(n = args.n, iterations = args.iterations, config = ?solver.config(), "benchmarking");

    let mut rng = StdRng::seed_from_u64(args.seed);
    let input = random_graph(args.n, &mut rng)?;

    for iteration in 0..args.iterations {
        let mut graph = input.clone();
        let before = Instant::now();
        let report = solver.solve(&mut graph)?;
        let elapsed = before.elapsed();
        println!("{}.{:06}", elapsed.as_secs(), elapsed.subsec_micros());
        info!(iteration, %report, "run finished");

        if args.verify && iteration == 0 {
            let mut expected = input.to_dense();
            baseline::floyd_warshall(&mut expected, args.n);
            let got = graph.to_dense();
            let worst = got
                .iter()
                .zip(&expected)
                .map(|(&a, &b)| if a == b { 0.0 } else { ((a - b) / b.abs().max(1.0)).abs() })
                .fold(0.0_f32, f32::max);
            // Path sums may associate differently, so allow rounding noise
            if worst > 1.0e-5 {
                bail!("result differs from baseline: max relative error {worst}");
            }
            info!(max_relative_error = worst, "verified against baseline");
        }
    }
    Ok(())
}
