mod logging;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dm_matrix::{allocated, bytes, deallocated, profile, Matrix, Profile, StrategyKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use crate::logging::init_subscriber;

fn main() -> Result<()> {
    init_subscriber();

    let args = BenchArgs::parse();
    let (m, k, n) = args.dims();
    let strategies = if args.strategies.is_empty() {
        StrategyKind::all().to_vec()
    } else {
        args.strategies.clone()
    };
    if args.repeat == 0 {
        bail!("--repeat must be at least 1");
    }

    info!(m, k, n, seed = args.seed, "building operands");
    let mut rng = StdRng::seed_from_u64(args.seed);
    let a = random_matrix(m, k, &mut rng).context("allocating A")?;
    let b = random_matrix(k, n, &mut rng).context("allocating B")?;

    let mut baseline: Option<(StrategyKind, Matrix)> = None;
    let mut rows = Vec::with_capacity(strategies.len());

    for kind in strategies {
        let strategy = kind.build();
        let mut best: Option<Profile> = None;
        let mut product = None;

        for _ in 0..args.repeat {
            let (c, p) = profile(strategy.as_ref(), &a, &b)
                .with_context(|| format!("running {}", kind))?;
            if best.as_ref().map_or(true, |prev| p.elapsed < prev.elapsed) {
                best = Some(p);
            }
            product = Some(c);
        }
        let (Some(best), Some(product)) = (best, product) else {
            continue;
        };
        info!(strategy = %kind, elapsed_ms = best.elapsed.as_millis() as u64, "done");

        match &baseline {
            Some((base_kind, base)) => {
                let diff = max_relative_diff(base, &product);
                if diff > args.tolerance {
                    error!(strategy = %kind, baseline = %base_kind, diff, "results disagree");
                    bail!(
                        "{} differs from {} by {:e} (tolerance {:e})",
                        kind,
                        base_kind,
                        diff,
                        args.tolerance
                    );
                }
            }
            None => baseline = Some((kind, product)),
        }
        rows.push((kind, best));
    }

    println!("{}x{} @ {}x{}, best of {}", m, k, k, n, args.repeat);
    println!("{:<12} {:>12} {:>10}", "strategy", "time", "GFLOPS");
    for (kind, p) in &rows {
        println!(
            "{:<12} {:>12} {:>10.3}",
            kind.to_string(),
            format_duration(p.elapsed),
            p.gflops()
        );
    }

    drop(baseline);
    drop(a);
    drop(b);
    println!(
        "allocator: {} bytes in flight, {} allocations, {} deallocations",
        bytes(),
        allocated(),
        deallocated()
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(about = "Compare dense matrix multiplication strategies")]
struct BenchArgs {
    /// Edge length of the square operands.
    #[arg(long, short, default_value_t = 256)]
    size: usize,

    /// Rows of A. Defaults to --size.
    #[arg(long)]
    m: Option<usize>,

    /// Columns of A and rows of B. Defaults to --size.
    #[arg(long)]
    k: Option<usize>,

    /// Columns of B. Defaults to --size.
    #[arg(long)]
    n: Option<usize>,

    /// Strategy to run: naive, tile, tile:<size> or fast. May be repeated;
    /// runs all strategies when omitted. The first one is the baseline.
    #[arg(long = "strategy", short = 't')]
    strategies: Vec<StrategyKind>,

    /// Number of timed runs per strategy; the fastest is reported.
    #[arg(long, short, default_value_t = 3)]
    repeat: usize,

    /// Seed for the random operands.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Largest relative element difference tolerated against the baseline.
    #[arg(long, default_value_t = 1e-9)]
    tolerance: f64,
}

impl BenchArgs {
    fn dims(&self) -> (usize, usize, usize) {
        (
            self.m.unwrap_or(self.size),
            self.k.unwrap_or(self.size),
            self.n.unwrap_or(self.size),
        )
    }
}

fn random_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> dm_matrix::Result<Matrix> {
    let mut m = Matrix::new(rows, cols)?;
    for v in m.as_mut_slice() {
        *v = rng.gen_range(-1.0..1.0);
    }
    Ok(m)
}

/// Largest `|x - y| / max(|x|, |y|, 1)` over corresponding elements.
fn max_relative_diff(expected: &Matrix, actual: &Matrix) -> f64 {
    if expected.shape() != actual.shape() {
        return f64::INFINITY;
    }
    expected
        .as_slice()
        .iter()
        .zip(actual.as_slice())
        .map(|(&x, &y)| (x - y).abs() / x.abs().max(y.abs()).max(1.0))
        .fold(0.0, f64::max)
}

fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.3}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.3}ms", d.as_secs_f64() * 1e3)
    } else {
        format!("{}us", d.as_micros())
    }
}
