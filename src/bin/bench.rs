use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pvsearch::bench::{run_bench, BENCH_FENS, DEFAULT_BENCH_DEPTH};
use pvsearch::options::EngineOptions;
use pvsearch::search::ThreadPool;

#[derive(Parser, Debug)]
#[command(name = "pvsearch-bench", version, about = "Search the bench positions and report nodes and NPS")]
struct Args {
    /// Fixed search depth per position
    #[arg(long, default_value_t = DEFAULT_BENCH_DEPTH)]
    depth: i32,

    /// Threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Transposition table size in MB
    #[arg(long, default_value_t = 16)]
    hash_mb: usize,

    /// Print best move and score for every position
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let options = EngineOptions { threads: args.threads, hash_mb: args.hash_mb, ..EngineOptions::default() };
    let mut pool = ThreadPool::silent(options)?;

    let pb = ProgressBar::new(BENCH_FENS.len() as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    let report = run_bench(&mut pool, args.depth, |_, fen, outcome| {
        if args.verbose {
            pb.println(format!(
                "{fen}: bestmove {} score {} depth {}",
                outcome.best_uci.as_deref().unwrap_or("0000"),
                outcome.score,
                outcome.depth
            ));
        }
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    println!(
        "positions={} nodes={} elapsed={:.3}s nps={}",
        report.positions,
        report.nodes,
        report.elapsed.as_secs_f64(),
        report.nps()
    );
    Ok(())
}
