use anyhow::Result;
use clap::Parser;
use pvsearch::board::cozy::{Position, STARTPOS_FEN};
use pvsearch::perft::divide;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "perft", about = "Move generation node counter with per-move divide")]
struct Args {
    /// Search depth
    #[arg(value_name = "DEPTH")]
    depth: u32,
    /// FEN string or "startpos"
    #[arg(value_name = "FEN", default_value = "startpos")]
    fen: String,
    /// Number of threads for the root split
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Print the node count of every root move
    #[arg(long, default_value_t = false)]
    divide: bool,
    /// Report elapsed time and NPS
    #[arg(long, default_value_t = false)]
    nps: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let fen = if args.fen == "startpos" { STARTPOS_FEN } else { args.fen.as_str() };
    let pos = Position::from_fen(fen)?;

    if args.depth == 0 {
        println!("nodes: 1");
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads.max(1)).build()?;
    let t0 = Instant::now();
    let counts = pool.install(|| divide(&pos, args.depth));
    let dt = t0.elapsed().as_secs_f64();
    let nodes: u64 = counts.iter().map(|(_, n)| n).sum();

    if args.divide {
        for (m, n) in &counts { println!("{m}: {n}"); }
    }
    if args.nps {
        println!("nodes: {nodes} elapsed: {dt:.3}s nps: {:.1}", nodes as f64 / dt.max(f64::EPSILON));
    } else {
        println!("nodes: {nodes}");
    }
    Ok(())
}
