use anyhow::{Context, Result};
use clap::Parser;
use pvsearch::options::EngineOptions;
use pvsearch::uci::UciEngine;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lazy SMP alpha-beta chess engine speaking UCI", long_about = None)]
struct Args {
    /// Search threads (overrides the config file)
    #[arg(long)]
    threads: Option<usize>,

    /// Transposition table size in MB (overrides the config file)
    #[arg(long)]
    hash: Option<usize>,

    /// JSON file with engine options and search parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run one command (e.g. `bench 8`) and exit instead of reading stdin
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => EngineOptions::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineOptions::default(),
    };
    if let Some(t) = args.threads { options.threads = t; }
    if let Some(h) = args.hash { options.hash_mb = h; }

    let mut engine = UciEngine::new(options.sanitized()).context("failed to start search threads")?;
    if args.command.is_empty() {
        engine.run_loop();
    } else {
        engine.handle_command(&args.command.join(" "));
        engine.handle_command("quit");
    }
    Ok(())
}
