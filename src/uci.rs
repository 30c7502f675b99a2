use crate::bench::{run_bench, DEFAULT_BENCH_DEPTH};
use crate::board::cozy::{Position, STARTPOS_FEN};
use crate::error::Result;
use crate::options::{EngineOptions, MAX_HASH_MB, MAX_THREADS};
use crate::search::eval::eval_cp;
use crate::search::{IterationInfo, Limits, SearchListener, ThreadPool};
use cozy_chess::Color;
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Prints search progress and results in protocol format on stdout.
pub struct UciPrinter;

impl SearchListener for UciPrinter {
    fn on_iteration(&self, info: &IterationInfo) {
        println!("{info}");
    }

    fn on_best_move(&self, best: Option<&str>, ponder: Option<&str>) {
        match (best, ponder) {
            (Some(b), Some(p)) => println!("bestmove {b} ponder {p}"),
            (Some(b), None) => println!("bestmove {b}"),
            _ => println!("bestmove 0000"),
        }
        let _ = io::stdout().flush();
    }

    fn on_perft(&self, divide: &[(String, u64)], total: u64) {
        for (m, n) in divide { println!("{m}: {n}"); }
        println!();
        println!("Nodes searched: {total}");
        let _ = io::stdout().flush();
    }
}

pub struct UciEngine {
    pos: Position,
    pool: ThreadPool,
}

impl UciEngine {
    pub fn new(options: EngineOptions) -> Result<Self> {
        Ok(Self { pos: Position::startpos(), pool: ThreadPool::new(options, Arc::new(UciPrinter))? })
    }

    /// Engine with a custom listener, mostly for driving it from tests.
    pub fn with_listener(options: EngineOptions, listener: Arc<dyn SearchListener>) -> Result<Self> {
        Ok(Self { pos: Position::startpos(), pool: ThreadPool::new(options, listener)? })
    }

    pub fn position(&self) -> &Position { &self.pos }
    pub fn pool(&self) -> &ThreadPool { &self.pool }

    fn cmd_uci(&self) {
        let o = self.pool.options();
        println!("id name pvsearch {}", env!("CARGO_PKG_VERSION"));
        println!("id author PieBot Team");
        println!();
        println!("option name Threads type spin default {} min 1 max {MAX_THREADS}", o.threads);
        println!("option name Hash type spin default {} min 1 max {MAX_HASH_MB}", o.hash_mb);
        println!("option name Clear Hash type button");
        println!("option name Ponder type check default {}", o.ponder);
        println!("option name MultiPV type spin default {} min 1 max 500", o.multi_pv);
        println!("option name Move Overhead type spin default {} min 0 max 5000", o.move_overhead_ms);
        println!("uciok");
    }

    fn cmd_setoption(&mut self, args: &str) {
        // setoption name <id> [value <x>], where <id> may contain spaces
        let Some(rest) = args.trim().strip_prefix("name") else {
            warn!("malformed setoption: {args}");
            return;
        };
        let (name, value) = match rest.find(" value ") {
            Some(i) => (rest[..i].trim(), rest[i + 7..].trim()),
            None => (rest.trim(), ""),
        };
        self.pool.wait_for_search_finished();
        if name.eq_ignore_ascii_case("clear hash") {
            if let Err(e) = self.pool.clear() { warn!("clear hash: {e}"); }
            return;
        }
        if let Err(e) = self.pool.set_option(name, value) {
            warn!("setoption {name}: {e}");
        }
    }

    fn cmd_position(&mut self, args: &str) {
        let (head, moves) = match args.find("moves") {
            Some(i) => (args[..i].trim(), args[i + 5..].split_whitespace().collect::<Vec<_>>()),
            None => (args.trim(), Vec::new()),
        };
        let base = if head == "startpos" {
            Position::from_fen(STARTPOS_FEN)
        } else if let Some(fen) = head.strip_prefix("fen") {
            Position::from_fen(fen.trim())
        } else {
            warn!("malformed position: {args}");
            return;
        };
        let mut pos = match base {
            Ok(p) => p,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        for m in moves {
            if let Err(e) = pos.make_move_uci(m) {
                warn!("{e}");
                return;
            }
        }
        self.pos = pos;
    }

    /// Parses the arguments of `go` into search limits and the ponder flag.
    pub fn parse_go(&self, args: &str) -> (Limits, bool) {
        let mut limits = Limits::default();
        let mut ponder = false;
        let mut tokens = args.split_whitespace().peekable();
        let ms = |t: Option<&str>| Duration::from_millis(t.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0).max(0) as u64);
        while let Some(tok) = tokens.next() {
            match tok {
                "wtime" => limits.time[Color::White as usize] = ms(tokens.next()),
                "btime" => limits.time[Color::Black as usize] = ms(tokens.next()),
                "winc" => limits.inc[Color::White as usize] = ms(tokens.next()),
                "binc" => limits.inc[Color::Black as usize] = ms(tokens.next()),
                "movetime" => limits.movetime = Some(ms(tokens.next())),
                "movestogo" => limits.movestogo = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "depth" => limits.depth = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "nodes" => limits.nodes = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "mate" => limits.mate = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "perft" => limits.perft = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "infinite" => limits.infinite = true,
                "ponder" => ponder = true,
                "searchmoves" => {
                    while let Some(&m) = tokens.peek() {
                        match self.pos.parse_uci_move(m) {
                            Ok(mv) => limits.searchmoves.push(mv),
                            Err(_) => break,
                        }
                        tokens.next();
                    }
                }
                other => warn!("unknown go parameter {other}"),
            }
        }
        (limits, ponder)
    }

    fn cmd_go(&mut self, args: &str) {
        let (limits, ponder) = self.parse_go(args);
        if let Err(e) = self.pool.start_thinking(&self.pos, limits, ponder) {
            warn!("go: {e}");
        }
    }

    fn cmd_bench(&mut self, args: &str) {
        let depth = args.split_whitespace().next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_BENCH_DEPTH);
        self.pool.wait_for_search_finished();
        let res = run_bench(&mut self.pool, depth, |i, fen, _| eprintln!("Position: {} ({fen})", i + 1));
        match res {
            Ok(r) => {
                eprintln!();
                eprintln!("Total time (ms) : {}", r.elapsed.as_millis());
                eprintln!("Nodes searched  : {}", r.nodes);
                eprintln!("Nodes/second    : {}", r.nps());
            }
            Err(e) => warn!("bench: {e}"),
        }
    }

    /// Handles one input line. Returns false once the engine should exit.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let line = line.trim();
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match cmd {
            "" => {}
            "uci" => self.cmd_uci(),
            "isready" => println!("readyok"),
            "ucinewgame" => {
                self.pool.wait_for_search_finished();
                if let Err(e) = self.pool.clear() { warn!("ucinewgame: {e}"); }
                self.pos = Position::startpos();
            }
            "setoption" => self.cmd_setoption(rest),
            "position" => self.cmd_position(rest),
            "go" => self.cmd_go(rest),
            "stop" => self.pool.stop(),
            "ponderhit" => self.pool.ponderhit(),
            "quit" => {
                self.pool.stop();
                self.pool.ponderhit();
                self.pool.wait_for_search_finished();
                return false;
            }
            "bench" => self.cmd_bench(rest),
            "eval" => println!("Final evaluation: {} (white side)", {
                let cp = eval_cp(&self.pos);
                if self.pos.side_to_move() == Color::White { cp } else { -cp }
            }),
            "d" => println!("{}", self.pos.fen()),
            other => warn!("unknown command: {other}"),
        }
        let _ = io::stdout().flush();
        true
    }

    pub fn run_loop(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle_command(&line) { return; }
        }
        info!("input closed");
        self.handle_command("quit");
    }
}
