use crate::board::Position;
use crate::search::value::{to_cp, Value, VALUE_MATE, VALUE_MATE_IN_MAX_PLY};
use cozy_chess::Move;
use std::fmt;
use std::time::Duration;

/// Score as shown to a GUI: centipawns, or moves to mate (negative when
/// getting mated).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

impl Score {
    pub fn from_value(v: Value) -> Self {
        if v.abs() >= VALUE_MATE_IN_MAX_PLY {
            let n = if v > 0 { (VALUE_MATE - v + 1) / 2 } else { (-VALUE_MATE - v) / 2 };
            Score::Mate(n)
        } else {
            Score::Cp(to_cp(v))
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {cp}"),
            Score::Mate(n) => write!(f, "mate {n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreBound {
    Exact,
    Lower,
    Upper,
}

/// One `info` line worth of progress for a single PV.
#[derive(Clone, Debug)]
pub struct IterationInfo {
    pub depth: i32,
    pub sel_depth: i32,
    pub multipv: usize,
    pub score: Score,
    pub bound: ScoreBound,
    pub nodes: u64,
    pub nps: u64,
    pub hashfull: usize,
    pub tb_hits: u64,
    pub time: Duration,
    pub pv: Vec<String>,
}

impl fmt::Display for IterationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "info depth {} seldepth {} multipv {} score {}", self.depth, self.sel_depth, self.multipv, self.score)?;
        match self.bound {
            ScoreBound::Lower => write!(f, " lowerbound")?,
            ScoreBound::Upper => write!(f, " upperbound")?,
            ScoreBound::Exact => {}
        }
        write!(
            f,
            " nodes {} nps {} hashfull {} tbhits {} time {} pv {}",
            self.nodes,
            self.nps,
            self.hashfull,
            self.tb_hits,
            self.time.as_millis(),
            self.pv.join(" ")
        )
    }
}

/// Final result of a search, taken from the winning thread.
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
    pub best_uci: Option<String>,
    pub ponder_uci: Option<String>,
    pub score: Value,
    pub depth: i32,
    pub sel_depth: i32,
    pub pv: Vec<Move>,
    pub nodes: u64,
    pub thread: usize,
}

/// Receives progress and results from the lead search thread. Calls come
/// from the search thread, so implementations must be thread safe.
pub trait SearchListener: Send + Sync {
    fn on_iteration(&self, _info: &IterationInfo) {}
    fn on_best_move(&self, _best: Option<&str>, _ponder: Option<&str>) {}
    fn on_perft(&self, _divide: &[(String, u64)], _total: u64) {}
}

pub struct SilentListener;

impl SearchListener for SilentListener {}

/// Converts a line of moves played from `root` into protocol notation.
pub fn pv_to_uci(root: &Position, pv: &[Move]) -> Vec<String> {
    let mut pos = root.clone();
    let mut out = Vec::with_capacity(pv.len());
    for &m in pv {
        if !pos.is_legal(m) { break; }
        out.push(pos.move_to_uci(m));
        pos.do_move(m);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::value::{mate_in, mated_in};

    #[test]
    fn mate_scores_in_moves() {
        assert_eq!(Score::from_value(mate_in(1)), Score::Mate(1));
        assert_eq!(Score::from_value(mate_in(3)), Score::Mate(2));
        assert_eq!(Score::from_value(mated_in(2)), Score::Mate(-1));
        assert_eq!(Score::from_value(208).to_string(), "cp 100");
    }
}
