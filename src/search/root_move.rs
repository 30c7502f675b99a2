use crate::board::Position;
use crate::search::tt::TranspositionTable;
use crate::search::value::{Value, VALUE_INFINITE};
use cozy_chess::Move;
use std::cmp::Ordering;

#[derive(Clone, Debug)]
pub struct RootMove {
    pub score: Value,
    pub previous_score: Value,
    pub average_score: Value,
    pub uci_score: Value,
    pub score_lowerbound: bool,
    pub score_upperbound: bool,
    pub sel_depth: i32,
    pub tb_rank: i32,
    pub tb_score: Value,
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            score: -VALUE_INFINITE,
            previous_score: -VALUE_INFINITE,
            average_score: -VALUE_INFINITE,
            uci_score: -VALUE_INFINITE,
            score_lowerbound: false,
            score_upperbound: false,
            sel_depth: 0,
            tb_rank: 0,
            tb_score: 0,
            pv: vec![mv],
        }
    }

    pub fn mv(&self) -> Move { self.pv[0] }

    /// Best first: higher score, then higher previous score.
    pub fn rank_cmp(a: &RootMove, b: &RootMove) -> Ordering {
        b.score.cmp(&a.score).then_with(|| b.previous_score.cmp(&a.previous_score))
    }

    /// Fills in a ponder move from the table when the search ended with a
    /// one-move PV (e.g. after a fail high).
    pub fn extract_ponder_from_tt(&mut self, tt: &TranspositionTable, root: &Position) -> bool {
        if self.pv.len() != 1 { return self.pv.len() > 1; }
        let mut pos = root.clone();
        pos.do_move(self.pv[0]);
        if let Some(m) = tt.probe(pos.key()).and_then(|e| e.mv) {
            if pos.is_legal(m) { self.pv.push(m); }
        }
        self.pv.len() > 1
    }
}

impl PartialEq<Move> for RootMove {
    fn eq(&self, other: &Move) -> bool { self.pv[0] == *other }
}

/// Stable sort, so equal-ranked moves keep their previous order.
pub fn sort_root_moves(moves: &mut [RootMove]) { moves.sort_by(RootMove::rank_cmp); }

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn rm(s: &str, score: Value, prev: Value) -> RootMove {
        let mut r = RootMove::new(Move::from_str(s).unwrap());
        r.score = score;
        r.previous_score = prev;
        r
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let mut v = vec![rm("a2a3", 10, 0), rm("b2b3", 30, 5), rm("c2c3", 30, 9), rm("d2d3", 10, 0)];
        sort_root_moves(&mut v);
        let order: Vec<String> = v.iter().map(|r| r.mv().to_string()).collect();
        assert_eq!(order, ["c2c3", "b2b3", "a2a3", "d2d3"]);
        for w in v.windows(2) {
            assert_ne!(RootMove::rank_cmp(&w[0], &w[1]), Ordering::Greater);
        }
    }

    #[test]
    fn equality_uses_first_move_only() {
        let mut r = rm("e2e4", 0, 0);
        r.pv.push(Move::from_str("e7e5").unwrap());
        assert!(r == Move::from_str("e2e4").unwrap());
        assert!(r != Move::from_str("d2d4").unwrap());
    }
}
