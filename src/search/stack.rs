use crate::search::history::{ContKey, ContinuationHistory};
use crate::search::value::{Value, MAX_PLY, VALUE_NONE};
use cozy_chess::Move;

/// Frames before the root that lookbacks (`ss - 1` .. `ss - 6`) may touch.
pub const STACK_OFFSET: usize = 7;
pub const STACK_SIZE: usize = MAX_PLY as usize + 10;

/// Per-ply search context. One arena of these lives in each worker and is
/// addressed by index, never reallocated during a search.
#[derive(Clone, Copy, Debug)]
pub struct Stack {
    pub ply: i32,
    pub current_move: Option<Move>,
    pub excluded_move: Option<Move>,
    pub killers: [Option<Move>; 2],
    pub static_eval: Value,
    pub stat_score: i32,
    pub move_count: i32,
    pub in_check: bool,
    pub tt_pv: bool,
    pub tt_hit: bool,
    pub double_extensions: i32,
    pub cutoff_cnt: i32,
    pub cont_hist: ContKey,
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            ply: 0,
            current_move: None,
            excluded_move: None,
            killers: [None; 2],
            static_eval: VALUE_NONE,
            stat_score: 0,
            move_count: 0,
            in_check: false,
            tt_pv: false,
            tt_hit: false,
            double_extensions: 0,
            cutoff_cnt: 0,
            cont_hist: ContinuationHistory::SENTINEL,
        }
    }
}

pub fn new_stack() -> Box<[Stack]> {
    let mut s = vec![Stack::default(); STACK_SIZE].into_boxed_slice();
    for (i, f) in s.iter_mut().enumerate().skip(STACK_OFFSET) {
        f.ply = (i - STACK_OFFSET) as i32;
    }
    s
}

/// Triangular principal variation buffer: row `ply` holds the best line
/// found from that ply, built from the child's row on every alpha raise.
pub struct PvTable {
    lines: Vec<Vec<Move>>,
}

impl Default for PvTable {
    fn default() -> Self {
        Self { lines: (0..=MAX_PLY as usize + 1).map(|_| Vec::with_capacity(MAX_PLY as usize)).collect() }
    }
}

impl PvTable {
    pub fn clear(&mut self, ply: usize) { self.lines[ply].clear(); }

    pub fn update(&mut self, ply: usize, mv: Move) {
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        line.clear();
        line.push(mv);
        line.extend_from_slice(&tail[0]);
    }

    pub fn line(&self, ply: usize) -> &[Move] { &self.lines[ply] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn pv_rows_chain() {
        let mut pv = PvTable::default();
        let a = Move::from_str("e2e4").unwrap();
        let b = Move::from_str("e7e5").unwrap();
        pv.clear(2);
        pv.update(1, b);
        pv.update(0, a);
        assert_eq!(pv.line(0), &[a, b]);
        pv.clear(1);
        pv.update(0, b);
        assert_eq!(pv.line(0), &[b]);
    }

    #[test]
    fn stack_plies_start_at_offset() {
        let s = new_stack();
        assert_eq!(s[STACK_OFFSET].ply, 0);
        assert_eq!(s[STACK_SIZE - 1].ply, (STACK_SIZE - 1 - STACK_OFFSET) as i32);
    }
}
