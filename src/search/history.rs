//! Move-ordering statistics learned during search. All tables are owned by
//! a single worker and persist between searches until `clear`.

use cozy_chess::{Color, Move, Piece, Square};

pub const PAWN_HISTORY_SIZE: usize = 512;
pub const CORRECTION_HISTORY_SIZE: usize = 16384;
pub const CORRECTION_HISTORY_LIMIT: i32 = 1024;

#[inline]
pub fn piece_index(c: Color, p: Piece) -> usize { c as usize * 6 + p as usize }

#[inline]
fn from_to(mv: Move) -> usize { mv.from as usize * 64 + mv.to as usize }

/// Flat table of `i16` counters updated with the gravity formula, which keeps
/// each entry inside `[-D, D]`.
pub struct Stats<const D: i32> {
    data: Box<[i16]>,
}

impl<const D: i32> Stats<D> {
    pub fn new(len: usize, fill: i16) -> Self { Self { data: vec![fill; len].into_boxed_slice() } }

    #[inline]
    pub fn get(&self, idx: usize) -> i32 { self.data[idx] as i32 }

    #[inline]
    pub fn update(&mut self, idx: usize, bonus: i32) {
        let b = bonus.clamp(-D, D);
        let e = &mut self.data[idx];
        *e += (b - *e as i32 * b.abs() / D) as i16;
    }

    pub fn fill(&mut self, v: i16) { self.data.fill(v); }
}

/// [color][from][to]
pub struct ButterflyHistory(Stats<7183>);

impl ButterflyHistory {
    pub fn get(&self, c: Color, mv: Move) -> i32 { self.0.get(c as usize * 4096 + from_to(mv)) }
    pub fn update(&mut self, c: Color, mv: Move, bonus: i32) { self.0.update(c as usize * 4096 + from_to(mv), bonus) }
}

/// [moved piece][to][captured piece type]
pub struct CaptureHistory(Stats<10692>);

impl CaptureHistory {
    fn idx(pc: usize, to: Square, captured: Piece) -> usize { (pc * 64 + to as usize) * 6 + captured as usize }
    pub fn get(&self, pc: usize, to: Square, captured: Piece) -> i32 { self.0.get(Self::idx(pc, to, captured)) }
    pub fn update(&mut self, pc: usize, to: Square, captured: Piece, bonus: i32) {
        self.0.update(Self::idx(pc, to, captured), bonus)
    }
}

/// Handle to one [piece][to] sub-table of the continuation history,
/// selected by the move played at an earlier ply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContKey(usize);

const PIECE_TO: usize = 12 * 64;
const CONT_TABLES: usize = 2 * 2 * PIECE_TO;

/// [in check][capture][piece][to] -> [piece][to]
pub struct ContinuationHistory(Stats<29952>);

impl ContinuationHistory {
    /// Table used for plies with no real move (root lookbacks, null moves).
    /// It is read and written like any other but carries no signal.
    pub const SENTINEL: ContKey = ContKey(CONT_TABLES);

    pub fn key(in_check: bool, capture: bool, pc: usize, to: Square) -> ContKey {
        ContKey((((in_check as usize * 2 + capture as usize) * 12 + pc) * 64) + to as usize)
    }

    pub fn get(&self, k: ContKey, pc: usize, to: Square) -> i32 { self.0.get(k.0 * PIECE_TO + pc * 64 + to as usize) }

    pub fn update(&mut self, k: ContKey, pc: usize, to: Square, bonus: i32) {
        self.0.update(k.0 * PIECE_TO + pc * 64 + to as usize, bonus)
    }
}

/// [pawn structure][piece][to]
pub struct PawnHistory(Stats<8192>);

impl PawnHistory {
    fn idx(pawn_key: u64, pc: usize, to: Square) -> usize {
        (pawn_key as usize & (PAWN_HISTORY_SIZE - 1)) * PIECE_TO + pc * 64 + to as usize
    }
    pub fn get(&self, pawn_key: u64, pc: usize, to: Square) -> i32 { self.0.get(Self::idx(pawn_key, pc, to)) }
    pub fn update(&mut self, pawn_key: u64, pc: usize, to: Square, bonus: i32) {
        self.0.update(Self::idx(pawn_key, pc, to), bonus)
    }
}

/// [color][pawn structure] -> correction applied to the static evaluation
pub struct CorrectionHistory(Stats<CORRECTION_HISTORY_LIMIT>);

impl CorrectionHistory {
    fn idx(c: Color, pawn_key: u64) -> usize { c as usize * CORRECTION_HISTORY_SIZE + (pawn_key as usize & (CORRECTION_HISTORY_SIZE - 1)) }
    pub fn get(&self, c: Color, pawn_key: u64) -> i32 { self.0.get(Self::idx(c, pawn_key)) }
    pub fn update(&mut self, c: Color, pawn_key: u64, bonus: i32) { self.0.update(Self::idx(c, pawn_key), bonus) }
}

/// [piece][to] -> the reply that refuted it last time
pub struct CounterMoves(Box<[Option<Move>]>);

impl CounterMoves {
    pub fn get(&self, pc: usize, to: Square) -> Option<Move> { self.0[pc * 64 + to as usize] }
    pub fn set(&mut self, pc: usize, to: Square, mv: Move) { self.0[pc * 64 + to as usize] = Some(mv); }
}

pub struct Histories {
    pub main: ButterflyHistory,
    pub capture: CaptureHistory,
    pub continuation: ContinuationHistory,
    pub pawn: PawnHistory,
    pub correction: CorrectionHistory,
    pub counter_moves: CounterMoves,
}

impl Default for Histories {
    fn default() -> Self {
        let mut h = Self {
            main: ButterflyHistory(Stats::new(2 * 4096, 0)),
            capture: CaptureHistory(Stats::new(PIECE_TO * 6, 0)),
            continuation: ContinuationHistory(Stats::new((CONT_TABLES + 1) * PIECE_TO, 0)),
            pawn: PawnHistory(Stats::new(PAWN_HISTORY_SIZE * PIECE_TO, 0)),
            correction: CorrectionHistory(Stats::new(2 * CORRECTION_HISTORY_SIZE, 0)),
            counter_moves: CounterMoves(vec![None; PIECE_TO].into_boxed_slice()),
        };
        h.clear();
        h
    }
}

impl Histories {
    pub fn clear(&mut self) {
        self.main.0.fill(0);
        self.capture.0.fill(-700);
        self.continuation.0.fill(-71);
        self.pawn.0.fill(-1300);
        self.correction.0.fill(0);
        self.counter_moves.0.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravity_saturates() {
        let mut s: Stats<1000> = Stats::new(1, 0);
        for _ in 0..200 { s.update(0, 400); }
        assert!(s.get(0) <= 1000 && s.get(0) > 900, "got {}", s.get(0));
        for _ in 0..200 { s.update(0, -5000); }
        assert!(s.get(0) >= -1000 && s.get(0) < -900, "got {}", s.get(0));
    }

    #[test]
    fn continuation_keys_are_distinct() {
        let a = ContinuationHistory::key(false, false, 0, Square::A1);
        let b = ContinuationHistory::key(true, false, 0, Square::A1);
        let c = ContinuationHistory::key(true, true, 11, Square::H8);
        assert_ne!(a, b);
        assert!(c.0 < ContinuationHistory::SENTINEL.0);
    }
}
