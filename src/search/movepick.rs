use crate::board::cozy::{piece_value, Position};
use crate::search::history::{piece_index, ContKey, Histories};
use crate::search::value::{Depth, Value, DEPTH_QS_CHECKS};
use cozy_chess::{Move, Piece};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    MainTt,
    CaptureInit,
    GoodCapture,
    Refutation,
    QuietInit,
    Quiet,
    BadCapture,
    EvasionTt,
    EvasionInit,
    Evasion,
    ProbCutTt,
    ProbCutInit,
    ProbCut,
    QsearchTt,
    QCaptureInit,
    QCapture,
    QCheckInit,
    QCheck,
    Done,
}

#[derive(Clone, Copy, Debug)]
struct ScoredMove {
    mv: Move,
    score: i32,
}

/// Continuation-history keys of the frames at ss-1, ss-2, ss-3, ss-4 and
/// ss-6, in that order.
pub type ContLookback = [ContKey; 5];

/// Hands out the legal moves of a node one at a time in the order they are
/// most likely to cause a cutoff, generating and scoring lazily by stage.
pub struct MovePicker {
    stage: Stage,
    tt_move: Option<Move>,
    refutations: [Option<Move>; 3],
    ref_idx: usize,
    depth: Depth,
    threshold: Value,
    cont: ContLookback,
    moves: Vec<ScoredMove>,
    cur: usize,
    bad_captures: Vec<Move>,
    bad_idx: usize,
}

impl MovePicker {
    fn base(stage: Stage, tt_move: Option<Move>, depth: Depth, cont: ContLookback) -> Self {
        Self {
            stage,
            tt_move,
            refutations: [None; 3],
            ref_idx: 0,
            depth,
            threshold: 0,
            cont,
            moves: Vec::with_capacity(64),
            cur: 0,
            bad_captures: Vec::new(),
            bad_idx: 0,
        }
    }

    /// Picker for the main search. In check it only yields evasions.
    pub fn new_main(
        pos: &Position,
        tt_move: Option<Move>,
        depth: Depth,
        killers: [Option<Move>; 2],
        counter: Option<Move>,
        cont: ContLookback,
    ) -> Self {
        let tt_move = tt_move.filter(|&m| pos.is_legal(m));
        let mut s = if pos.in_check() {
            Self::base(Stage::EvasionTt, tt_move, depth, cont)
        } else {
            Self::base(Stage::MainTt, tt_move, depth, cont)
        };
        s.refutations = [killers[0], killers[1], counter];
        s.skip_missing_tt();
        s
    }

    /// Picker for quiescence search: captures, plus quiet checks when
    /// `depth == DEPTH_QS_CHECKS`, or evasions when in check.
    pub fn new_qsearch(pos: &Position, tt_move: Option<Move>, depth: Depth, cont: ContLookback) -> Self {
        let in_check = pos.in_check();
        let tt_move = tt_move.filter(|&m| {
            pos.is_legal(m) && (in_check || pos.is_capture_stage(m) || (depth >= DEPTH_QS_CHECKS && pos.gives_check(m)))
        });
        let mut s = if in_check {
            Self::base(Stage::EvasionTt, tt_move, depth, cont)
        } else {
            Self::base(Stage::QsearchTt, tt_move, depth, cont)
        };
        s.skip_missing_tt();
        s
    }

    /// Picker for ProbCut: captures whose exchange value reaches `threshold`.
    pub fn new_probcut(pos: &Position, tt_move: Option<Move>, threshold: Value, cont: ContLookback) -> Self {
        let tt_move = tt_move.filter(|&m| pos.is_legal(m) && pos.is_capture_stage(m) && pos.see_ge(m, threshold));
        let mut s = Self::base(Stage::ProbCutTt, tt_move, 0, cont);
        s.threshold = threshold;
        s.skip_missing_tt();
        s
    }

    fn skip_missing_tt(&mut self) {
        if self.tt_move.is_none() {
            self.stage = self.after_tt();
        }
    }

    fn after_tt(&self) -> Stage {
        match self.stage {
            Stage::MainTt => Stage::CaptureInit,
            Stage::EvasionTt => Stage::EvasionInit,
            Stage::ProbCutTt => Stage::ProbCutInit,
            Stage::QsearchTt => Stage::QCaptureInit,
            s => s,
        }
    }

    fn score_captures(&mut self, pos: &Position, h: &Histories) {
        let stm = pos.side_to_move();
        self.moves.clear();
        for m in pos.legal_moves() {
            if !pos.is_capture_stage(m) { continue; }
            let captured = pos.captured_piece(m);
            let pc = piece_index(stm, pos.moved_piece(m));
            let mut score = 7 * captured.map_or(0, piece_value) + h.capture.get(pc, m.to, captured.unwrap_or(Piece::Pawn));
            if m.promotion == Some(Piece::Queen) { score += 7 * piece_value(Piece::Queen); }
            self.moves.push(ScoredMove { mv: m, score: score / 16 });
        }
        self.cur = 0;
    }

    fn quiet_score(&self, pos: &Position, h: &Histories, m: Move, pawn_key: u64) -> i32 {
        let stm = pos.side_to_move();
        let pc = piece_index(stm, pos.moved_piece(m));
        let ch = &h.continuation;
        2 * h.main.get(stm, m)
            + 2 * h.pawn.get(pawn_key, pc, m.to)
            + 2 * ch.get(self.cont[0], pc, m.to)
            + ch.get(self.cont[1], pc, m.to)
            + ch.get(self.cont[2], pc, m.to) / 4
            + ch.get(self.cont[3], pc, m.to)
            + ch.get(self.cont[4], pc, m.to)
    }

    fn score_quiets(&mut self, pos: &Position, h: &Histories) {
        let pawn_key = pos.pawn_key();
        let quiets: Vec<ScoredMove> = pos
            .legal_moves()
            .into_iter()
            .filter(|&m| !pos.is_capture_stage(m))
            .map(|m| ScoredMove { mv: m, score: self.quiet_score(pos, h, m, pawn_key) })
            .collect();
        self.moves = quiets;
        self.cur = 0;
        partial_insertion_sort(&mut self.moves, -3000 * self.depth);
    }

    fn score_evasions(&mut self, pos: &Position, h: &Histories) {
        let stm = pos.side_to_move();
        let pawn_key = pos.pawn_key();
        self.moves.clear();
        for m in pos.legal_moves() {
            let score = if let Some(captured) = pos.captured_piece(m) {
                piece_value(captured) - pos.moved_piece(m) as i32 + (1 << 28)
            } else {
                let pc = piece_index(stm, pos.moved_piece(m));
                h.main.get(stm, m) + h.continuation.get(self.cont[0], pc, m.to) + h.pawn.get(pawn_key, pc, m.to)
            };
            self.moves.push(ScoredMove { mv: m, score });
        }
        self.cur = 0;
    }

    // Swaps the best remaining move to the cursor and returns it.
    fn pick_best(&mut self) -> Option<ScoredMove> {
        if self.cur >= self.moves.len() { return None; }
        let mut best = self.cur;
        for i in self.cur + 1..self.moves.len() {
            if self.moves[i].score > self.moves[best].score { best = i; }
        }
        self.moves.swap(self.cur, best);
        self.cur += 1;
        Some(self.moves[self.cur - 1])
    }

    pub fn next_move(&mut self, pos: &Position, h: &Histories, skip_quiets: bool) -> Option<Move> {
        loop {
            match self.stage {
                Stage::MainTt | Stage::EvasionTt | Stage::ProbCutTt | Stage::QsearchTt => {
                    self.stage = self.after_tt();
                    return self.tt_move;
                }
                Stage::CaptureInit | Stage::ProbCutInit | Stage::QCaptureInit => {
                    self.score_captures(pos, h);
                    self.stage = match self.stage {
                        Stage::CaptureInit => Stage::GoodCapture,
                        Stage::ProbCutInit => Stage::ProbCut,
                        _ => Stage::QCapture,
                    };
                }
                Stage::GoodCapture => {
                    while let Some(sm) = self.pick_best() {
                        if Some(sm.mv) == self.tt_move { continue; }
                        if pos.see_ge(sm.mv, -sm.score) { return Some(sm.mv); }
                        self.bad_captures.push(sm.mv);
                    }
                    self.stage = Stage::Refutation;
                }
                Stage::Refutation => {
                    while self.ref_idx < self.refutations.len() {
                        let i = self.ref_idx;
                        self.ref_idx += 1;
                        let Some(m) = self.refutations[i] else { continue };
                        let duplicate = self.refutations[..i].contains(&Some(m));
                        if !duplicate && Some(m) != self.tt_move && pos.is_legal(m) && !pos.is_capture_stage(m) {
                            return Some(m);
                        }
                    }
                    self.stage = Stage::QuietInit;
                }
                Stage::QuietInit => {
                    if skip_quiets { self.moves.clear(); self.cur = 0; } else { self.score_quiets(pos, h); }
                    self.stage = Stage::Quiet;
                }
                Stage::Quiet => {
                    if !skip_quiets {
                        while self.cur < self.moves.len() {
                            let m = self.moves[self.cur].mv;
                            self.cur += 1;
                            if Some(m) != self.tt_move && !self.refutations.contains(&Some(m)) { return Some(m); }
                        }
                    }
                    self.stage = Stage::BadCapture;
                }
                Stage::BadCapture => {
                    if self.bad_idx < self.bad_captures.len() {
                        self.bad_idx += 1;
                        return Some(self.bad_captures[self.bad_idx - 1]);
                    }
                    self.stage = Stage::Done;
                }
                Stage::EvasionInit => {
                    self.score_evasions(pos, h);
                    self.stage = Stage::Evasion;
                }
                Stage::Evasion | Stage::QCapture => {
                    while let Some(sm) = self.pick_best() {
                        if Some(sm.mv) != self.tt_move { return Some(sm.mv); }
                    }
                    self.stage = if self.stage == Stage::QCapture && self.depth == DEPTH_QS_CHECKS {
                        Stage::QCheckInit
                    } else {
                        Stage::Done
                    };
                }
                Stage::ProbCut => {
                    while let Some(sm) = self.pick_best() {
                        if Some(sm.mv) != self.tt_move && pos.see_ge(sm.mv, self.threshold) { return Some(sm.mv); }
                    }
                    self.stage = Stage::Done;
                }
                Stage::QCheckInit => {
                    self.moves = pos
                        .legal_moves()
                        .into_iter()
                        .filter(|&m| !pos.is_capture_stage(m) && pos.gives_check(m))
                        .map(|mv| ScoredMove { mv, score: 0 })
                        .collect();
                    self.cur = 0;
                    self.stage = Stage::QCheck;
                }
                Stage::QCheck => {
                    while self.cur < self.moves.len() {
                        let m = self.moves[self.cur].mv;
                        self.cur += 1;
                        if Some(m) != self.tt_move { return Some(m); }
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }
}

// Sorts moves scoring at least `limit` to the front in descending order;
// the rest keep their generation order.
fn partial_insertion_sort(moves: &mut [ScoredMove], limit: i32) {
    let mut sorted_end = 0;
    for p in 0..moves.len() {
        if moves[p].score >= limit {
            let tmp = moves[p];
            moves[p] = moves[sorted_end];
            let mut q = sorted_end;
            while q > 0 && moves[q - 1].score < tmp.score {
                moves[q] = moves[q - 1];
                q -= 1;
            }
            moves[q] = tmp;
            sorted_end += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::history::ContinuationHistory;
    use std::collections::HashSet;

    const NO_CONT: ContLookback = [ContinuationHistory::SENTINEL; 5];

    fn drain(mut mp: MovePicker, pos: &Position, h: &Histories) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(m) = mp.next_move(pos, h, false) { out.push(m); }
        out
    }

    #[test]
    fn main_picker_yields_every_legal_move_once() {
        let pos = Position::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 2 3").unwrap();
        let h = Histories::default();
        let tt = pos.parse_uci_move("f3e5").ok();
        let killer = pos.parse_uci_move("d2d3").ok();
        let mp = MovePicker::new_main(&pos, tt, 5, [killer, killer], None, NO_CONT);
        let got = drain(mp, &pos, &h);
        assert_eq!(got[0], tt.unwrap(), "tt move first");
        let set: HashSet<String> = got.iter().map(|m| m.to_string()).collect();
        assert_eq!(set.len(), got.len(), "duplicate moves yielded");
        assert_eq!(got.len(), pos.legal_moves_count());
    }

    #[test]
    fn qsearch_picker_only_captures_below_check_depth() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/R3K3 w - - 0 1").unwrap();
        let h = Histories::default();
        let got = drain(MovePicker::new_qsearch(&pos, None, -1, NO_CONT), &pos, &h);
        assert_eq!(got.len(), 1);
        assert!(pos.is_capture(got[0]));
        let with_checks = drain(MovePicker::new_qsearch(&pos, None, DEPTH_QS_CHECKS, NO_CONT), &pos, &h);
        assert!(with_checks.len() > 1, "expected quiet checks such as Ra8+");
    }

    #[test]
    fn illegal_tt_move_is_ignored() {
        let pos = Position::startpos();
        let h = Histories::default();
        let bogus = Some(Move { from: cozy_chess::Square::E2, to: cozy_chess::Square::E5, promotion: None });
        let got = drain(MovePicker::new_main(&pos, bogus, 3, [None, None], None, NO_CONT), &pos, &h);
        assert_eq!(got.len(), 20);
    }
}
