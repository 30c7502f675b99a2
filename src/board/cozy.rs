use crate::error::{EngineError, Result};
use crate::search::see;
use crate::search::value::Value;
use crate::search::zobrist;
use cozy_chess::{Board as CozyBoard, Color, File, Move, Piece, Square};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// Piece values used for material bookkeeping, pruning margins and SEE.
pub const PIECE_VALUES: [Value; 6] = [208, 781, 825, 1276, 2538, 0];

#[inline]
pub fn piece_value(p: Piece) -> Value { PIECE_VALUES[p as usize] }

#[derive(Clone, Debug)]
struct Undo {
    board: CozyBoard,
    plies_from_null: i32,
    captured: Option<Piece>,
}

/// A board plus the chain of states needed to undo moves and detect
/// repetitions. All search threads own a private copy.
#[derive(Clone, Debug)]
pub struct Position {
    board: CozyBoard,
    undo: Vec<Undo>,
    // Keys of every position preceding the current one, oldest first.
    keys: Vec<u64>,
    plies_from_null: i32,
    captured: Option<Piece>,
}

impl Default for Position {
    fn default() -> Self { Self::startpos() }
}

impl Position {
    pub fn startpos() -> Self { Self::from_board(CozyBoard::default()) }

    pub fn from_board(board: CozyBoard) -> Self {
        Self { board, undo: Vec::with_capacity(256), keys: Vec::with_capacity(512), plies_from_null: 0, captured: None }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        CozyBoard::from_fen(fen.trim(), false)
            .map(Self::from_board)
            .map_err(|e| EngineError::InvalidFen { fen: fen.to_string(), reason: format!("{e:?}") })
    }

    pub fn board(&self) -> &CozyBoard { &self.board }
    pub fn fen(&self) -> String { format!("{}", self.board) }
    pub fn side_to_move(&self) -> Color { self.board.side_to_move() }
    pub fn key(&self) -> u64 { self.board.hash() }
    pub fn pawn_key(&self) -> u64 { zobrist::pawn_key(&self.board) }
    pub fn in_check(&self) -> bool { !self.board.checkers().is_empty() }
    pub fn rule50(&self) -> i32 { self.board.halfmove_clock() as i32 }
    pub fn game_ply(&self) -> i32 {
        (self.board.fullmove_number() as i32 - 1).max(0) * 2 + (self.side_to_move() == Color::Black) as i32
    }
    pub fn piece_on(&self, sq: Square) -> Option<Piece> { self.board.piece_on(sq) }
    pub fn color_on(&self, sq: Square) -> Option<Color> { self.board.color_on(sq) }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut out = Vec::with_capacity(64);
        self.board.generate_moves(|ml| { out.extend(ml); false });
        out
    }

    pub fn legal_moves_count(&self) -> usize {
        let mut ct = 0usize;
        self.board.generate_moves(|ml| { ct += ml.len(); false });
        ct
    }

    pub fn has_legal_moves(&self) -> bool { self.board.generate_moves(|ml| !ml.is_empty()) }

    pub fn is_legal(&self, mv: Move) -> bool { self.board.is_legal(mv) }

    pub fn moved_piece(&self, mv: Move) -> Piece { self.board.piece_on(mv.from).unwrap_or(Piece::Pawn) }

    fn is_en_passant(&self, mv: Move) -> bool {
        self.board.piece_on(mv.from) == Some(Piece::Pawn)
            && mv.from.file() != mv.to.file()
            && self.board.piece_on(mv.to).is_none()
    }

    // Castling is encoded as the king capturing its own rook, so a plain
    // occupancy test is not enough.
    pub fn is_capture(&self, mv: Move) -> bool {
        self.board.color_on(mv.to) == Some(!self.side_to_move()) || self.is_en_passant(mv)
    }

    /// Captures and queen promotions: the moves ordered and searched by the
    /// capture stages of the move picker.
    pub fn is_capture_stage(&self, mv: Move) -> bool {
        self.is_capture(mv) || mv.promotion == Some(Piece::Queen)
    }

    pub fn captured_piece(&self, mv: Move) -> Option<Piece> {
        if self.is_en_passant(mv) { return Some(Piece::Pawn); }
        if self.board.color_on(mv.to) == Some(!self.side_to_move()) { self.board.piece_on(mv.to) } else { None }
    }

    pub fn gives_check(&self, mv: Move) -> bool {
        let mut b = self.board.clone();
        b.play_unchecked(mv);
        !b.checkers().is_empty()
    }

    pub fn non_pawn_material(&self, c: Color) -> Value {
        [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
            .iter()
            .map(|&p| self.board.colored_pieces(c, p).len() as Value * piece_value(p))
            .sum()
    }

    pub fn see_ge(&self, mv: Move, threshold: Value) -> bool { see::see_ge(&self.board, mv, threshold) }

    /// Piece captured by the move that led to this position.
    pub fn last_captured(&self) -> Option<Piece> { self.captured }

    pub fn do_move(&mut self, mv: Move) {
        let captured = self.captured_piece(mv);
        self.keys.push(self.key());
        self.undo.push(Undo { board: self.board.clone(), plies_from_null: self.plies_from_null, captured: self.captured });
        self.board.play_unchecked(mv);
        self.plies_from_null += 1;
        self.captured = captured;
    }

    /// Passes the turn. Returns false (and leaves the position untouched)
    /// when the side to move is in check.
    pub fn do_null_move(&mut self) -> bool {
        let Some(next) = self.board.null_move() else { return false };
        self.keys.push(self.key());
        let prev = std::mem::replace(&mut self.board, next);
        self.undo.push(Undo { board: prev, plies_from_null: self.plies_from_null, captured: self.captured });
        self.plies_from_null = 0;
        self.captured = None;
        true
    }

    pub fn undo_move(&mut self) {
        if let Some(u) = self.undo.pop() {
            self.board = u.board;
            self.plies_from_null = u.plies_from_null;
            self.captured = u.captured;
            self.keys.pop();
        }
    }

    /// Drops the undo chain while keeping the keys needed for repetition
    /// detection. Used when a position is snapshotted for a new search.
    pub fn forget_undo(&mut self) { self.undo.clear(); }

    /// True if the current position repeats an earlier one. A single
    /// repetition counts when the earlier occurrence lies inside the search
    /// tree (closer than `ply`); otherwise a threefold is required.
    pub fn is_repetition(&self, ply: i32) -> bool {
        let end = self.rule50().min(self.plies_from_null) as usize;
        let n = self.keys.len();
        let cur = self.key();
        let mut count = 0;
        let mut i = 4;
        while i <= end && i <= n {
            if self.keys[n - i] == cur {
                count += 1;
                if (i as i32) < ply || count >= 2 { return true; }
            }
            i += 2;
        }
        false
    }

    pub fn has_insufficient_material(&self) -> bool {
        let b = &self.board;
        let heavy = b.pieces(Piece::Pawn) | b.pieces(Piece::Rook) | b.pieces(Piece::Queen);
        if !heavy.is_empty() { return false; }
        (b.pieces(Piece::Knight) | b.pieces(Piece::Bishop)).len() <= 1
    }

    /// Fifty-move rule, repetition and dead positions. A fifty-move draw
    /// does not apply if the side to move is checkmated.
    pub fn is_draw(&self, ply: i32) -> bool {
        if self.rule50() >= 100 && (!self.in_check() || self.has_legal_moves()) { return true; }
        self.is_repetition(ply) || self.has_insufficient_material()
    }

    pub fn move_to_uci(&self, mv: Move) -> String {
        if self.board.piece_on(mv.from) == Some(Piece::King) && self.board.color_on(mv.to) == Some(self.side_to_move()) {
            let file = if (mv.to.file() as usize) > (mv.from.file() as usize) { File::G } else { File::C };
            let to = Square::new(file, mv.from.rank());
            return format!("{}{}", mv.from, to);
        }
        format!("{}", mv)
    }

    pub fn parse_uci_move(&self, uci: &str) -> Result<Move> {
        self.legal_moves()
            .into_iter()
            .find(|&m| self.move_to_uci(m) == uci)
            .ok_or_else(|| EngineError::IllegalMove(uci.to_string()))
    }

    pub fn make_move_uci(&mut self, uci: &str) -> Result<()> {
        let mv = self.parse_uci_move(uci)?;
        self.do_move(mv);
        Ok(())
    }
}
