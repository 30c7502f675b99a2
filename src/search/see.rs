use crate::board::cozy::piece_value;
use crate::search::value::Value;
use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves, BitBoard, Board, Color,
    Move, Piece, Square,
};

fn attackers_to(board: &Board, sq: Square, occupied: BitBoard) -> BitBoard {
    let bishops = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let rooks = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    (get_pawn_attacks(sq, Color::White) & board.colored_pieces(Color::Black, Piece::Pawn))
        | (get_pawn_attacks(sq, Color::Black) & board.colored_pieces(Color::White, Piece::Pawn))
        | (get_knight_moves(sq) & board.pieces(Piece::Knight))
        | (get_king_moves(sq) & board.pieces(Piece::King))
        | (get_bishop_moves(sq, occupied) & bishops)
        | (get_rook_moves(sq, occupied) & rooks)
}

fn lsb(bb: BitBoard) -> BitBoard {
    bb.into_iter().next().map(|s| s.bitboard()).unwrap_or(BitBoard::EMPTY)
}

/// Static exchange evaluation: does `mv` win at least `threshold` after the
/// full sequence of recaptures on the target square, each side always
/// recapturing with its least valuable attacker? Castling, promotions and
/// en passant are scored as an even exchange.
pub fn see_ge(board: &Board, mv: Move, threshold: Value) -> bool {
    let stm0 = board.side_to_move();
    let (from, to) = (mv.from, mv.to);
    let castling = board.color_on(to) == Some(stm0);
    let en_passant = board.piece_on(from) == Some(Piece::Pawn) && from.file() != to.file() && board.piece_on(to).is_none();
    if castling || en_passant || mv.promotion.is_some() {
        return 0 >= threshold;
    }

    let mut swap = board.piece_on(to).map_or(0, piece_value) - threshold;
    if swap < 0 { return false; }

    swap = board.piece_on(from).map_or(0, piece_value) - swap;
    if swap <= 0 { return true; }

    let mut occupied = board.occupied() ^ from.bitboard() ^ to.bitboard();
    let mut stm = stm0;
    let mut attackers = attackers_to(board, to, occupied);
    let bishops = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let rooks = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    let mut res = 1;

    loop {
        stm = !stm;
        attackers &= occupied;
        let stm_attackers = attackers & board.colors(stm);
        if stm_attackers.is_empty() { break; }
        res ^= 1;

        let mut next = None;
        for p in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            let bb = stm_attackers & board.pieces(p);
            if !bb.is_empty() { next = Some((p, bb)); break; }
        }
        let Some((piece, bb)) = next else {
            // Only the king is left: it may capture unless the square is still defended.
            return if (attackers & !board.colors(stm)).is_empty() { res == 1 } else { res == 0 };
        };

        swap = piece_value(piece) - swap;
        if swap < res { break; }
        occupied ^= lsb(bb);
        match piece {
            Piece::Pawn | Piece::Bishop => attackers |= get_bishop_moves(to, occupied) & bishops,
            Piece::Rook => attackers |= get_rook_moves(to, occupied) & rooks,
            Piece::Queen => {
                attackers |= (get_bishop_moves(to, occupied) & bishops) | (get_rook_moves(to, occupied) & rooks)
            }
            _ => {}
        }
    }

    res == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    fn mv(pos: &Position, s: &str) -> Move { pos.parse_uci_move(s).unwrap() }

    #[test]
    fn see_wins_hanging_queen() {
        let pos = Position::from_fen("4k3/8/8/8/5Q2/8/8/2b4K b - - 0 1").unwrap();
        let m = mv(&pos, "c1f4");
        assert!(pos.see_ge(m, 2000));
        assert!(!pos.see_ge(m, 3000));
    }

    #[test]
    fn see_rejects_defended_pawn_grab_by_queen() {
        // Qxd5 exd5 loses the queen for a pawn
        let pos = Position::from_fen("4k3/8/4p3/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let m = mv(&pos, "d1d5");
        assert!(!pos.see_ge(m, 0));
        assert!(pos.see_ge(m, -3000));
    }

    #[test]
    fn see_quiet_move_to_attacked_square() {
        // Nc3-b5 walks into the a6 pawn
        let pos = Position::from_fen("4k3/8/p7/8/8/2N5/8/4K3 w - - 0 1").unwrap();
        let m = mv(&pos, "c3b5");
        assert!(!pos.see_ge(m, 0));
        assert!(pos.see_ge(mv(&pos, "c3e4"), 0));
    }
}
