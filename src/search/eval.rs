use crate::board::cozy::{piece_value, Position};
use crate::search::value::{Value, VALUE_TB_LOSS_IN_MAX_PLY, VALUE_TB_WIN_IN_MAX_PLY};
use cozy_chess::{Color, Piece};

// Piece-square tables in centipawns from White's point of view, rank 8 first.
#[rustfmt::skip]
const PST: [[i32; 64]; 6] = [
    // Pawn
    [ 0,  0,  0,  0,  0,  0,  0,  0,
     50, 50, 50, 50, 50, 50, 50, 50,
     10, 10, 20, 30, 30, 20, 10, 10,
      5,  5, 10, 25, 25, 10,  5,  5,
      0,  0,  0, 20, 20,  0,  0,  0,
      5, -5,-10,  0,  0,-10, -5,  5,
      5, 10, 10,-20,-20, 10, 10,  5,
      0,  0,  0,  0,  0,  0,  0,  0],
    // Knight
    [-50,-40,-30,-30,-30,-30,-40,-50,
     -40,-20,  0,  0,  0,  0,-20,-40,
     -30,  0, 10, 15, 15, 10,  0,-30,
     -30,  5, 15, 20, 20, 15,  5,-30,
     -30,  0, 15, 20, 20, 15,  0,-30,
     -30,  5, 10, 15, 15, 10,  5,-30,
     -40,-20,  0,  5,  5,  0,-20,-40,
     -50,-40,-30,-30,-30,-30,-40,-50],
    // Bishop
    [-20,-10,-10,-10,-10,-10,-10,-20,
     -10,  0,  0,  0,  0,  0,  0,-10,
     -10,  0,  5, 10, 10,  5,  0,-10,
     -10,  5,  5, 10, 10,  5,  5,-10,
     -10,  0, 10, 10, 10, 10,  0,-10,
     -10, 10, 10, 10, 10, 10, 10,-10,
     -10,  5,  0,  0,  0,  0,  5,-10,
     -20,-10,-10,-10,-10,-10,-10,-20],
    // Rook
    [ 0,  0,  0,  0,  0,  0,  0,  0,
      5, 10, 10, 10, 10, 10, 10,  5,
     -5,  0,  0,  0,  0,  0,  0, -5,
     -5,  0,  0,  0,  0,  0,  0, -5,
     -5,  0,  0,  0,  0,  0,  0, -5,
     -5,  0,  0,  0,  0,  0,  0, -5,
     -5,  0,  0,  0,  0,  0,  0, -5,
      0,  0,  0,  5,  5,  0,  0,  0],
    // Queen
    [-20,-10,-10, -5, -5,-10,-10,-20,
     -10,  0,  0,  0,  0,  0,  0,-10,
     -10,  0,  5,  5,  5,  5,  0,-10,
      -5,  0,  5,  5,  5,  5,  0, -5,
       0,  0,  5,  5,  5,  5,  0, -5,
     -10,  5,  5,  5,  5,  5,  0,-10,
     -10,  0,  5,  0,  0,  0,  0,-10,
     -20,-10,-10, -5, -5,-10,-10,-20],
    // King (middlegame)
    [-30,-40,-40,-50,-50,-40,-40,-30,
     -30,-40,-40,-50,-50,-40,-40,-30,
     -30,-40,-40,-50,-50,-40,-40,-30,
     -30,-40,-40,-50,-50,-40,-40,-30,
     -20,-30,-30,-40,-40,-30,-30,-20,
     -10,-20,-20,-20,-20,-20,-20,-10,
      20, 20,  0,  0,  0,  0, 20, 20,
      20, 30, 10,  0,  0, 10, 30, 20],
];

// King table once the heavy pieces are gone.
#[rustfmt::skip]
const KING_END: [i32; 64] = [
    -50,-40,-30,-20,-20,-30,-40,-50,
    -30,-20,-10,  0,  0,-10,-20,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-30,  0,  0,  0,  0,-30,-30,
    -50,-30,-30,-30,-30,-30,-30,-50,
];

const PHASE_MAX: i32 = 2 * (2 * 781 + 2 * 825 + 2 * 1276 + 2538);

/// Material and piece-square balance from White's point of view, in
/// internal units (a pawn is 208).
pub fn eval_white(pos: &Position) -> Value {
    let b = pos.board();
    let phase = (pos.non_pawn_material(Color::White) + pos.non_pawn_material(Color::Black)).min(PHASE_MAX);
    let mut score = 0;
    for color in [Color::White, Color::Black] {
        let sign = if color == Color::White { 1 } else { -1 };
        for piece in Piece::ALL {
            for sq in b.colored_pieces(color, piece) {
                let idx = if color == Color::White { sq as usize ^ 56 } else { sq as usize };
                let pst = if piece == Piece::King {
                    (PST[5][idx] * phase + KING_END[idx] * (PHASE_MAX - phase)) / PHASE_MAX
                } else {
                    PST[piece as usize][idx]
                };
                score += sign * (piece_value(piece) + pst * 2);
            }
        }
    }
    score
}

/// Static evaluation from the side to move's point of view. `optimism` is
/// the root side's bias, scaled in with the amount of material left.
pub fn evaluate(pos: &Position, optimism: Value) -> Value {
    let stm = pos.side_to_move();
    let base = if stm == Color::White { eval_white(pos) } else { -eval_white(pos) };
    let npm = pos.non_pawn_material(Color::White) + pos.non_pawn_material(Color::Black);
    let mut v = base + optimism * (npm + 2000) / (PHASE_MAX + 2000);
    // Damp towards a draw as the fifty-move counter runs
    v = v * (200 - pos.rule50()) / 214;
    v.clamp(VALUE_TB_LOSS_IN_MAX_PLY + 1, VALUE_TB_WIN_IN_MAX_PLY - 1)
}

pub fn eval_cp(pos: &Position) -> i32 { crate::search::value::to_cp(evaluate(pos, 0)) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_is_balanced() {
        assert_eq!(evaluate(&Position::startpos(), 0), 0);
    }

    #[test]
    fn colour_flip_is_symmetric() {
        let w = Position::from_fen("4k3/8/8/8/8/2N5/PPP5/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("4k3/ppp5/2n5/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(evaluate(&w, 0), evaluate(&b, 0));
        assert!(evaluate(&w, 0) > 0);
    }
}
