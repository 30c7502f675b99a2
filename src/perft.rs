use crate::board::Position;
use cozy_chess::Board;
use rayon::prelude::*;

/// Counts leaf nodes of the legal move tree. The last ply is bulk counted.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 { return 1; }
    let mut nodes = 0u64;
    board.generate_moves(|moves| {
        if depth == 1 {
            nodes += moves.len() as u64;
        } else {
            for m in moves {
                let mut child = board.clone();
                child.play_unchecked(m);
                nodes += perft(&child, depth - 1);
            }
        }
        false
    });
    nodes
}

/// Per-root-move node counts, split across the rayon pool. Moves are in
/// protocol notation and keep generation order.
pub fn divide(pos: &Position, depth: u32) -> Vec<(String, u64)> {
    let depth = depth.max(1);
    pos.legal_moves()
        .par_iter()
        .map(|&m| {
            let mut child = pos.board().clone();
            child.play_unchecked(m);
            (pos.move_to_uci(m), perft(&child, depth - 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_counts() {
        let b = Board::default();
        assert_eq!(perft(&b, 1), 20);
        assert_eq!(perft(&b, 2), 400);
        assert_eq!(perft(&b, 3), 8902);
    }

    #[test]
    fn divide_sums_to_perft() {
        let pos = Position::startpos();
        let d = divide(&pos, 3);
        assert_eq!(d.len(), 20);
        assert_eq!(d.iter().map(|(_, n)| n).sum::<u64>(), 8902);
    }
}
