use cozy_chess::{Board, Color, Piece};
use std::sync::OnceLock;

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// [color][square] keys for pawns
static PAWN_TABLE: OnceLock<[[u64; 64]; 2]> = OnceLock::new();

fn pawn_table() -> &'static [[u64; 64]; 2] {
    PAWN_TABLE.get_or_init(|| {
        let mut t = [[0u64; 64]; 2];
        let mut seed = 0xF00D_F00D_DEAD_BEEF;
        for side in &mut t {
            for v in side.iter_mut() {
                seed = splitmix64(seed);
                *v = seed;
            }
        }
        t
    })
}

/// Key of the pawn structure alone; indexes the pawn and correction
/// history tables.
pub fn pawn_key(board: &Board) -> u64 {
    let table = pawn_table();
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        for sq in board.colored_pieces(color, Piece::Pawn) {
            key ^= table[color as usize][sq as usize];
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pawn_key_ignores_pieces() {
        let a = Board::from_fen("4k3/pppp4/8/8/8/8/4PPPP/4K3 w - - 0 1", false).unwrap();
        let b = Board::from_fen("3qk3/pppp4/8/8/8/2N5/4PPPP/4K3 w - - 0 1", false).unwrap();
        let c = Board::from_fen("4k3/ppp5/3p4/8/8/8/4PPPP/4K3 w - - 0 1", false).unwrap();
        assert_eq!(pawn_key(&a), pawn_key(&b));
        assert_ne!(pawn_key(&a), pawn_key(&c));
    }
}
