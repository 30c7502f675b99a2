use pvsearch::board::Position;

fn see(fen: &str, uci: &str, threshold: i32) -> bool {
    let pos = Position::from_fen(fen).unwrap();
    let mv = pos.parse_uci_move(uci).unwrap();
    pos.see_ge(mv, threshold)
}

#[test]
fn pawn_takes_defended_knight_wins_material() {
    let fen = "4k3/8/3p4/4n3/3P4/8/8/4K3 w - - 0 1";
    assert!(see(fen, "d4e5", 0));
    assert!(see(fen, "d4e5", 500));
    assert!(!see(fen, "d4e5", 900));
}

#[test]
fn queen_takes_defended_pawn_loses() {
    let fen = "4k3/8/3p4/4p3/8/8/4Q3/4K3 w - - 0 1";
    assert!(!see(fen, "e2e5", 0));
    assert!(see(fen, "e2e5", -3000));
}

#[test]
fn xray_recapture_counts() {
    // Rook backed by a second rook wins the exchange on e5
    let fen = "4k3/4r3/8/4p3/8/8/4R3/4R1K1 w - - 0 1";
    assert!(see(fen, "e2e5", 0));
}

#[test]
fn castling_is_even() {
    let fen = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";
    assert!(see(fen, "e1g1", 0));
    assert!(!see(fen, "e1g1", 1));
}
