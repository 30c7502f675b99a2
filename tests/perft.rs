mod common;

use cozy_chess::Board;
use pvsearch::board::Position;
use pvsearch::perft::{divide, perft};
use pretty_assertions::assert_eq;
use pvsearch::search::Limits;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

#[test]
fn kiwipete_perft() {
    let b = Board::from_fen(KIWIPETE, false).unwrap();
    assert_eq!(perft(&b, 1), 48);
    assert_eq!(perft(&b, 2), 2039);
    assert_eq!(perft(&b, 3), 97862);
}

#[test]
fn divide_uses_standard_castling_notation() {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let d = divide(&pos, 1);
    let names: Vec<&str> = d.iter().map(|(m, _)| m.as_str()).collect();
    assert!(names.contains(&"e1g1"), "missing short castle in {names:?}");
    assert!(names.contains(&"e1c1"), "missing long castle in {names:?}");
}

#[test]
fn go_perft_reports_through_listener() {
    let (pool, rec) = common::recording_pool(2);
    let pos = Position::startpos();
    let limits = Limits { perft: 3, ..Limits::default() };
    let out = pool.search(&pos, limits).unwrap();
    assert_eq!(out.nodes, 8902);
    let (div, total) = rec.perft.lock().unwrap().clone().expect("perft output");
    assert_eq!(total, 8902);
    assert_eq!(div.len(), 20);
    assert!(out.best_move.is_none(), "perft does not produce a best move");
}
