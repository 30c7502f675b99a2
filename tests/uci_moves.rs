mod common;

use pretty_assertions::assert_eq;
use pvsearch::board::Position;
use pvsearch::search::SilentListener;
use pvsearch::uci::UciEngine;
use std::sync::Arc;
use std::time::Duration;

fn engine() -> UciEngine {
    UciEngine::with_listener(common::options(1), Arc::new(SilentListener)).unwrap()
}

#[test]
fn position_startpos_with_moves() {
    let mut e = engine();
    assert!(e.handle_command("position startpos moves e2e4 e7e5 g1f3"));
    assert_eq!(e.position().fen(), "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2");
}

#[test]
fn position_fen_with_castling_move() {
    let mut e = engine();
    e.handle_command("position fen r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1 moves e1g1 e8c8");
    assert_eq!(e.position().fen(), "2kr3r/8/8/8/8/8/8/R4RK1 w - - 2 2");
}

#[test]
fn bad_move_leaves_position_unchanged() {
    let mut e = engine();
    e.handle_command("position startpos moves e2e4");
    let before = e.position().fen();
    e.handle_command("position startpos moves e2e5");
    assert_eq!(e.position().fen(), before);
}

#[test]
fn castling_round_trips_through_uci() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    for uci in ["e1g1", "e1c1"] {
        let mv = pos.parse_uci_move(uci).unwrap();
        assert_eq!(pos.move_to_uci(mv), uci);
    }
}

#[test]
fn go_parses_clock_and_searchmoves() {
    let e = engine();
    let (l, ponder) = e.parse_go("wtime 60000 btime 50000 winc 1000 binc 500 movestogo 20 searchmoves e2e4 d2d4 ponder");
    assert!(ponder);
    assert_eq!(l.time, [Duration::from_millis(60000), Duration::from_millis(50000)]);
    assert_eq!(l.inc, [Duration::from_millis(1000), Duration::from_millis(500)]);
    assert_eq!(l.movestogo, 20);
    assert_eq!(l.searchmoves.len(), 2);
    assert!(l.use_time_management());
}

#[test]
fn go_depth_then_quit() {
    let mut e = engine();
    e.handle_command("position startpos");
    e.handle_command("go depth 3");
    e.pool().wait_for_search_finished();
    let out = e.pool().last_outcome().unwrap();
    assert!(out.best_uci.is_some());
    assert!(!e.handle_command("quit"));
}

#[test]
fn setoption_changes_pool() {
    let mut e = engine();
    e.handle_command("setoption name Threads value 2");
    e.handle_command("setoption name MultiPV value 3");
    e.handle_command("setoption name Clear Hash");
    assert_eq!(e.pool().size(), 2);
    assert_eq!(e.pool().options().multi_pv, 3);
    // Rejected values are ignored
    e.handle_command("setoption name Threads value 0");
    assert_eq!(e.pool().size(), 2);
}
