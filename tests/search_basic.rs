mod common;

use pvsearch::board::Position;
use pvsearch::search::Limits;

#[test]
fn startpos_node_limited_search_returns_legal_move() {
    let pool = common::pool(1);
    let pos = Position::startpos();
    let out = pool.search(&pos, Limits::nodes(100_000)).expect("search");
    let best = out.best_move.expect("no best move");
    assert!(pos.is_legal(best), "illegal best move {best:?}");
    assert!(out.score.abs() < 400, "startpos score too far from equal: {}", out.score);
    assert!(out.depth >= 4, "expected some depth from 100k nodes, got {}", out.depth);
    // Node limit is checked in batches, so allow a small overshoot
    assert!(out.nodes < 110_000, "node limit overshot: {}", out.nodes);
}

#[test]
fn single_thread_search_is_deterministic() {
    let pos = Position::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3").unwrap();
    let a = common::pool(1).search(&pos, Limits::depth(7)).unwrap();
    let b = common::pool(1).search(&pos, Limits::depth(7)).unwrap();
    assert_eq!(a.best_move, b.best_move);
    assert_eq!(a.score, b.score);
    assert_eq!(a.nodes, b.nodes, "node counts differ between identical runs");
}

#[test]
fn search_prefers_winning_queen_capture() {
    let pos = Position::from_fen("k7/8/8/8/8/8/3qQ3/7K w - - 0 1").unwrap();
    let out = common::pool(1).search(&pos, Limits::depth(4)).unwrap();
    assert_eq!(out.best_uci.as_deref(), Some("e2d2"), "expected Qxd2, got {:?}", out.best_uci);
    assert!(out.score > 1000, "winning a queen should score high: {}", out.score);
}

#[test]
fn depth_limit_is_respected_and_pv_starts_with_best_move() {
    let pos = Position::startpos();
    let out = common::pool(1).search(&pos, Limits::depth(5)).unwrap();
    assert_eq!(out.depth, 5);
    assert_eq!(out.pv.first().copied(), out.best_move);
}

#[test]
fn clear_resets_learned_state_for_reproducible_results() {
    let mut pool = common::pool(1);
    let pos = Position::startpos();
    let first = pool.search(&pos, Limits::depth(6)).unwrap();
    pool.clear().unwrap();
    let again = pool.search(&pos, Limits::depth(6)).unwrap();
    assert_eq!(first.nodes, again.nodes, "cleared pool should repeat the same search");
    assert_eq!(first.best_move, again.best_move);
}

#[test]
fn searchmoves_restricts_root() {
    let pos = Position::startpos();
    let mut limits = Limits::depth(4);
    limits.searchmoves = vec![pos.parse_uci_move("a2a3").unwrap()];
    let out = common::pool(1).search(&pos, limits).unwrap();
    assert_eq!(out.best_uci.as_deref(), Some("a2a3"));
}

#[test]
fn illegal_searchmoves_fall_back_to_all_moves() {
    let pos = Position::startpos();
    let other = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let mut limits = Limits::depth(3);
    // Legal in the other position only
    limits.searchmoves = vec![other.parse_uci_move("h1h8").unwrap()];
    let out = common::pool(1).search(&pos, limits).unwrap();
    let best = out.best_move.expect("fallback should still find a move");
    assert!(pos.is_legal(best));
}
