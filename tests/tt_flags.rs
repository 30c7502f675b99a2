mod common;

use pvsearch::board::Position;
use pvsearch::options::EngineOptions;
use pvsearch::search::tt::{Bound, TranspositionTable};
use pvsearch::search::value::{value_from_tt, value_to_tt, mate_in, Depth, Value, DEPTH_NONE, VALUE_INFINITE, VALUE_NONE};
use pvsearch::search::worker::{SearchSignals, Worker};
use pvsearch::search::Limits;
use std::sync::Arc;

const TWO_KNIGHTS: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

// Each search gets an empty table and fresh histories
fn fresh_search(pos: &Position, alpha: Value, beta: Value, depth: Depth) -> (Value, Arc<TranspositionTable>) {
    let tt = Arc::new(TranspositionTable::new(8));
    let mut w = Worker::new(0, 1, Arc::clone(&tt), Arc::new(SearchSignals::default()), &EngineOptions::default());
    (w.search_value(pos, alpha, beta, depth), tt)
}

#[test]
fn fail_high_is_a_lower_bound_of_the_open_window_value() {
    let pos = Position::from_fen(TWO_KNIGHTS).unwrap();
    let (exact, _) = fresh_search(&pos, -VALUE_INFINITE, VALUE_INFINITE, 5);
    assert!(exact.abs() < 1000, "unexpected open-window value {exact}");

    let beta = exact - 60;
    let (v, tt) = fresh_search(&pos, beta - 1, beta, 5);
    assert!(v >= beta, "window below the value must fail high: {v} < {beta}");
    assert!(v <= exact, "lower bound {v} exceeds the open-window value {exact}");

    let e = tt.probe(pos.key()).expect("root entry missing");
    assert_eq!(e.bound, Bound::Lower);
    assert!(e.value >= beta);
}

#[test]
fn fail_low_is_an_upper_bound_of_the_open_window_value() {
    let pos = Position::from_fen(TWO_KNIGHTS).unwrap();
    let (exact, _) = fresh_search(&pos, -VALUE_INFINITE, VALUE_INFINITE, 5);

    let alpha = exact + 60;
    let (v, tt) = fresh_search(&pos, alpha, alpha + 1, 5);
    assert!(v <= alpha, "window above the value must fail low: {v} > {alpha}");
    assert!(v >= exact, "upper bound {v} is below the open-window value {exact}");

    let e = tt.probe(pos.key()).expect("root entry missing");
    assert_eq!(e.bound, Bound::Upper);
    assert!(e.value <= alpha);
}

#[test]
fn root_entry_is_exact_after_search() {
    let pool = common::pool(1);
    let pos = Position::startpos();
    let out = pool.search(&pos, Limits::depth(5)).unwrap();
    let e = pool.tt().probe(pos.key()).expect("root entry missing");
    assert_eq!(e.bound, Bound::Exact, "expected exact bound at the root");
    assert!(e.depth >= 1, "stored depth {}", e.depth);
    assert_eq!(e.mv, out.best_move);
    assert!(e.is_pv);
}

#[test]
fn shallow_store_does_not_replace_deep_entry() {
    let tt = TranspositionTable::new(1);
    let key = 0x1234_5678_9abc_def0;
    tt.store(key, 50, false, Bound::Lower, 12, None, 40);
    tt.store(key, -20, false, Bound::Upper, 2, None, 40);
    let e = tt.probe(key).unwrap();
    assert_eq!(e.depth, 12);
    assert_eq!(e.value, 50);
    assert_eq!(e.bound, Bound::Lower);
}

#[test]
fn exact_bound_always_replaces() {
    let tt = TranspositionTable::new(1);
    let key = 42;
    tt.store(key, 50, false, Bound::Lower, 12, None, 40);
    tt.store(key, 7, true, Bound::Exact, 1, None, 40);
    let e = tt.probe(key).unwrap();
    assert_eq!((e.value, e.bound, e.depth, e.is_pv), (7, Bound::Exact, 1, true));
}

#[test]
fn eval_only_entry_round_trips() {
    let tt = TranspositionTable::new(1);
    tt.store(99, VALUE_NONE, false, Bound::None, DEPTH_NONE, None, 123);
    let e = tt.probe(99).unwrap();
    assert_eq!(e.eval, 123);
    assert_eq!(e.depth, DEPTH_NONE);
    assert_eq!(e.bound, Bound::None);
}

#[test]
fn new_search_ages_entries_and_hashfull_counts_current_only() {
    let tt = TranspositionTable::new(1);
    for k in 0..20_000u64 {
        tt.store(k.wrapping_mul(0x9E37_79B9_7F4A_7C15), 0, false, Bound::Exact, 5, None, 0);
    }
    assert!(tt.hashfull() > 0);
    tt.new_search();
    assert_eq!(tt.hashfull(), 0, "entries of an older generation are not counted");
    tt.clear();
    assert!(tt.probe(0).is_none());
}

#[test]
fn mate_scores_are_stored_relative_to_node() {
    let v = mate_in(7);
    let stored = value_to_tt(v, 3);
    assert_eq!(value_from_tt(stored, 3, 0), v);
    assert_eq!(value_from_tt(stored, 5, 0), mate_in(9));
}
