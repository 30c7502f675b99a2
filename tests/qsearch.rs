use pvsearch::board::Position;
use pvsearch::options::EngineOptions;
use pvsearch::search::eval::evaluate;
use pvsearch::search::tt::TranspositionTable;
use pvsearch::search::value::{MAX_PLY, VALUE_INFINITE};
use pvsearch::search::worker::{SearchSignals, Worker};
use std::sync::Arc;

fn worker() -> Worker {
    let tt = Arc::new(TranspositionTable::new(4));
    Worker::new(0, 1, tt, Arc::new(SearchSignals::default()), &EngineOptions::default())
}

#[test]
fn quiet_position_equals_stand_pat() {
    let pos = Position::startpos();
    let v = worker().qsearch_value(&pos);
    assert_eq!(v, evaluate(&pos, 0), "no captures or checks at startpos, qsearch must stand pat");
}

#[test]
fn hanging_queen_is_captured() {
    let pos = Position::from_fen("k7/8/8/8/8/8/3qQ3/7K w - - 0 1").unwrap();
    let v = worker().qsearch_value(&pos);
    assert!(v > 1500, "qsearch should see Qxd2: {v}");
}

#[test]
fn terminates_in_capture_heavy_position() {
    // Many mutual captures available; the search must bottom out
    let pos = Position::from_fen("r1b1k2r/ppppqppp/2n2n2/2b1p3/2BPP3/2N2N2/PPP2PPP/R1BQK2R w KQkq - 0 1").unwrap();
    let mut w = worker();
    let v = w.qsearch_value(&pos);
    assert!(v.abs() < 2000, "unexpected qsearch score {v}");
    assert!(w.stats().nodes.load(std::sync::atomic::Ordering::Relaxed) < 1_000_000);
}

#[test]
fn in_check_with_no_evasion_is_mate() {
    let pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").unwrap();
    let v = worker().qsearch_value(&pos);
    assert_eq!(v, pvsearch::search::value::mated_in(0));
}

#[test]
fn check_heavy_positions_stay_under_ply_cap() {
    // Both queens of each side can capture with check, and quiet checks abound
    for fen in [
        "4k3/3q1q2/8/8/8/8/3Q1Q2/4K3 w - - 0 1",
        "7k/6pp/6Q1/8/8/8/PP6/K6q w - - 0 1",
        "r3k2r/1b1q1ppp/p1n5/1p1Qp3/4P3/1BN5/PPP2PPP/R3K2R w KQkq - 0 1",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        let mut w = worker();
        let v = w.qsearch_value(&pos);
        assert!(v.abs() < VALUE_INFINITE, "{fen}: {v}");
        assert!(w.sel_depth() <= MAX_PLY, "{fen}: sel depth {}", w.sel_depth());
        assert!(w.stats().nodes.load(std::sync::atomic::Ordering::Relaxed) < 1_000_000, "{fen}");
    }
}
