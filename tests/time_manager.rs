mod common;

use cozy_chess::Color;
use pvsearch::board::Position;
use pvsearch::search::time::TimeManagement;
use pvsearch::search::Limits;
use std::time::{Duration, Instant};

fn clock(ms: u64, inc: u64) -> Limits {
    Limits {
        time: [Duration::from_millis(ms); 2],
        inc: [Duration::from_millis(inc); 2],
        ..Limits::default()
    }
}

#[test]
fn clock_search_stays_within_budget() {
    let pool = common::pool(2);
    let pos = Position::startpos();
    let limits = clock(2000, 0);
    let tm = TimeManagement::init(&limits, Color::White, 0, Duration::from_millis(10), false);
    let t0 = Instant::now();
    let out = pool.search(&pos, limits).unwrap();
    let took = t0.elapsed();
    assert!(out.best_move.is_some());
    assert!(took <= tm.maximum() + Duration::from_millis(250), "took {took:?}, maximum {:?}", tm.maximum());
}

#[test]
fn more_time_gives_bigger_budget() {
    let short = TimeManagement::init(&clock(5_000, 0), Color::White, 10, Duration::ZERO, false);
    let long = TimeManagement::init(&clock(300_000, 0), Color::White, 10, Duration::ZERO, false);
    assert!(long.optimum() > short.optimum());
    assert!(long.maximum() > short.maximum());
}

#[test]
fn ponder_stretches_optimum() {
    let plain = TimeManagement::init(&clock(60_000, 500), Color::Black, 30, Duration::ZERO, false);
    let ponder = TimeManagement::init(&clock(60_000, 500), Color::Black, 30, Duration::ZERO, true);
    assert!(ponder.optimum() > plain.optimum());
    assert_eq!(ponder.maximum(), plain.maximum());
}

#[test]
fn node_limit_without_clock_ignores_time_management() {
    let l = Limits::nodes(10_000);
    assert!(!l.use_time_management());
    let tm = TimeManagement::init(&l, Color::White, 0, Duration::ZERO, false);
    assert_eq!(tm.optimum(), Duration::ZERO);
}
