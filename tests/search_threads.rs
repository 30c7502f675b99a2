mod common;

use pvsearch::board::Position;
use pvsearch::error::EngineError;
use pvsearch::search::Limits;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn multi_thread_search_returns_legal_move_and_sums_nodes() {
    let pool = common::pool(4);
    assert_eq!(pool.size(), 4);
    let pos = Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();
    let out = pool.search(&pos, Limits::depth(7)).unwrap();
    let best = out.best_move.expect("no best move");
    assert!(pos.is_legal(best));
    assert_eq!(out.nodes, pool.nodes_searched(), "outcome nodes should be the sum over all threads");
    assert!(out.thread < 4);
}

#[test]
fn stop_ends_infinite_search_quickly() {
    let pool = common::pool(3);
    let pos = Position::startpos();
    pool.start_thinking(&pos, Limits::infinite(), false).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(pool.is_searching(), "infinite search must keep running until stopped");
    let t0 = Instant::now();
    pool.stop();
    pool.wait_for_search_finished();
    assert!(t0.elapsed() < Duration::from_secs(2), "stop took {:?}", t0.elapsed());
    let out = pool.last_outcome().expect("outcome after stop");
    assert!(out.best_move.is_some());
}

#[test]
fn starting_twice_is_rejected() {
    let pool = common::pool(2);
    let pos = Position::startpos();
    pool.start_thinking(&pos, Limits::infinite(), false).unwrap();
    let second = pool.start_thinking(&pos, Limits::depth(1), false);
    assert!(matches!(second, Err(EngineError::SearchInProgress)), "got {second:?}");
    pool.stop();
    pool.wait_for_search_finished();
    assert!(!pool.is_searching());
}

#[test]
fn pool_can_be_resized_between_searches() {
    let mut pool = common::pool(1);
    let pos = Position::startpos();
    pool.search(&pos, Limits::depth(3)).unwrap();
    pool.set_option("Threads", "3").unwrap();
    assert_eq!(pool.size(), 3);
    pool.set_option("Hash", "2").unwrap();
    let out = pool.search(&pos, Limits::depth(4)).unwrap();
    assert!(out.best_move.is_some());
}

#[test]
fn ponder_waits_for_ponderhit() {
    let pool = common::pool(2);
    let pos = Position::startpos();
    pool.start_thinking(&pos, Limits::depth(2), true).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(pool.is_searching(), "a pondering search must not finish on its own");
    pool.ponderhit();
    pool.wait_for_search_finished();
    assert!(pool.last_outcome().and_then(|o| o.best_move).is_some());
}

#[test]
fn movetime_is_honored() {
    let pool = common::pool(2);
    let pos = Position::startpos();
    let t0 = Instant::now();
    let out = pool.search(&pos, Limits::movetime(Duration::from_millis(150))).unwrap();
    let took = t0.elapsed();
    assert!(out.best_move.is_some());
    assert!(took >= Duration::from_millis(140), "stopped too early: {took:?}");
    assert!(took < Duration::from_millis(1500), "stopped too late: {took:?}");
}

#[test]
fn stop_right_after_start_is_not_lost() {
    let pool = common::pool(4);
    let pos = Position::startpos();
    for _ in 0..20 {
        pool.start_thinking(&pos, Limits::infinite(), false).unwrap();
        pool.stop();
        let t0 = Instant::now();
        pool.wait_for_search_finished();
        assert!(t0.elapsed() < Duration::from_secs(2), "fan-in took {:?}", t0.elapsed());
        assert!(!pool.is_searching());
        let out = pool.last_outcome().expect("outcome after immediate stop");
        assert!(out.best_move.map_or(false, |m| pos.is_legal(m)));
    }
}
