//! Search threads. Every thread owns one [`Worker`] and parks in an idle
//! loop until the pool releases it. The lead thread additionally owns a
//! [`LeadState`] and drives time management, helper start/stop and the
//! final best-move vote.

use crate::error::{EngineError, Result};
use crate::perft;
use crate::search::pool::{select_best, Candidate};
use crate::search::report::{IterationInfo, Score, ScoreBound, SearchListener, SearchOutcome};
use crate::search::root_move::RootMove;
use crate::search::time::TimeManagement;
use crate::search::value::*;
use crate::search::worker::{ThreadStats, Worker};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Deep recursion needs more than the default thread stack.
const THREAD_STACK_BYTES: usize = 32 << 20;

#[derive(Debug)]
struct Dispatch {
    searching: bool,
    exit: bool,
}

/// The part of a search thread other threads may touch.
pub struct ThreadShared {
    idx: usize,
    dispatch: Mutex<Dispatch>,
    cv: Condvar,
    pub(crate) worker: Mutex<Worker>,
    pub(crate) stats: Arc<ThreadStats>,
}

impl ThreadShared {
    pub fn idx(&self) -> usize { self.idx }

    /// Releases the parked thread into `Worker::start_searching`.
    pub fn start_searching(&self) {
        self.dispatch.lock().searching = true;
        self.cv.notify_all();
    }

    /// Blocks until the thread is parked again.
    pub fn wait_for_search_finished(&self) {
        let mut d = self.dispatch.lock();
        self.cv.wait_while(&mut d, |d| d.searching);
    }

    pub fn is_searching(&self) -> bool { self.dispatch.lock().searching }
}

fn idle_loop(shared: Arc<ThreadShared>) {
    loop {
        {
            let mut d = shared.dispatch.lock();
            d.searching = false;
            shared.cv.notify_all();
            shared.cv.wait_while(&mut d, |d| !d.searching && !d.exit);
            if d.exit { break; }
        }
        shared.worker.lock().start_searching();
    }
    debug!("search thread {} exiting", shared.idx);
}

/// An OS thread plus its shared handle. Dropping it joins the thread.
pub struct Thread {
    shared: Arc<ThreadShared>,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    /// Spawns the thread and returns once it has parked.
    pub fn spawn(worker: Worker) -> Result<Self> {
        let idx = worker.idx;
        let stats = Arc::clone(worker.stats());
        let shared = Arc::new(ThreadShared {
            idx,
            dispatch: Mutex::new(Dispatch { searching: true, exit: false }),
            cv: Condvar::new(),
            worker: Mutex::new(worker),
            stats,
        });
        let s = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("search-{idx}"))
            .stack_size(THREAD_STACK_BYTES)
            .spawn(move || idle_loop(s))
            .map_err(EngineError::Spawn)?;
        shared.wait_for_search_finished();
        debug!("search thread {idx} parked");
        Ok(Self { shared, handle: Some(handle) })
    }

    pub fn shared(&self) -> &Arc<ThreadShared> { &self.shared }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.shared.dispatch.lock().exit = true;
        self.shared.cv.notify_all();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                debug!("search thread {} panicked", self.shared.idx);
            }
        }
    }
}

/// State only the lead thread keeps: time budgets, history of iteration
/// scores across moves, and handles to the helpers it starts and stops.
pub struct LeadState {
    pub(crate) tm: TimeManagement,
    pub(crate) calls_cnt: i32,
    pub(crate) iter_value: [Value; 4],
    pub(crate) best_previous_score: Value,
    pub(crate) best_previous_average_score: Value,
    pub(crate) previous_time_reduction: f64,
    pub(crate) helpers: Vec<Arc<ThreadShared>>,
    pub(crate) roster: Vec<Arc<ThreadStats>>,
    pub(crate) listener: Arc<dyn SearchListener>,
    pub(crate) outcome: Arc<Mutex<Option<SearchOutcome>>>,
}

impl LeadState {
    pub fn new(listener: Arc<dyn SearchListener>, outcome: Arc<Mutex<Option<SearchOutcome>>>) -> Self {
        let mut s = Self {
            tm: TimeManagement::default(),
            calls_cnt: 0,
            iter_value: [VALUE_ZERO; 4],
            best_previous_score: VALUE_INFINITE,
            best_previous_average_score: VALUE_INFINITE,
            previous_time_reduction: 1.0,
            helpers: Vec::new(),
            roster: Vec::new(),
            listener,
            outcome,
        };
        s.clear();
        s
    }

    pub fn clear(&mut self) {
        self.calls_cnt = 0;
        self.best_previous_score = VALUE_INFINITE;
        self.best_previous_average_score = VALUE_INFINITE;
        self.previous_time_reduction = 1.0;
    }

    /// Sums and resets the best-move change counters of all threads.
    pub fn take_best_move_changes(&self) -> f64 {
        self.roster.iter().map(|s| s.best_move_changes.swap(0, Ordering::Relaxed) as f64).sum()
    }

    pub fn thread_count(&self) -> usize { self.roster.len().max(1) }

    pub fn nodes_searched(&self) -> u64 { self.roster.iter().map(|s| s.nodes.load(Ordering::Relaxed)).sum() }

    pub fn tb_hits(&self) -> u64 { self.roster.iter().map(|s| s.tb_hits.load(Ordering::Relaxed)).sum() }
}

fn candidate(idx: usize, root_moves: &[RootMove], completed_depth: Depth) -> Option<(usize, Candidate)> {
    let rm = root_moves.first()?;
    Some((
        idx,
        Candidate { best_move: rm.mv(), score: rm.score, completed_depth, pv_len: rm.pv.len() },
    ))
}

impl Worker {
    /// Runs one whole search on the lead thread: starts the helpers, deepens,
    /// stops everyone, picks the best thread and publishes the result.
    pub(crate) fn think(&mut self) {
        let Some(lead) = self.lead.as_mut() else { return };
        let listener = Arc::clone(&lead.listener);
        let outcome_slot = Arc::clone(&lead.outcome);
        let helpers = lead.helpers.clone();

        if self.limits.perft > 0 {
            let divide = perft::divide(&self.root_pos, self.limits.perft);
            let total: u64 = divide.iter().map(|(_, n)| n).sum();
            listener.on_perft(&divide, total);
            *outcome_slot.lock() = Some(SearchOutcome { nodes: total, ..SearchOutcome::default() });
            return;
        }

        let us = self.root_pos.side_to_move();
        lead.tm = TimeManagement::init(&self.limits, us, self.root_pos.game_ply(), self.move_overhead, self.ponder_enabled);
        lead.calls_cnt = 0;
        self.tt.new_search();

        if self.root_moves.is_empty() {
            let score = if self.root_pos.in_check() { -VALUE_MATE } else { VALUE_DRAW };
            debug!("no legal moves at root, score {score}");
            listener.on_iteration(&IterationInfo {
                depth: 0,
                sel_depth: 0,
                multipv: 1,
                score: Score::from_value(score),
                bound: ScoreBound::Exact,
                nodes: 0,
                nps: 0,
                hashfull: self.tt.hashfull(),
                tb_hits: 0,
                time: self.elapsed(),
                pv: Vec::new(),
            });
            self.wait_while_pondering();
            listener.on_best_move(None, None);
            *outcome_slot.lock() = Some(SearchOutcome { score, ..SearchOutcome::default() });
            return;
        }

        for h in &helpers { h.start_searching(); }
        self.iterative_deepening();

        // A GUI in ponder or infinite mode must send the stop itself
        self.wait_while_pondering();
        self.signals.stop.store(true, Ordering::Relaxed);
        for h in &helpers { h.wait_for_search_finished(); }

        let mut candidates: Vec<(usize, Candidate)> = Vec::with_capacity(helpers.len() + 1);
        candidates.extend(candidate(self.idx, &self.root_moves, self.completed_depth));
        for h in &helpers {
            let w = h.worker.lock();
            candidates.extend(candidate(w.idx, &w.root_moves, w.completed_depth));
        }

        let mut best = 0;
        if self.multi_pv == 1 && self.limits.depth == 0 && candidates.len() > 1 {
            let c: Vec<Candidate> = candidates.iter().map(|(_, c)| *c).collect();
            best = select_best(&c);
        }
        let best_thread = candidates[best].0;

        if best_thread != self.idx {
            // Adopt the winning helper's root list so reporting and the
            // cross-move score memory use its line
            if let Some(h) = helpers.iter().find(|h| h.idx() == best_thread) {
                let w = h.worker.lock();
                self.root_moves = w.root_moves.clone();
                self.completed_depth = w.completed_depth;
            }
            self.pv_idx = 0;
            let depth = self.completed_depth.max(1);
            for info in self.iteration_infos(depth) { listener.on_iteration(&info); }
        }
        debug!("best thread {best_thread} of {}", candidates.len());

        if let Some(lead) = self.lead.as_mut() {
            lead.best_previous_score = self.root_moves[0].score;
            lead.best_previous_average_score = self.root_moves[0].average_score;
        }

        if self.root_moves[0].pv.len() == 1 {
            let tt = Arc::clone(&self.tt);
            let root = self.root_pos.clone();
            self.root_moves[0].extract_ponder_from_tt(&tt, &root);
        }

        let rm = &self.root_moves[0];
        let best_move = rm.mv();
        let ponder_move = rm.pv.get(1).copied();
        let best_uci = self.root_pos.move_to_uci(best_move);
        let ponder_uci = ponder_move.map(|p| {
            let mut after = self.root_pos.clone();
            after.do_move(best_move);
            after.move_to_uci(p)
        });
        listener.on_best_move(Some(&best_uci), ponder_uci.as_deref());

        let nodes = self.lead.as_ref().map_or(0, |l| l.nodes_searched());
        *outcome_slot.lock() = Some(SearchOutcome {
            best_move: Some(best_move),
            ponder_move,
            best_uci: Some(best_uci),
            ponder_uci,
            score: rm.score,
            depth: self.completed_depth,
            sel_depth: rm.sel_depth,
            pv: rm.pv.clone(),
            nodes,
            thread: best_thread,
        });
    }

    fn wait_while_pondering(&self) {
        while !self.stopped() && (self.signals.ponder.load(Ordering::Relaxed) || self.limits.infinite) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Polled by the lead from inside the search. Raises the stop flag once a
    /// time, node or ponderhit limit is reached.
    pub(crate) fn check_time(&mut self) {
        let Some(lead) = self.lead.as_mut() else { return };
        lead.calls_cnt -= 1;
        if lead.calls_cnt > 0 { return; }

        // Poll often enough to honor small node limits
        lead.calls_cnt = if self.limits.nodes > 0 { (self.limits.nodes / 1024).clamp(1, 512) as i32 } else { 512 };

        if self.signals.ponder.load(Ordering::Relaxed) { return; }

        let elapsed = lead.tm.elapsed();
        let stop = (self.limits.use_time_management()
            && (elapsed > lead.tm.maximum() || self.signals.stop_on_ponderhit.load(Ordering::Relaxed)))
            || self.limits.movetime.map_or(false, |mt| elapsed >= mt)
            || (self.limits.nodes > 0 && lead.nodes_searched() >= self.limits.nodes);
        if stop {
            self.signals.stop.store(true, Ordering::Relaxed);
        }
    }
}
