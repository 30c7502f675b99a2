use crate::board::Position;
use crate::error::{EngineError, Result};
use crate::options::EngineOptions;
use crate::search::limits::Limits;
use crate::search::report::{SearchListener, SearchOutcome, SilentListener};
use crate::search::root_move::RootMove;
use crate::search::thread::{LeadState, Thread};
use crate::search::tt::TranspositionTable;
use crate::search::value::*;
use crate::search::worker::{SearchSignals, Worker};
use cozy_chess::Move;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// What one thread offers in the best-thread vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub best_move: Move,
    pub score: Value,
    pub completed_depth: Depth,
    pub pv_len: usize,
}

/// Picks the thread whose move wins a vote weighted by score and completed
/// depth. Proven wins are preferred, shortest first; proven losses only win
/// when nothing else is available. Index 0 is the lead and wins ties.
pub fn select_best(candidates: &[Candidate]) -> usize {
    if candidates.is_empty() { return 0; }
    let min_score = candidates.iter().map(|c| c.score).min().unwrap_or(VALUE_ZERO);
    let weight = |c: &Candidate| (c.score - min_score + 14) as i64 * c.completed_depth as i64;

    let mut votes: Vec<(Move, i64)> = Vec::with_capacity(candidates.len());
    for c in candidates {
        match votes.iter_mut().find(|(m, _)| *m == c.best_move) {
            Some((_, v)) => *v += weight(c),
            None => votes.push((c.best_move, weight(c))),
        }
    }
    let votes_for = |m: Move| votes.iter().find(|(v, _)| *v == m).map_or(0, |(_, n)| *n);

    let mut best = 0;
    for (i, th) in candidates.iter().enumerate().skip(1) {
        let b = &candidates[best];
        if b.score.abs() >= VALUE_TB_WIN_IN_MAX_PLY {
            // Keep the shortest mate, or the longest defence
            if th.score > b.score { best = i; }
        } else if th.score >= VALUE_TB_WIN_IN_MAX_PLY
            || (th.score > VALUE_TB_LOSS_IN_MAX_PLY
                && (votes_for(th.best_move) > votes_for(b.best_move)
                    || (votes_for(th.best_move) == votes_for(b.best_move)
                        && weight(th) * (th.pv_len > 2) as i64 > weight(b) * (b.pv_len > 2) as i64)))
        {
            best = i;
        }
    }
    best
}

/// Lazy SMP thread pool. Thread 0 is the lead; it starts and stops the
/// helpers for every search and publishes the result to the listener.
pub struct ThreadPool {
    threads: Vec<Thread>,
    signals: Arc<SearchSignals>,
    tt: Arc<TranspositionTable>,
    options: EngineOptions,
    listener: Arc<dyn SearchListener>,
    outcome: Arc<Mutex<Option<SearchOutcome>>>,
}

impl ThreadPool {
    pub fn new(options: EngineOptions, listener: Arc<dyn SearchListener>) -> Result<Self> {
        let options = options.sanitized();
        let mut pool = Self {
            threads: Vec::new(),
            signals: Arc::new(SearchSignals::default()),
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            options,
            listener,
            outcome: Arc::new(Mutex::new(None)),
        };
        pool.spawn_threads()?;
        Ok(pool)
    }

    /// Pool without any output, for library use and tests.
    pub fn silent(options: EngineOptions) -> Result<Self> { Self::new(options, Arc::new(SilentListener)) }

    fn spawn_threads(&mut self) -> Result<()> {
        // Dropping joins the old threads
        self.threads.clear();

        let n = self.options.threads.max(1);
        let mut helpers = Vec::with_capacity(n - 1);
        for idx in 1..n {
            let w = Worker::new(idx, n, Arc::clone(&self.tt), Arc::clone(&self.signals), &self.options);
            helpers.push(Thread::spawn(w)?);
        }

        let mut lead = LeadState::new(Arc::clone(&self.listener), Arc::clone(&self.outcome));
        lead.helpers = helpers.iter().map(|t| Arc::clone(t.shared())).collect();
        let mut main = Worker::new(0, n, Arc::clone(&self.tt), Arc::clone(&self.signals), &self.options);
        lead.roster = std::iter::once(Arc::clone(main.stats()))
            .chain(helpers.iter().map(|t| Arc::clone(&t.shared().stats)))
            .collect();
        main.lead = Some(Box::new(lead));

        self.threads.push(Thread::spawn(main)?);
        self.threads.extend(helpers);
        debug!("spawned {n} search threads");
        Ok(())
    }

    pub fn size(&self) -> usize { self.threads.len() }
    pub fn options(&self) -> &EngineOptions { &self.options }
    pub fn tt(&self) -> &Arc<TranspositionTable> { &self.tt }

    /// Applies a full option set, respawning threads or resizing the table
    /// only when those settings changed.
    pub fn set(&mut self, options: EngineOptions) -> Result<()> {
        if self.is_searching() { return Err(EngineError::SearchInProgress); }
        let options = options.sanitized();
        let respawn = options.threads != self.options.threads;
        let resize = options.hash_mb != self.options.hash_mb;
        self.options = options;
        if resize { self.resize_tt(self.options.hash_mb)?; }
        if respawn { self.spawn_threads()?; }
        Ok(())
    }

    /// Sets one named option, as sent by `setoption`.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        let mut next = self.options.clone();
        next.set(name, value)?;
        info!("option {name} = {value}");
        self.set(next)
    }

    /// Replaces the transposition table with an empty one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) -> Result<()> {
        if self.is_searching() { return Err(EngineError::SearchInProgress); }
        self.tt = Arc::new(TranspositionTable::new(mb));
        for t in &self.threads {
            t.shared().worker.lock().tt = Arc::clone(&self.tt);
        }
        debug!("transposition table resized to {mb} MB, {} entries", self.tt.capacity());
        Ok(())
    }

    /// Forgets everything learned in previous searches.
    pub fn clear(&mut self) -> Result<()> {
        if self.is_searching() { return Err(EngineError::SearchInProgress); }
        self.tt.clear();
        let n = self.threads.len();
        for t in &self.threads {
            t.shared().worker.lock().clear(n);
        }
        *self.outcome.lock() = None;
        Ok(())
    }

    /// Starts a search in the background and returns immediately.
    pub fn start_thinking(&self, pos: &Position, limits: Limits, ponder: bool) -> Result<()> {
        if self.is_searching() { return Err(EngineError::SearchInProgress); }
        let Some(lead) = self.threads.first() else { return Err(EngineError::SearchInProgress) };

        *self.outcome.lock() = None;
        self.signals.stop.store(false, Ordering::Relaxed);
        self.signals.increase_depth.store(true, Ordering::Relaxed);
        self.signals.ponder.store(ponder, Ordering::Relaxed);
        self.signals.stop_on_ponderhit.store(false, Ordering::Relaxed);

        let legal = pos.legal_moves();
        let mut moves: Vec<Move> = if limits.searchmoves.is_empty() {
            legal.clone()
        } else {
            legal.iter().copied().filter(|m| limits.searchmoves.contains(m)).collect()
        };
        if moves.is_empty() && !legal.is_empty() {
            warn!("none of the requested searchmoves is legal, searching all moves");
            moves = legal;
        }
        let root_moves: Vec<RootMove> = moves.into_iter().map(RootMove::new).collect();

        for t in &self.threads {
            t.shared().worker.lock().install(pos, &limits, &root_moves, &self.options);
        }
        debug!("search started with {} root moves on {} threads", root_moves.len(), self.threads.len());
        lead.shared().start_searching();
        Ok(())
    }

    /// Runs a search to completion and returns its outcome.
    pub fn search(&self, pos: &Position, limits: Limits) -> Result<SearchOutcome> {
        self.start_thinking(pos, limits, false)?;
        self.wait_for_search_finished();
        Ok(self.last_outcome().unwrap_or_default())
    }

    pub fn wait_for_search_finished(&self) {
        if let Some(lead) = self.threads.first() { lead.shared().wait_for_search_finished(); }
    }

    pub fn stop(&self) { self.signals.stop.store(true, Ordering::Relaxed); }

    /// The opponent played the expected move: keep searching on the clock.
    pub fn ponderhit(&self) { self.signals.ponder.store(false, Ordering::Relaxed); }

    pub fn is_searching(&self) -> bool { self.threads.first().map_or(false, |t| t.shared().is_searching()) }

    pub fn nodes_searched(&self) -> u64 {
        self.threads.iter().map(|t| t.shared().stats.nodes.load(Ordering::Relaxed)).sum()
    }

    pub fn tb_hits(&self) -> u64 {
        self.threads.iter().map(|t| t.shared().stats.tb_hits.load(Ordering::Relaxed)).sum()
    }

    pub fn last_outcome(&self) -> Option<SearchOutcome> { self.outcome.lock().clone() }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.signals.ponder.store(false, Ordering::Relaxed);
        self.signals.stop.store(true, Ordering::Relaxed);
        self.wait_for_search_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::Square;

    fn mv(from: Square, to: Square) -> Move { Move { from, to, promotion: None } }

    #[test]
    fn vote_prefers_move_agreed_by_deeper_threads() {
        let a = mv(Square::E2, Square::E4);
        let b = mv(Square::D2, Square::D4);
        let c = [
            Candidate { best_move: a, score: 30, completed_depth: 10, pv_len: 5 },
            Candidate { best_move: b, score: 28, completed_depth: 12, pv_len: 5 },
            Candidate { best_move: b, score: 29, completed_depth: 12, pv_len: 5 },
        ];
        assert_eq!(c[select_best(&c)].best_move, b);
    }

    #[test]
    fn shortest_mate_wins() {
        let a = mv(Square::E2, Square::E4);
        let b = mv(Square::D2, Square::D4);
        let c = [
            Candidate { best_move: a, score: mate_in(7), completed_depth: 20, pv_len: 7 },
            Candidate { best_move: b, score: mate_in(3), completed_depth: 8, pv_len: 3 },
        ];
        assert_eq!(select_best(&c), 1);
    }

    #[test]
    fn single_candidate_is_lead() {
        let a = mv(Square::E2, Square::E4);
        assert_eq!(select_best(&[Candidate { best_move: a, score: 0, completed_depth: 1, pv_len: 1 }]), 0);
    }
}
