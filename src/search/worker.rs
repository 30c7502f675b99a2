use crate::board::Position;
use crate::options::EngineOptions;
use crate::search::history::{ContinuationHistory, Histories};
use crate::search::limits::Limits;
use crate::search::movepick::ContLookback;
use crate::search::params::SearchParams;
use crate::search::report::{pv_to_uci, IterationInfo, Score, ScoreBound};
use crate::search::root_move::{sort_root_moves, RootMove};
use crate::search::stack::{new_stack, PvTable, Stack, STACK_OFFSET, STACK_SIZE};
use crate::search::thread::LeadState;
use crate::search::tt::TranspositionTable;
use crate::search::value::*;
use crate::search::NodeType;
use cozy_chess::Move;
use log::trace;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-thread counters, readable by other threads without locking.
#[derive(Default, Debug)]
pub struct ThreadStats {
    pub nodes: AtomicU64,
    pub tb_hits: AtomicU64,
    pub best_move_changes: AtomicU64,
}

impl ThreadStats {
    pub fn reset(&self) {
        self.nodes.store(0, Ordering::Relaxed);
        self.tb_hits.store(0, Ordering::Relaxed);
        self.best_move_changes.store(0, Ordering::Relaxed);
    }
}

/// Flags shared by every thread of a pool and polled inside the search.
#[derive(Debug)]
pub struct SearchSignals {
    pub stop: AtomicBool,
    pub increase_depth: AtomicBool,
    pub ponder: AtomicBool,
    pub stop_on_ponderhit: AtomicBool,
}

impl Default for SearchSignals {
    fn default() -> Self {
        Self {
            stop: AtomicBool::new(false),
            increase_depth: AtomicBool::new(true),
            ponder: AtomicBool::new(false),
            stop_on_ponderhit: AtomicBool::new(false),
        }
    }
}

/// Everything one search thread mutates while searching. Owned by exactly
/// one thread; other threads only read its `stats`.
pub struct Worker {
    pub(crate) idx: usize,
    pub(crate) stats: Arc<ThreadStats>,
    pub(crate) signals: Arc<SearchSignals>,
    pub(crate) tt: Arc<TranspositionTable>,
    pub(crate) params: SearchParams,
    pub(crate) multi_pv: usize,
    pub(crate) move_overhead: Duration,
    pub(crate) ponder_enabled: bool,

    pub(crate) limits: Limits,
    pub(crate) root_pos: Position,
    pub(crate) pos: Position,
    pub(crate) root_moves: Vec<RootMove>,

    pub(crate) root_depth: Depth,
    pub(crate) completed_depth: Depth,
    pub(crate) sel_depth: i32,
    pub(crate) nmp_min_ply: i32,
    pub(crate) optimism: [Value; 2],
    pub(crate) root_delta: Value,
    pub(crate) pv_idx: usize,
    pub(crate) pv_last: usize,

    pub(crate) hist: Histories,
    pub(crate) stack: Box<[Stack]>,
    pub(crate) pv: PvTable,
    reductions: Box<[i32]>,

    pub(crate) lead: Option<Box<LeadState>>,
}

impl Worker {
    pub fn new(
        idx: usize,
        threads: usize,
        tt: Arc<TranspositionTable>,
        signals: Arc<SearchSignals>,
        options: &EngineOptions,
    ) -> Self {
        let mut w = Self {
            idx,
            stats: Arc::new(ThreadStats::default()),
            signals,
            tt,
            params: options.search.clone().sanitized(),
            multi_pv: options.multi_pv,
            move_overhead: Duration::from_millis(options.move_overhead_ms),
            ponder_enabled: options.ponder,
            limits: Limits::default(),
            root_pos: Position::startpos(),
            pos: Position::startpos(),
            root_moves: Vec::new(),
            root_depth: 0,
            completed_depth: 0,
            sel_depth: 0,
            nmp_min_ply: 0,
            optimism: [0; 2],
            root_delta: 1,
            pv_idx: 0,
            pv_last: 0,
            hist: Histories::default(),
            stack: new_stack(),
            pv: PvTable::default(),
            reductions: vec![0; MAX_MOVES].into_boxed_slice(),
            lead: None,
        };
        w.init_reductions(threads);
        w
    }

    fn init_reductions(&mut self, threads: usize) {
        let scale = self.params.lmr_scale + (threads.max(1) as f64).ln() / 2.0;
        for (i, r) in self.reductions.iter_mut().enumerate().skip(1) {
            *r = (scale * (i as f64).ln()) as i32;
        }
    }

    pub fn is_lead(&self) -> bool { self.lead.is_some() }
    pub fn stats(&self) -> &Arc<ThreadStats> { &self.stats }
    pub fn root_moves(&self) -> &[RootMove] { &self.root_moves }
    pub fn completed_depth(&self) -> Depth { self.completed_depth }
    pub fn sel_depth(&self) -> Depth { self.sel_depth }

    /// Forgets everything learned: histories and the lead's time state.
    pub fn clear(&mut self, threads: usize) {
        self.hist.clear();
        self.init_reductions(threads);
        if let Some(lead) = self.lead.as_mut() { lead.clear(); }
    }

    /// Installs the inputs of the next search. Only called while the owning
    /// thread is parked.
    pub(crate) fn install(&mut self, pos: &Position, limits: &Limits, root_moves: &[RootMove], options: &EngineOptions) {
        self.root_pos = pos.clone();
        self.root_pos.forget_undo();
        self.pos = self.root_pos.clone();
        self.limits = limits.clone();
        self.root_moves = root_moves.to_vec();
        self.params = options.search.clone().sanitized();
        self.multi_pv = options.multi_pv;
        self.move_overhead = Duration::from_millis(options.move_overhead_ms);
        self.ponder_enabled = options.ponder;
        self.root_depth = 0;
        self.completed_depth = 0;
        self.sel_depth = 0;
        self.nmp_min_ply = 0;
        self.stats.reset();
    }

    /// Entry point of the search thread once released.
    pub(crate) fn start_searching(&mut self) {
        if self.is_lead() { self.think(); } else { self.iterative_deepening(); }
    }

    #[inline]
    pub(crate) fn reduction(&self, improving: bool, depth: Depth, move_count: i32, delta: Value) -> Depth {
        let d = depth.clamp(0, MAX_MOVES as i32 - 1) as usize;
        let mc = move_count.clamp(0, MAX_MOVES as i32 - 1) as usize;
        let scale = self.reductions[d] * self.reductions[mc];
        (scale + self.params.lmr_offset - delta * self.params.lmr_delta_mul / self.root_delta.max(1)) / 1024
            + (!improving && scale > 808) as i32
    }

    pub(crate) fn cont_lookback(&self, ss: usize) -> ContLookback {
        let s = &self.stack;
        [s[ss - 1].cont_hist, s[ss - 2].cont_hist, s[ss - 3].cont_hist, s[ss - 4].cont_hist, s[ss - 6].cont_hist]
    }

    #[inline]
    pub(crate) fn make_move(&mut self, m: Move) {
        self.stats.nodes.fetch_add(1, Ordering::Relaxed);
        self.pos.do_move(m);
    }

    #[inline]
    pub(crate) fn stopped(&self) -> bool { self.signals.stop.load(Ordering::Relaxed) }

    fn reset_stack(&mut self) {
        for (i, f) in self.stack.iter_mut().enumerate() {
            *f = Stack::default();
            f.ply = i as i32 - STACK_OFFSET as i32;
        }
        for f in &mut self.stack[..STACK_OFFSET] {
            f.cont_hist = ContinuationHistory::SENTINEL;
            f.static_eval = VALUE_NONE;
        }
        debug_assert_eq!(self.stack.len(), STACK_SIZE);
    }

    /// Quiescence value of `pos` with a full window, from the side to move's
    /// point of view. Uses this worker's table and histories.
    pub fn qsearch_value(&mut self, pos: &Position) -> Value {
        self.root_pos = pos.clone();
        self.root_pos.forget_undo();
        self.pos = self.root_pos.clone();
        self.reset_stack();
        self.sel_depth = 0;
        self.qsearch(NodeType::Pv, STACK_OFFSET, -VALUE_INFINITE, VALUE_INFINITE, 0)
    }

    /// Fail-soft value of a single `depth` search of `pos` inside the window
    /// `(alpha, beta)`. A result at or above `beta` is a lower bound, one at
    /// or below `alpha` an upper bound.
    pub fn search_value(&mut self, pos: &Position, alpha: Value, beta: Value, depth: Depth) -> Value {
        self.root_pos = pos.clone();
        self.root_pos.forget_undo();
        self.pos = self.root_pos.clone();
        self.reset_stack();
        self.sel_depth = 0;
        self.nmp_min_ply = 0;
        self.root_depth = depth;
        self.root_delta = (beta - alpha).max(1);
        self.search(NodeType::Pv, STACK_OFFSET, alpha, beta, depth, false)
    }

    /// Deepens the root search one ply at a time until told to stop or a
    /// depth or mate limit is reached.
    pub(crate) fn iterative_deepening(&mut self) {
        self.reset_stack();
        for p in 0..=MAX_PLY as usize { self.pv.clear(p); }

        let us = self.root_pos.side_to_move();
        let ss = STACK_OFFSET;
        let mut best_value = -VALUE_INFINITE;
        let mut last_best_move: Option<Move> = None;
        let mut last_best_move_depth = 0;
        let mut time_reduction = 1.0f64;
        let mut tot_best_move_changes = 0.0f64;
        let mut iter_idx = 0usize;
        let mut search_again_counter = 0;

        if let Some(lead) = self.lead.as_mut() {
            let seed = if lead.best_previous_score == VALUE_INFINITE { VALUE_ZERO } else { lead.best_previous_score };
            lead.iter_value = [seed; 4];
        }

        if self.root_moves.is_empty() { return; }
        let multi_pv = self.multi_pv.clamp(1, self.root_moves.len());

        loop {
            self.root_depth += 1;
            if self.root_depth >= MAX_PLY || self.stopped() { break; }
            if self.is_lead() && self.limits.depth > 0 && self.root_depth > self.limits.depth { break; }

            if self.is_lead() { tot_best_move_changes /= 2.0; }

            for rm in &mut self.root_moves { rm.previous_score = rm.score; }
            self.pv_last = self.root_moves.len();

            if !self.signals.increase_depth.load(Ordering::Relaxed) { search_again_counter += 1; }

            self.pv_idx = 0;
            while self.pv_idx < multi_pv && !self.stopped() {
                self.sel_depth = 0;

                // Unsearched moves average -VALUE_INFINITE, which opens a full window
                let avg = self.root_moves[self.pv_idx].average_score;
                let mut delta = self.params.asp_delta_base + avg * avg / self.params.asp_delta_div;
                let mut alpha = (avg - delta).max(-VALUE_INFINITE);
                let mut beta = (avg + delta).min(VALUE_INFINITE);

                let opt = self.params.optimism_num * avg / (avg.abs() + self.params.optimism_add);
                self.optimism[us as usize] = opt;
                self.optimism[!us as usize] = -opt;

                let mut failed_high_cnt = 0;
                loop {
                    let adjusted_depth = (self.root_depth - failed_high_cnt - 3 * (search_again_counter + 1) / 4).max(1);
                    best_value = self.search(NodeType::Root, ss, alpha, beta, adjusted_depth, false);

                    let (lo, hi) = (self.pv_idx, self.pv_last);
                    sort_root_moves(&mut self.root_moves[lo..hi]);

                    if self.stopped() { break; }

                    if self.is_lead() && multi_pv == 1 && (best_value <= alpha || best_value >= beta) {
                        if self.elapsed() > Duration::from_secs(3) { self.report(self.root_depth); }
                    }

                    if best_value <= alpha {
                        beta = (alpha + beta) / 2;
                        alpha = (best_value - delta).max(-VALUE_INFINITE);
                        failed_high_cnt = 0;
                        if self.is_lead() { self.signals.stop_on_ponderhit.store(false, Ordering::Relaxed); }
                    } else if best_value >= beta {
                        beta = (best_value + delta).min(VALUE_INFINITE);
                        failed_high_cnt += 1;
                    } else {
                        break;
                    }
                    trace!("thread {} depth {} re-search [{alpha}, {beta}]", self.idx, self.root_depth);
                    delta = (delta + (delta / self.params.asp_widen_div).max(1)).min(VALUE_INFINITE);
                }

                sort_root_moves(&mut self.root_moves[..=self.pv_idx]);

                if self.is_lead() && (self.stopped() || self.pv_idx + 1 == multi_pv || self.elapsed() > Duration::from_secs(3)) {
                    // An iteration interrupted before its first move finished has nothing new to show
                    if !(self.stopped() && self.root_moves[0].score == -VALUE_INFINITE) {
                        self.report(self.root_depth);
                    }
                }
                self.pv_idx += 1;
            }

            if !self.stopped() { self.completed_depth = self.root_depth; }

            if Some(self.root_moves[0].mv()) != last_best_move {
                last_best_move = Some(self.root_moves[0].mv());
                last_best_move_depth = self.root_depth;
            }

            if self.limits.mate > 0 && best_value >= VALUE_MATE_IN_MAX_PLY && VALUE_MATE - best_value <= 2 * self.limits.mate {
                self.signals.stop.store(true, Ordering::Relaxed);
            }

            if !self.is_lead() { continue; }

            if let Some(lead) = self.lead.as_mut() {
                tot_best_move_changes += lead.take_best_move_changes();
                if self.limits.use_time_management()
                    && !self.signals.stop.load(Ordering::Relaxed)
                    && !self.signals.stop_on_ponderhit.load(Ordering::Relaxed)
                {
                    let falling_eval = ((66 + 14 * (lead.best_previous_average_score - best_value)
                        + 6 * (lead.iter_value[iter_idx] - best_value)) as f64
                        / 616.6)
                        .clamp(0.51, 1.51);
                    time_reduction = if last_best_move_depth + 8 < self.completed_depth { 1.56 } else { 0.69 };
                    let reduction = (1.4 + lead.previous_time_reduction) / (2.17 * time_reduction);
                    let instability = 1.0 + 1.79 * tot_best_move_changes / lead.thread_count() as f64;
                    let mut total = lead.tm.optimum().as_secs_f64() * 1000.0 * falling_eval * reduction * instability;
                    if self.root_moves.len() == 1 { total = total.min(500.0); }

                    let elapsed = lead.tm.elapsed().as_secs_f64() * 1000.0;
                    let pondering = self.signals.ponder.load(Ordering::Relaxed);
                    if elapsed > total {
                        if pondering {
                            self.signals.stop_on_ponderhit.store(true, Ordering::Relaxed);
                        } else {
                            self.signals.stop.store(true, Ordering::Relaxed);
                        }
                    } else {
                        self.signals.increase_depth.store(pondering || elapsed <= total * 0.5, Ordering::Relaxed);
                    }
                }
                lead.iter_value[iter_idx] = best_value;
                iter_idx = (iter_idx + 1) & 3;
            }
        }

        if let Some(lead) = self.lead.as_mut() { lead.previous_time_reduction = time_reduction; }
    }

    pub(crate) fn elapsed(&self) -> Duration { self.limits.start_time.elapsed() }

    /// Builds one progress record per PV line for the given depth.
    pub(crate) fn iteration_infos(&self, depth: Depth) -> Vec<IterationInfo> {
        let Some(lead) = self.lead.as_ref() else { return Vec::new() };
        let elapsed = self.elapsed();
        let nodes = lead.nodes_searched();
        let nps = (nodes as u128 * 1000 / elapsed.as_millis().max(1)) as u64;
        let hashfull = self.tt.hashfull();
        let tb_hits = lead.tb_hits();
        let multi_pv = self.multi_pv.clamp(1, self.root_moves.len().max(1));

        let mut out = Vec::with_capacity(multi_pv);
        for (i, rm) in self.root_moves.iter().take(multi_pv).enumerate() {
            let updated = rm.score != -VALUE_INFINITE;
            if depth == 1 && !updated && i > 0 { continue; }
            let d = if updated { depth } else { (depth - 1).max(1) };
            let mut v = if updated { rm.uci_score } else { rm.previous_score };
            if v == -VALUE_INFINITE { v = VALUE_ZERO; }
            let bound = if i != self.pv_idx.min(multi_pv - 1) {
                ScoreBound::Exact
            } else if rm.score_lowerbound {
                ScoreBound::Lower
            } else if rm.score_upperbound {
                ScoreBound::Upper
            } else {
                ScoreBound::Exact
            };
            out.push(IterationInfo {
                depth: d,
                sel_depth: rm.sel_depth,
                multipv: i + 1,
                score: Score::from_value(v),
                bound,
                nodes,
                nps,
                hashfull,
                tb_hits,
                time: elapsed,
                pv: pv_to_uci(&self.root_pos, &rm.pv),
            });
        }
        out
    }

    fn report(&self, depth: Depth) {
        let Some(lead) = self.lead.as_ref() else { return };
        for info in self.iteration_infos(depth) { lead.listener.on_iteration(&info); }
    }
}
