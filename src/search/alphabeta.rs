//! Principal variation search and quiescence search. Both are methods on
//! [`Worker`] so that every node can reach the thread's histories, stack
//! and shared table without extra indirection.

use crate::board::cozy::piece_value;
use crate::search::eval::evaluate;
use crate::search::history::{piece_index, ContinuationHistory, CORRECTION_HISTORY_LIMIT};
use crate::search::movepick::MovePicker;
use crate::search::tt::Bound;
use crate::search::value::*;
use crate::search::worker::Worker;
use crate::search::NodeType;
use cozy_chess::{Move, Piece, Square};
use std::sync::atomic::Ordering;

impl Worker {
    /// Piece index and square of the move that led to frame `ss`, if it was
    /// a real move whose piece still stands on its target square.
    fn prev_move_info(&self, ss: usize) -> Option<(usize, Square)> {
        let m = self.stack[ss - 1].current_move?;
        let piece = self.pos.piece_on(m.to)?;
        let color = self.pos.color_on(m.to)?;
        Some((piece_index(color, piece), m.to))
    }

    fn corrected_eval(&self, raw: Value) -> Value {
        let cv = self.hist.correction.get(self.pos.side_to_move(), self.pos.pawn_key());
        (raw + cv * cv.abs() / 16384).clamp(VALUE_TB_LOSS_IN_MAX_PLY + 1, VALUE_TB_WIN_IN_MAX_PLY - 1)
    }

    fn static_eval(&self) -> Value {
        let us = self.pos.side_to_move() as usize;
        evaluate(&self.pos, self.optimism[us])
    }

    fn stat_bonus(&self, depth: Depth) -> i32 { self.params.stat_bonus(depth) }

    pub(crate) fn search(
        &mut self,
        nt: NodeType,
        ss: usize,
        mut alpha: Value,
        mut beta: Value,
        mut depth: Depth,
        cut_node: bool,
    ) -> Value {
        let pv_node = nt != NodeType::NonPv;
        let root_node = nt == NodeType::Root;

        if depth <= 0 {
            return self.qsearch(if pv_node { NodeType::Pv } else { NodeType::NonPv }, ss, alpha, beta, 0);
        }
        debug_assert!(-VALUE_INFINITE <= alpha && alpha < beta && beta <= VALUE_INFINITE);

        // Step 1. Initialize node
        let ply = self.stack[ss].ply;
        let us = self.pos.side_to_move();
        let in_check = self.pos.in_check();
        let prior_capture = self.pos.last_captured().is_some();
        self.stack[ss].in_check = in_check;
        self.stack[ss].move_count = 0;
        let mut best_value = -VALUE_INFINITE;

        if self.lead.is_some() { self.check_time(); }

        if pv_node && self.sel_depth < ply + 1 { self.sel_depth = ply + 1; }

        if !root_node {
            // Step 2. Aborted search and immediate draw
            if self.stopped() || self.pos.is_draw(ply) || ply >= MAX_PLY {
                return if ply >= MAX_PLY && !in_check {
                    self.static_eval()
                } else {
                    value_draw(self.stats.nodes.load(Ordering::Relaxed))
                };
            }

            // Step 3. Mate distance pruning
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta { return alpha; }
        } else {
            self.root_delta = beta - alpha;
        }

        self.stack[ss + 1].excluded_move = None;
        self.stack[ss + 2].killers = [None; 2];
        self.stack[ss + 2].cutoff_cnt = 0;
        self.stack[ss].double_extensions = self.stack[ss - 1].double_extensions;
        self.stack[ss].stat_score = 0;
        let prev = self.prev_move_info(ss);

        // Step 4. Transposition table lookup
        let excluded = self.stack[ss].excluded_move;
        let pos_key = self.pos.key();
        let tte = self.tt.probe(pos_key);
        self.stack[ss].tt_hit = tte.is_some();
        let tt_value = tte.map_or(VALUE_NONE, |e| value_from_tt(e.value, ply, self.pos.rule50()));
        let tt_depth = tte.map_or(DEPTH_NONE, |e| e.depth);
        let tt_bound = tte.map_or(Bound::None, |e| e.bound);
        let tt_move = if root_node {
            Some(self.root_moves[self.pv_idx].mv())
        } else {
            tte.and_then(|e| e.mv).filter(|&m| self.pos.is_legal(m))
        };
        let tt_capture = tt_move.map_or(false, |m| self.pos.is_capture_stage(m));
        if excluded.is_none() {
            self.stack[ss].tt_pv = pv_node || tte.map_or(false, |e| e.is_pv);
        }

        // At non-PV nodes we check for an early cutoff
        if !pv_node
            && excluded.is_none()
            && tt_depth > depth - (tt_value <= beta) as i32
            && tt_value != VALUE_NONE
            && tt_bound.includes(tt_value >= beta)
        {
            if let Some(m) = tt_move {
                if tt_value >= beta {
                    if !tt_capture { self.update_quiet_stats(ss, m, self.stat_bonus(depth)); }
                    // Extra penalty for an early quiet move of the previous ply
                    if let Some((ppc, psq)) = prev {
                        if self.stack[ss - 1].move_count <= 2 && !prior_capture {
                            self.update_continuation_histories(ss - 1, ppc, psq, -self.stat_bonus(depth + 1));
                        }
                    }
                } else if !tt_capture {
                    let penalty = -self.stat_bonus(depth);
                    let pc = piece_index(us, self.pos.moved_piece(m));
                    self.hist.main.update(us, m, penalty);
                    self.update_continuation_histories(ss, pc, m.to, penalty);
                }
            }
            // Scores close to a fifty-move draw may be stale
            if self.pos.rule50() < 90 { return tt_value; }
        }

        // Step 6. Static evaluation
        let mut unadjusted_eval = VALUE_NONE;
        let mut eval;
        let improving;
        if in_check {
            self.stack[ss].static_eval = VALUE_NONE;
            eval = VALUE_NONE;
            improving = false;
        } else {
            if excluded.is_some() {
                eval = self.stack[ss].static_eval;
            } else if let Some(e) = tte {
                unadjusted_eval = if e.eval == VALUE_NONE { self.static_eval() } else { e.eval };
                eval = self.corrected_eval(unadjusted_eval);
                self.stack[ss].static_eval = eval;
                // The table value may be a better estimate than the static eval
                if tt_value != VALUE_NONE && tt_bound.includes(tt_value > eval) { eval = tt_value; }
            } else {
                unadjusted_eval = self.static_eval();
                eval = self.corrected_eval(unadjusted_eval);
                self.stack[ss].static_eval = eval;
                let tt_pv = self.stack[ss].tt_pv;
                self.tt.store(pos_key, VALUE_NONE, tt_pv, Bound::None, DEPTH_NONE, None, unadjusted_eval);
            }

            // Use the eval swing of the previous move to order quiets
            if let Some(pm) = self.stack[ss - 1].current_move {
                let prev_eval = self.stack[ss - 1].static_eval;
                if !self.stack[ss - 1].in_check && !prior_capture && prev_eval != VALUE_NONE && excluded.is_none() {
                    let bonus = (-18 * (prev_eval + self.stack[ss].static_eval)).clamp(-1812, 1812);
                    self.hist.main.update(!us, pm, bonus);
                }
            }

            let se = self.stack[ss].static_eval;
            improving = if self.stack[ss - 2].static_eval != VALUE_NONE {
                se > self.stack[ss - 2].static_eval
            } else if self.stack[ss - 4].static_eval != VALUE_NONE {
                se > self.stack[ss - 4].static_eval
            } else {
                true
            };

            // Step 7. Razoring
            if !pv_node && eval < alpha - self.params.razor_base - self.params.razor_depth_sq * depth * depth {
                let value = self.qsearch(NodeType::NonPv, ss, alpha - 1, alpha, 0);
                if value < alpha { return value; }
            }

            // Step 8. Futility pruning: child node (static null move)
            if !self.stack[ss].tt_pv
                && depth < self.params.rfp_max_depth
                && eval - self.params.futility_margin(depth, cut_node && tte.is_none(), improving)
                    - self.stack[ss - 1].stat_score / 321
                    >= beta
                && eval >= beta
                && eval < VALUE_TB_WIN_IN_MAX_PLY
                && (tt_move.is_none() || tt_capture)
            {
                return eval;
            }

            // Step 9. Null move search with verification
            if !pv_node
                && self.stack[ss - 1].current_move.is_some()
                && self.stack[ss - 1].stat_score < 17257
                && eval >= beta
                && eval >= se
                && se >= beta - self.params.nmp_depth_margin * depth + self.params.nmp_static_base
                && excluded.is_none()
                && self.pos.non_pawn_material(us) > 0
                && ply >= self.nmp_min_ply
                && beta > VALUE_TB_LOSS_IN_MAX_PLY
            {
                let r = ((eval - beta) / self.params.nmp_eval_div).min(6) + depth / 3 + self.params.nmp_base;
                self.stack[ss].current_move = None;
                self.stack[ss].cont_hist = ContinuationHistory::SENTINEL;
                if self.pos.do_null_move() {
                    self.stats.nodes.fetch_add(1, Ordering::Relaxed);
                    let null_value = -self.search(NodeType::NonPv, ss + 1, -beta, -beta + 1, depth - r, !cut_node);
                    self.pos.undo_move();

                    if null_value >= beta && null_value < VALUE_TB_WIN_IN_MAX_PLY {
                        if self.nmp_min_ply != 0 || depth < self.params.nmp_verify_depth {
                            return null_value;
                        }
                        // Verification search with null move disabled for the first plies
                        self.nmp_min_ply = ply + 3 * (depth - r) / 4;
                        let v = self.search(NodeType::NonPv, ss, beta - 1, beta, depth - r, false);
                        self.nmp_min_ply = 0;
                        if v >= beta { return null_value; }
                    }
                }
            }

            // Step 10. Internal iterative reductions
            if pv_node && tt_move.is_none() {
                depth -= 2 + 2 * (tte.is_some() && tt_depth >= depth) as i32;
            }
            if depth <= 0 { return self.qsearch(NodeType::Pv, ss, alpha, beta, 0); }
            if cut_node && depth >= self.params.iir_depth * 2 && tt_move.is_none() { depth -= 2; }

            // Step 11. ProbCut
            let probcut_beta = beta + self.params.probcut_margin - 70 * improving as i32;
            if !pv_node
                && depth > 3
                && beta.abs() < VALUE_TB_WIN_IN_MAX_PLY
                && !(tt_depth >= depth - 3 && tt_value != VALUE_NONE && tt_value < probcut_beta)
            {
                let mut mp = MovePicker::new_probcut(&self.pos, tt_move, probcut_beta - se, self.cont_lookback(ss));
                while let Some(m) = mp.next_move(&self.pos, &self.hist, false) {
                    if Some(m) == excluded { continue; }
                    let pc = piece_index(us, self.pos.moved_piece(m));
                    self.stack[ss].current_move = Some(m);
                    self.stack[ss].cont_hist = ContinuationHistory::key(in_check, true, pc, m.to);
                    self.make_move(m);
                    let mut value = -self.qsearch(NodeType::NonPv, ss + 1, -probcut_beta, -probcut_beta + 1, 0);
                    if value >= probcut_beta {
                        value = -self.search(NodeType::NonPv, ss + 1, -probcut_beta, -probcut_beta + 1, depth - 4, !cut_node);
                    }
                    self.pos.undo_move();
                    if value >= probcut_beta {
                        let tt_pv = self.stack[ss].tt_pv;
                        self.tt.store(pos_key, value_to_tt(value, ply), tt_pv, Bound::Lower, depth - 3, Some(m), unadjusted_eval);
                        return value - (probcut_beta - beta);
                    }
                }
            }
        }

        // Step 12. Small ProbCut when in check, driven by a capture in the table
        let probcut_beta = beta + 416;
        if in_check
            && !pv_node
            && tt_capture
            && tt_bound.includes(true)
            && tt_depth >= depth - 4
            && tt_value >= probcut_beta
            && tt_value.abs() < VALUE_TB_WIN_IN_MAX_PLY
            && beta.abs() < VALUE_TB_WIN_IN_MAX_PLY
        {
            return probcut_beta;
        }

        let cont = self.cont_lookback(ss);
        let counter = prev.and_then(|(ppc, psq)| self.hist.counter_moves.get(ppc, psq));
        let mut mp = MovePicker::new_main(&self.pos, tt_move, depth, self.stack[ss].killers, counter, cont);

        let mut value = best_value;
        let mut move_count = 0;
        let mut best_move: Option<Move> = None;
        let mut captures_searched: Vec<Move> = Vec::with_capacity(32);
        let mut quiets_searched: Vec<Move> = Vec::with_capacity(64);
        let mut move_count_pruning = false;
        let mut singular_quiet_lmr = false;
        let likely_fail_low = pv_node && tt_move.is_some() && tt_bound.includes(false) && tt_depth >= depth;

        // Step 13. Loop through moves until no moves remain or a beta cutoff occurs
        while let Some(m) = mp.next_move(&self.pos, &self.hist, move_count_pruning) {
            if Some(m) == excluded { continue; }
            // At the root only the moves of the current PV slice are searched
            if root_node && !self.root_moves[self.pv_idx..self.pv_last].iter().any(|rm| *rm == m) { continue; }

            move_count += 1;
            self.stack[ss].move_count = move_count;
            if pv_node { self.pv.clear(ply as usize + 1); }

            let mut extension = 0;
            let capture = self.pos.is_capture_stage(m);
            let moved = self.pos.moved_piece(m);
            let pc = piece_index(us, moved);
            let gives_check = self.pos.gives_check(m);
            let mut new_depth = depth - 1;
            let delta = beta - alpha;
            let mut r = self.reduction(improving, depth, move_count, delta);

            // Step 14. Pruning at shallow depth
            if !root_node && self.pos.non_pawn_material(us) > 0 && best_value > VALUE_TB_LOSS_IN_MAX_PLY {
                move_count_pruning = move_count >= self.params.futility_move_count(improving, depth);
                let lmr_depth = new_depth - r;

                if capture || gives_check {
                    if !gives_check && lmr_depth < 7 && !in_check {
                        let captured = self.pos.captured_piece(m);
                        let futility = self.stack[ss].static_eval
                            + 188
                            + 206 * lmr_depth
                            + captured.map_or(0, piece_value)
                            + self.hist.capture.get(pc, m.to, captured.unwrap_or(Piece::Pawn)) / 7;
                        if futility < alpha { continue; }
                    }
                    if !self.pos.see_ge(m, -self.params.see_capture_mul * depth) { continue; }
                } else {
                    let ch = &self.hist.continuation;
                    let mut history = ch.get(cont[0], pc, m.to)
                        + ch.get(cont[1], pc, m.to)
                        + self.hist.pawn.get(self.pos.pawn_key(), pc, m.to);

                    // Continuation history based pruning
                    if lmr_depth < 6 && history < -self.params.cont_hist_prune_mul * depth { continue; }

                    history += 2 * self.hist.main.get(us, m);
                    let mut lmr_depth = (lmr_depth + history / 7836).max(-1);

                    // Futility pruning: parent node
                    if !in_check
                        && lmr_depth < 13
                        && self.stack[ss].static_eval + self.params.futility_base + self.params.futility_mul * lmr_depth <= alpha
                    {
                        continue;
                    }

                    lmr_depth = lmr_depth.max(0);
                    if !self.pos.see_ge(m, -self.params.see_quiet_mul * lmr_depth * lmr_depth) { continue; }
                }
            }

            // Step 15. Extensions, limited so that the search does not explode
            if ply < self.root_depth * 2 {
                if !root_node
                    && depth >= self.params.singular_min_depth - (self.completed_depth > 24) as i32
                        + 2 * (pv_node && self.stack[ss].tt_pv) as i32
                    && Some(m) == tt_move
                    && excluded.is_none()
                    && tt_value.abs() < VALUE_TB_WIN_IN_MAX_PLY
                    && tt_bound.includes(true)
                    && tt_depth >= depth - 3
                {
                    let tt_pv_non_pv = self.stack[ss].tt_pv && !pv_node;
                    let singular_beta = tt_value - (self.params.singular_beta_base + 57 * tt_pv_non_pv as i32) * depth / 64;
                    let singular_depth = (depth - 1) / 2;

                    self.stack[ss].excluded_move = Some(m);
                    let v = self.search(NodeType::NonPv, ss, singular_beta - 1, singular_beta, singular_depth, cut_node);
                    self.stack[ss].excluded_move = None;

                    if v < singular_beta {
                        extension = 1;
                        singular_quiet_lmr = !tt_capture;
                        if !pv_node
                            && v < singular_beta - self.params.double_ext_margin
                            && self.stack[ss].double_extensions <= self.params.double_ext_limit
                        {
                            extension = 2;
                            depth += (depth < 15) as i32;
                        }
                    } else if singular_beta >= beta {
                        // Multi-cut: several moves fail high without the table move
                        return singular_beta;
                    } else if tt_value >= beta {
                        extension = -2 - (!pv_node) as i32;
                    } else if cut_node {
                        extension = if depth < 19 { -2 } else { -1 };
                    } else if tt_value <= v {
                        extension = -1;
                    }
                } else if gives_check && depth > 9 {
                    extension = 1;
                } else if pv_node
                    && Some(m) == tt_move
                    && Some(m) == self.stack[ss].killers[0]
                    && self.hist.continuation.get(cont[0], pc, m.to) >= 4194
                {
                    extension = 1;
                }
            }

            new_depth += extension;
            self.stack[ss].double_extensions = self.stack[ss - 1].double_extensions + (extension == 2) as i32;

            // Step 16. Make the move
            self.stack[ss].current_move = Some(m);
            self.stack[ss].cont_hist = ContinuationHistory::key(in_check, capture, pc, m.to);
            self.make_move(m);

            // Adjust the reduction by the node's character
            if self.stack[ss].tt_pv && !likely_fail_low {
                r -= if cut_node && tt_depth >= depth + 3 { 3 } else { 2 };
            }
            if cut_node { r += 2; }
            if tt_capture { r += 1; }
            if singular_quiet_lmr { r -= 1; }
            if pv_node { r -= 1; }
            if self.stack[ss + 1].cutoff_cnt > 3 {
                r += 1;
            } else if Some(m) == tt_move {
                r = (r - 2).max(0);
            }

            let ch = &self.hist.continuation;
            let stat_score = 2 * self.hist.main.get(us, m)
                + ch.get(cont[0], pc, m.to)
                + ch.get(cont[1], pc, m.to)
                + ch.get(cont[3], pc, m.to)
                - 3848;
            self.stack[ss].stat_score = stat_score;
            r -= stat_score / (self.params.lmr_stat_div + 3855 * (depth > 5 && depth < 23) as i32);

            // Step 17. Late moves reduction
            if depth >= 2
                && move_count > 1 + root_node as i32
                && (!self.stack[ss].tt_pv || !capture || (cut_node && self.stack[ss - 1].move_count > 1))
            {
                let d = (new_depth - r).clamp(1, new_depth + 1);
                value = -self.search(NodeType::NonPv, ss + 1, -(alpha + 1), -alpha, d, true);

                if value > alpha && d < new_depth {
                    let do_deeper = value > best_value + 51 + 10 * (new_depth - d);
                    let do_shallower = value < best_value + new_depth;
                    new_depth += do_deeper as i32 - do_shallower as i32;

                    if new_depth > d {
                        value = -self.search(NodeType::NonPv, ss + 1, -(alpha + 1), -alpha, new_depth, !cut_node);
                    }
                    let bonus = if value <= alpha {
                        -self.stat_bonus(new_depth)
                    } else if value >= beta {
                        self.stat_bonus(new_depth)
                    } else {
                        0
                    };
                    self.update_continuation_histories(ss, pc, m.to, bonus);
                }
            } else if !pv_node || move_count > 1 {
                // Step 18. Full-depth search when LMR is skipped
                if tt_move.is_none() && cut_node { r += 2; }
                value = -self.search(NodeType::NonPv, ss + 1, -(alpha + 1), -alpha, new_depth - (r > 3) as i32, !cut_node);
            }

            // Full window search for the first move of a PV node and for
            // moves that beat alpha in the zero window search
            if pv_node && (move_count == 1 || (value > alpha && (root_node || value < beta))) {
                self.pv.clear(ply as usize + 1);
                if Some(m) == tt_move && ply <= self.root_depth * 2 { new_depth = new_depth.max(1); }
                value = -self.search(NodeType::Pv, ss + 1, -beta, -alpha, new_depth, false);
            }

            // Step 19. Undo move
            self.pos.undo_move();

            // Step 20. A stopped search leaves unreliable values behind
            if self.stopped() { return VALUE_ZERO; }

            if root_node {
                let child_pv: Vec<Move> = self.pv.line(1).to_vec();
                let sel_depth = self.sel_depth;
                let pv_idx = self.pv_idx;
                let mut changed = false;
                if let Some(rm) = self.root_moves.iter_mut().find(|rm| **rm == m) {
                    rm.average_score = if rm.average_score != -VALUE_INFINITE { (value + rm.average_score) / 2 } else { value };

                    if move_count == 1 || value > alpha {
                        rm.score = value;
                        rm.uci_score = value;
                        rm.sel_depth = sel_depth;
                        rm.score_lowerbound = false;
                        rm.score_upperbound = false;
                        if value >= beta {
                            rm.score_lowerbound = true;
                            rm.uci_score = beta;
                        } else if value <= alpha {
                            rm.score_upperbound = true;
                            rm.uci_score = alpha;
                        }
                        rm.pv.truncate(1);
                        rm.pv.extend_from_slice(&child_pv);
                        changed = move_count > 1 && pv_idx == 0;
                    } else {
                        // Keep the order of unsearched and failing moves stable
                        rm.score = -VALUE_INFINITE;
                    }
                }
                if changed { self.stats.best_move_changes.fetch_add(1, Ordering::Relaxed); }
            }

            if value > best_value {
                best_value = value;
                if value > alpha {
                    best_move = Some(m);
                    if pv_node && !root_node { self.pv.update(ply as usize, m); }

                    if value >= beta {
                        self.stack[ss].cutoff_cnt += 1 + tt_move.is_none() as i32;
                        break;
                    }
                    // Reduce the remaining moves once a good one is found
                    if depth > 2 && depth < 12 && beta < 13828 && value > -11369 { depth -= 2; }
                    alpha = value;
                }
            }

            if Some(m) != best_move && move_count <= 32 {
                if capture { captures_searched.push(m); } else { quiets_searched.push(m); }
            }
        }

        // Step 21. Checkmate and stalemate detection
        if move_count == 0 {
            best_value = if excluded.is_some() {
                alpha
            } else if in_check {
                mated_in(ply)
            } else {
                VALUE_DRAW
            };
        } else if let Some(bm) = best_move {
            self.update_all_stats(ss, bm, best_value, beta, &quiets_searched, &captures_searched, depth);
        } else if let Some((ppc, psq)) = prev {
            if !prior_capture {
                // Reward the previous move for refuting every reply
                let mult = (depth > 5) as i32
                    + (pv_node || cut_node) as i32
                    + (self.stack[ss - 1].stat_score < -14446) as i32
                    + (self.stack[ss - 1].move_count > 11) as i32;
                self.update_continuation_histories(ss - 1, ppc, psq, self.stat_bonus(depth) * mult);
            }
        }

        // A fail low that came out of a PV line keeps the pv marker for the future
        if best_value <= alpha {
            self.stack[ss].tt_pv = self.stack[ss].tt_pv || (self.stack[ss - 1].tt_pv && depth > 3);
        }

        if excluded.is_none() && !(root_node && self.pv_idx > 0) {
            let bound = if best_value >= beta {
                Bound::Lower
            } else if pv_node && best_move.is_some() {
                Bound::Exact
            } else {
                Bound::Upper
            };
            let tt_pv = self.stack[ss].tt_pv;
            self.tt.store(pos_key, value_to_tt(best_value, ply), tt_pv, bound, depth, best_move, unadjusted_eval);
        }

        // Teach the correction history how far the static eval was off
        let se = self.stack[ss].static_eval;
        if !in_check
            && se != VALUE_NONE
            && best_move.map_or(true, |m| !self.pos.is_capture(m))
            && !(best_value >= beta && best_value <= se)
            && !(best_move.is_none() && best_value >= se)
        {
            let bonus = ((best_value - se) * depth / 8).clamp(-CORRECTION_HISTORY_LIMIT / 4, CORRECTION_HISTORY_LIMIT / 4);
            let key = self.pos.pawn_key();
            self.hist.correction.update(us, key, bonus);
        }

        best_value
    }

    /// Quiescence search: only captures (plus checks on its first ply, or
    /// evasions when in check) until the position is quiet.
    pub(crate) fn qsearch(&mut self, nt: NodeType, ss: usize, mut alpha: Value, beta: Value, depth: Depth) -> Value {
        let pv_node = nt == NodeType::Pv;
        debug_assert!(depth <= 0);
        let ply = self.stack[ss].ply;
        let us = self.pos.side_to_move();

        if pv_node {
            self.pv.clear(ply as usize);
            if self.sel_depth < ply + 1 { self.sel_depth = ply + 1; }
        }

        let in_check = self.pos.in_check();
        self.stack[ss].in_check = in_check;
        self.stack[ss].move_count = 0;

        // Step 2. Immediate draw or maximum ply reached
        if self.pos.is_draw(ply) || ply >= MAX_PLY {
            return if ply >= MAX_PLY && !in_check { self.static_eval() } else { VALUE_DRAW };
        }

        // Checks are only searched at the first quiescence ply, which decides
        // the depth an entry is stored and trusted with.
        let tt_depth_qs = if in_check || depth >= DEPTH_QS_CHECKS { DEPTH_QS_CHECKS } else { DEPTH_QS_NO_CHECKS };

        // Step 3. Transposition table lookup
        let pos_key = self.pos.key();
        let tte = self.tt.probe(pos_key);
        let tt_value = tte.map_or(VALUE_NONE, |e| value_from_tt(e.value, ply, self.pos.rule50()));
        let tt_move = tte.and_then(|e| e.mv);
        let pv_hit = tte.map_or(false, |e| e.is_pv);

        if !pv_node
            && tte.map_or(false, |e| e.depth >= tt_depth_qs)
            && tt_value != VALUE_NONE
            && tte.map_or(false, |e| e.bound.includes(tt_value >= beta))
        {
            return tt_value;
        }

        // Step 4. Static evaluation
        let mut unadjusted_eval = VALUE_NONE;
        let mut best_value;
        let futility_base;
        if in_check {
            self.stack[ss].static_eval = VALUE_NONE;
            best_value = -VALUE_INFINITE;
            futility_base = -VALUE_INFINITE;
        } else {
            if let Some(e) = tte {
                unadjusted_eval = if e.eval == VALUE_NONE { self.static_eval() } else { e.eval };
                best_value = self.corrected_eval(unadjusted_eval);
                self.stack[ss].static_eval = best_value;
                if tt_value != VALUE_NONE && e.bound.includes(tt_value > best_value) { best_value = tt_value; }
            } else {
                unadjusted_eval = self.static_eval();
                best_value = self.corrected_eval(unadjusted_eval);
                self.stack[ss].static_eval = best_value;
            }

            // Stand pat
            if best_value >= beta {
                if tte.is_none() {
                    self.tt.store(pos_key, value_to_tt(best_value, ply), false, Bound::Lower, DEPTH_NONE, None, unadjusted_eval);
                }
                return best_value;
            }
            if best_value > alpha { alpha = best_value; }
            futility_base = self.stack[ss].static_eval + self.params.qs_futility_margin;
        }

        let prev_sq = self.stack[ss - 1].current_move.map(|m| m.to);
        let cont = self.cont_lookback(ss);
        let mut mp = MovePicker::new_qsearch(&self.pos, tt_move, depth, cont);
        let mut best_move = None;
        let mut move_count = 0;
        let mut quiet_check_evasions = 0;

        // Step 5. Loop through the moves until no moves remain or a beta cutoff occurs
        while let Some(m) = mp.next_move(&self.pos, &self.hist, false) {
            let gives_check = self.pos.gives_check(m);
            let capture = self.pos.is_capture_stage(m);
            let pc = piece_index(us, self.pos.moved_piece(m));
            move_count += 1;

            // Step 6. Pruning
            if best_value > VALUE_TB_LOSS_IN_MAX_PLY && self.pos.non_pawn_material(us) > 0 {
                if !gives_check && Some(m.to) != prev_sq && futility_base > VALUE_TB_LOSS_IN_MAX_PLY && m.promotion.is_none() {
                    if move_count > 2 { continue; }

                    let futility_value = futility_base + self.pos.captured_piece(m).map_or(0, piece_value);
                    if futility_value <= alpha {
                        best_value = best_value.max(futility_value);
                        continue;
                    }
                    if futility_base <= alpha && !self.pos.see_ge(m, 1) {
                        best_value = best_value.max(futility_base);
                        continue;
                    }
                    if futility_base > alpha && !self.pos.see_ge(m, (alpha - futility_base) * 4) {
                        best_value = alpha;
                        continue;
                    }
                }

                // At most two quiet check evasions
                if quiet_check_evasions > 1 { break; }

                let ch = &self.hist.continuation;
                if !capture && ch.get(cont[0], pc, m.to) < 0 && ch.get(cont[1], pc, m.to) < 0 { continue; }

                if !self.pos.see_ge(m, -90) { continue; }
            }

            quiet_check_evasions += (!capture && in_check) as i32;

            // Step 7. Make and search the move
            self.stack[ss].current_move = Some(m);
            self.stack[ss].cont_hist = ContinuationHistory::key(in_check, capture, pc, m.to);
            self.make_move(m);
            let value = -self.qsearch(nt, ss + 1, -beta, -alpha, depth - 1);
            self.pos.undo_move();

            // Step 8. Check for a new best move
            if value > best_value {
                best_value = value;
                if value > alpha {
                    best_move = Some(m);
                    if pv_node { self.pv.update(ply as usize, m); }
                    if value < beta { alpha = value; } else { break; }
                }
            }
        }

        // Step 9. All legal moves searched while in check: mate
        if in_check && best_value == -VALUE_INFINITE {
            debug_assert!(!self.pos.has_legal_moves());
            return mated_in(ply);
        }

        let bound = if best_value >= beta { Bound::Lower } else { Bound::Upper };
        self.tt.store(pos_key, value_to_tt(best_value, ply), pv_hit, bound, tt_depth_qs, best_move, unadjusted_eval);

        best_value
    }

    fn update_all_stats(
        &mut self,
        ss: usize,
        best_move: Move,
        best_value: Value,
        beta: Value,
        quiets_searched: &[Move],
        captures_searched: &[Move],
        depth: Depth,
    ) {
        let us = self.pos.side_to_move();
        let pc = piece_index(us, self.pos.moved_piece(best_move));
        let bonus = self.stat_bonus(depth + 1);

        if !self.pos.is_capture_stage(best_move) {
            let best_bonus = if best_value > beta + 168 { bonus } else { self.stat_bonus(depth) };
            self.update_quiet_stats(ss, best_move, best_bonus);
            let pawn_key = self.pos.pawn_key();
            self.hist.pawn.update(pawn_key, pc, best_move.to, best_bonus);

            for &q in quiets_searched {
                let qpc = piece_index(us, self.pos.moved_piece(q));
                self.hist.main.update(us, q, -best_bonus);
                self.hist.pawn.update(pawn_key, qpc, q.to, -best_bonus);
                self.update_continuation_histories(ss, qpc, q.to, -best_bonus);
            }
        } else {
            let captured = self.pos.captured_piece(best_move).unwrap_or(Piece::Pawn);
            self.hist.capture.update(pc, best_move.to, captured, bonus);
        }

        // Penalize an early quiet move of the previous ply that got refuted
        if let Some((ppc, psq)) = self.prev_move_info(ss) {
            let p = &self.stack[ss - 1];
            let early = p.move_count == 1 + p.tt_hit as i32 || p.current_move == p.killers[0];
            if early && self.pos.last_captured().is_none() {
                self.update_continuation_histories(ss - 1, ppc, psq, -bonus);
            }
        }

        for &c in captures_searched {
            let cpc = piece_index(us, self.pos.moved_piece(c));
            let captured = self.pos.captured_piece(c).unwrap_or(Piece::Pawn);
            self.hist.capture.update(cpc, c.to, captured, -bonus);
        }
    }

    pub(crate) fn update_quiet_stats(&mut self, ss: usize, m: Move, bonus: i32) {
        let frame = &mut self.stack[ss];
        if frame.killers[0] != Some(m) {
            frame.killers[1] = frame.killers[0];
            frame.killers[0] = Some(m);
        }

        let us = self.pos.side_to_move();
        let pc = piece_index(us, self.pos.moved_piece(m));
        self.hist.main.update(us, m, bonus);
        self.update_continuation_histories(ss, pc, m.to, bonus);

        if let Some((ppc, psq)) = self.prev_move_info(ss) {
            self.hist.counter_moves.set(ppc, psq, m);
        }
    }

    /// Updates the continuation tables of the moves 1, 2, 3, 4 and 6 plies
    /// before frame `ss` for a move of piece `pc` to `to`.
    pub(crate) fn update_continuation_histories(&mut self, ss: usize, pc: usize, to: Square, bonus: i32) {
        for i in [1usize, 2, 3, 4, 6] {
            // Only the closest moves are relevant when in check
            if self.stack[ss].in_check && i > 2 { break; }
            if self.stack[ss - i].current_move.is_some() {
                let key = self.stack[ss - i].cont_hist;
                self.hist.continuation.update(key, pc, to, bonus / (1 + 3 * (i == 3) as i32));
            }
        }
    }
}
