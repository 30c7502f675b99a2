use serde::{Deserialize, Serialize};

/// Tunable search constants. Every pruning, reduction and extension margin
/// the search uses is read from here so that tuning runs can load them from
/// a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    // Aspiration windows
    pub asp_delta_base: i32,
    pub asp_delta_div: i32,
    pub asp_widen_div: i32,
    pub optimism_num: i32,
    pub optimism_add: i32,

    // Late move reductions
    pub lmr_scale: f64,
    pub lmr_offset: i32,
    pub lmr_delta_mul: i32,
    pub lmr_stat_div: i32,

    // Whole-node pruning
    pub razor_base: i32,
    pub razor_depth_sq: i32,
    pub rfp_max_depth: i32,
    pub rfp_margin: i32,
    pub nmp_depth_margin: i32,
    pub nmp_static_base: i32,
    pub nmp_base: i32,
    pub nmp_eval_div: i32,
    pub nmp_verify_depth: i32,
    pub probcut_margin: i32,
    pub iir_depth: i32,

    // Move-loop pruning
    pub lmp_base: i32,
    pub futility_base: i32,
    pub futility_mul: i32,
    pub see_quiet_mul: i32,
    pub see_capture_mul: i32,
    pub cont_hist_prune_mul: i32,
    pub qs_futility_margin: i32,

    // Extensions
    pub singular_min_depth: i32,
    pub singular_beta_base: i32,
    pub double_ext_margin: i32,
    pub double_ext_limit: i32,

    // History
    pub history_bonus_mul: i32,
    pub history_bonus_sub: i32,
    pub history_bonus_max: i32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            asp_delta_base: 10,
            asp_delta_div: 15335,
            asp_widen_div: 3,
            optimism_num: 110,
            optimism_add: 121,

            lmr_scale: 20.37,
            lmr_offset: 1487,
            lmr_delta_mul: 976,
            lmr_stat_div: 10216,

            razor_base: 474,
            razor_depth_sq: 270,
            rfp_max_depth: 9,
            rfp_margin: 140,
            nmp_depth_margin: 21,
            nmp_static_base: 312,
            nmp_base: 4,
            nmp_eval_div: 173,
            nmp_verify_depth: 14,
            probcut_margin: 168,
            iir_depth: 4,

            lmp_base: 3,
            futility_base: 115,
            futility_mul: 122,
            see_quiet_mul: 27,
            see_capture_mul: 185,
            cont_hist_prune_mul: 3645,
            qs_futility_margin: 200,

            singular_min_depth: 4,
            singular_beta_base: 64,
            double_ext_margin: 18,
            double_ext_limit: 11,

            history_bonus_mul: 334,
            history_bonus_sub: 360,
            history_bonus_max: 1633,
        }
    }
}

impl SearchParams {
    /// Clamps every divisor and window size to a usable value. Tuning files
    /// may contain anything.
    pub fn sanitized(mut self) -> Self {
        self.asp_delta_base = self.asp_delta_base.max(1);
        self.asp_delta_div = self.asp_delta_div.max(1);
        self.asp_widen_div = self.asp_widen_div.max(1);
        self.optimism_add = self.optimism_add.max(1);
        self.lmr_stat_div = self.lmr_stat_div.max(1);
        self.nmp_eval_div = self.nmp_eval_div.max(1);
        self.history_bonus_max = self.history_bonus_max.max(0);
        self
    }

    pub fn stat_bonus(&self, depth: i32) -> i32 {
        (self.history_bonus_mul * depth - self.history_bonus_sub).clamp(0, self.history_bonus_max)
    }

    pub fn futility_margin(&self, depth: i32, no_tt_cut_node: bool, improving: bool) -> i32 {
        let m = self.rfp_margin - 22 * no_tt_cut_node as i32;
        m * (depth - improving as i32)
    }

    pub fn futility_move_count(&self, improving: bool, depth: i32) -> i32 {
        if improving { self.lmp_base + depth * depth } else { (self.lmp_base + depth * depth) / 2 }
    }
}
