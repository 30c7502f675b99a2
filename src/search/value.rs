//! Score and depth arithmetic shared by the search, the transposition table
//! and the protocol layer.

pub type Value = i32;
pub type Depth = i32;

pub const MAX_PLY: i32 = 128;
pub const MAX_MOVES: usize = 256;

pub const VALUE_ZERO: Value = 0;
pub const VALUE_DRAW: Value = 0;
pub const VALUE_MATE: Value = 32000;
pub const VALUE_INFINITE: Value = 32001;
pub const VALUE_NONE: Value = 32002;

pub const VALUE_TB: Value = VALUE_MATE - MAX_PLY - 1;
pub const VALUE_TB_WIN_IN_MAX_PLY: Value = VALUE_TB - MAX_PLY;
pub const VALUE_TB_LOSS_IN_MAX_PLY: Value = -VALUE_TB_WIN_IN_MAX_PLY;
pub const VALUE_MATE_IN_MAX_PLY: Value = VALUE_MATE - MAX_PLY;
pub const VALUE_MATED_IN_MAX_PLY: Value = -VALUE_MATE_IN_MAX_PLY;

pub const PAWN_VALUE: Value = 208;

// Quiescence depths: checks are generated only at the first qsearch ply.
pub const DEPTH_QS_CHECKS: Depth = 0;
pub const DEPTH_QS_NO_CHECKS: Depth = -1;
// Entries with this depth mark "static eval only" TT writes.
pub const DEPTH_NONE: Depth = -6;
pub const DEPTH_OFFSET: Depth = -7;

#[inline]
pub fn mate_in(ply: i32) -> Value { VALUE_MATE - ply }

#[inline]
pub fn mated_in(ply: i32) -> Value { -VALUE_MATE + ply }

#[inline]
pub fn is_decisive(v: Value) -> bool { v.abs() >= VALUE_TB_WIN_IN_MAX_PLY }

/// Adds a small node-count dependent jitter to draw scores to avoid
/// three-fold blindness.
#[inline]
pub fn value_draw(nodes: u64) -> Value { VALUE_DRAW - 1 + (nodes & 0x2) as Value }

/// Converts a root-relative mate or TB score into a node-relative one
/// before it is written to the transposition table.
pub fn value_to_tt(v: Value, ply: i32) -> Value {
    debug_assert!(v != VALUE_NONE);
    if v >= VALUE_TB_WIN_IN_MAX_PLY { v + ply }
    else if v <= VALUE_TB_LOSS_IN_MAX_PLY { v - ply }
    else { v }
}

/// Inverse of [`value_to_tt`]. Mate scores that cannot be reached before
/// the fifty-move rule kicks in are downgraded to a non-mate bound.
pub fn value_from_tt(v: Value, ply: i32, rule50: i32) -> Value {
    if v == VALUE_NONE { return VALUE_NONE; }

    if v >= VALUE_TB_WIN_IN_MAX_PLY {
        // Downgrade a potentially false mate score
        if v >= VALUE_MATE_IN_MAX_PLY && VALUE_MATE - v > 100 - rule50 {
            return VALUE_MATE_IN_MAX_PLY - 1;
        }
        // Downgrade a potentially false TB score
        if VALUE_TB - v > 100 - rule50 {
            return VALUE_TB_WIN_IN_MAX_PLY - 1;
        }
        return v - ply;
    }

    if v <= VALUE_TB_LOSS_IN_MAX_PLY {
        if v <= VALUE_MATED_IN_MAX_PLY && VALUE_MATE + v > 100 - rule50 {
            return VALUE_MATED_IN_MAX_PLY + 1;
        }
        if VALUE_TB + v > 100 - rule50 {
            return VALUE_TB_LOSS_IN_MAX_PLY + 1;
        }
        return v + ply;
    }

    v
}

/// Centipawn conversion used for protocol output.
#[inline]
pub fn to_cp(v: Value) -> i32 { 100 * v / PAWN_VALUE }
