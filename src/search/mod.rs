//! Lazy SMP alpha-beta search: per-thread workers sharing one lockless
//! transposition table, coordinated by a [`pool::ThreadPool`].

pub mod alphabeta;
pub mod eval;
pub mod history;
pub mod limits;
pub mod movepick;
pub mod params;
pub mod pool;
pub mod report;
pub mod root_move;
pub mod see;
pub mod stack;
pub mod thread;
pub mod time;
pub mod tt;
pub mod value;
pub mod worker;
pub mod zobrist;

pub use limits::Limits;
pub use params::SearchParams;
pub use pool::ThreadPool;
pub use report::{IterationInfo, Score, ScoreBound, SearchListener, SearchOutcome, SilentListener};
pub use root_move::RootMove;
pub use tt::{Bound, TranspositionTable};

/// Kind of node being searched. Root and PV nodes use a full window;
/// non-PV nodes are searched with a null window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Pv,
    NonPv,
}
