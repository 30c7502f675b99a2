// Lazy SMP alpha-beta chess engine core
pub mod bench;
pub mod board;
pub mod error;
pub mod options;
pub mod perft;
pub mod search;
pub mod uci;

pub use error::{EngineError, Result};
pub use options::EngineOptions;
