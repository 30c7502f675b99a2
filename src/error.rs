use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a search is already running")]
    SearchInProgress,
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("invalid value '{value}' for option {name}")]
    InvalidOption { name: String, value: String },
    #[error("failed to spawn search thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
