use thiserror::Error;

/// Errors raised by the plumbing around the signal engine.
///
/// The decision path itself never fails; these cover configuration,
/// the trade journal, state recovery, simulated fills and backtests.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to access trade journal: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize trade journal: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Position rejected: {0}")]
    Position(String),

    #[error("Cannot recover position state: {0}")]
    Recovery(String),

    #[error("Fill rejected: {0}")]
    Fill(String),

    #[error("Backtest failed: {0}")]
    Backtest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
