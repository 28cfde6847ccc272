//! Domain error types.

use chrono::NaiveDate;

use crate::domain::optimizer::OptimizationError;
use crate::domain::universe::UniverseError;

/// Top-level error type for folio.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("price data error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("no price data returned for: {}", tickers.join(", "))]
    MismatchedUniverse { tickers: Vec<String> },

    #[error("insufficient price history: have {rows} rows, need at least {minimum}")]
    InsufficientData { rows: usize, minimum: usize },

    #[error("optimization failed for window ending {window_end}: {source}")]
    OptimizationFailure {
        window_end: NaiveDate,
        #[source]
        source: OptimizationError,
    },

    #[error("backtest cancelled after {completed} windows")]
    Cancelled { completed: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&FolioError> for std::process::ExitCode {
    fn from(err: &FolioError) -> Self {
        let code: u8 = match err {
            FolioError::Io(_) | FolioError::InvalidSeries { .. } => 1,
            FolioError::ConfigParse { .. }
            | FolioError::ConfigMissing { .. }
            | FolioError::ConfigInvalid { .. }
            | FolioError::Universe(_) => 2,
            FolioError::DataSource { .. } => 3,
            FolioError::OptimizationFailure { .. } => 4,
            FolioError::MismatchedUniverse { .. } | FolioError::InsufficientData { .. } => 5,
            FolioError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
