use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Invalid forecast request: {0}")]
    InvalidRequest(String),

    #[error("Forecast upstream failed: {0}")]
    Upstream(String),

    #[error("Forecast upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not decode forecast response: {0}")]
    Decode(String),
}

impl ForecastError {
    /// Only request errors are the caller's fault; everything else may be papered over with mock data.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ForecastError::InvalidRequest(_))
    }
}

/// Why a history file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed history row: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid history row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("History file contains no samples")]
    Empty,
}
