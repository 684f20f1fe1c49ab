use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or contradictory input. Rejected immediately, never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Price history for the evaluation window has not been published yet.
    /// Transient: callers should retry later without alarm.
    #[error("Price data not yet available: {0}")]
    DataUnavailable(String),

    /// The evaluation window has fully passed and no price history exists
    /// for it. Retrying will not help; the candle backlog needs attention.
    #[error("Price data missing: {0}")]
    DataMissing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
