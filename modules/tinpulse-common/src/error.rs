use thiserror::Error;

/// Result type alias for tinpulse operations.
pub type Result<T> = std::result::Result<T, TinPulseError>;

#[derive(Debug, Error)]
pub enum TinPulseError {
    /// Bad input from the caller. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced entity does not exist. Distinct from Validation so
    /// callers can tell bad input from stale state.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state-machine transition was attempted from a terminal state
    /// (e.g. submitting a label against an already-labeled queue item).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Underlying store unavailable or conflicting. Transient; batch
    /// callers retry with backoff, interactive callers fail fast.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The batch LLM annotator misbehaved. Never fatal to scoring.
    #[error("annotator error: {0}")]
    Annotator(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TinPulseError {
    /// True for failures that are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, TinPulseError::Database(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TinPulseError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TinPulseError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        TinPulseError::InvalidState(msg.into())
    }
}
