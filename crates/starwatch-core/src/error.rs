//! Starwatch error type.

use chrono::{DateTime, Utc};

/// Workspace-wide error.
#[derive(Debug, thiserror::Error)]
pub enum StarwatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// External API refused the call until `reset_at`.
    #[error("Rate limited{}", .reset_at.map(|t| format!(" until {}", t.to_rfc3339())).unwrap_or_default())]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StarwatchError {
    /// Whether a later attempt may succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StarwatchError::RateLimited { .. } | StarwatchError::Transient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StarwatchError>;
