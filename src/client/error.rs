//! Model provider error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while invoking a language model. Fatal to the current turn.
#[derive(Debug, Error)]
pub enum ModelError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        error_type: Option<String>,
    },

    #[error("Rate limit exceeded{}", match retry_after {
        Some(d) => format!(", retry in {:.0}s", d.as_secs_f64()),
        None => String::new(),
    })]
    RateLimited { retry_after: Option<Duration> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed or interrupted response stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// No data arrived from the provider within the chunk timeout
    #[error("No response data within {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),
}

impl ModelError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::Http(_)
                | ModelError::Timeout(_)
                | ModelError::Api {
                    status: 500..=599,
                    ..
                }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ModelError::Api { status, .. } => Some(*status),
            ModelError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
