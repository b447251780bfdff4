// src/infra/errors.rs — Error types for flockmirror

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlockError {
    // Gateway errors (possibly retriable by a later cycle)
    #[error("Gateway error: {message}")]
    Gateway { message: String, retriable: bool },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("User '@{handle}' not found")]
    UserNotFound { handle: String },

    // Preconditions
    #[error("No authenticated session available")]
    NoSession,
}

impl FlockError {
    /// Whether a later cycle could reasonably succeed where this call failed.
    /// No call is retried within a cycle; the next scheduled cycle is the
    /// only retry path.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            FlockError::RateLimited { .. } | FlockError::Gateway { retriable: true, .. }
        )
    }
}
