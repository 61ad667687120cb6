//! Core Error Types
//!
//! Errors surfaced to request-handling collaborators by the usage meter,
//! the rate limiter and the generation service.

use crate::generation::GeneratorError;
use crate::usage::Plan;

/// Error types for metering and generation operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The owner has used their monthly allowance
    #[error("Monthly quota exceeded: {used}/{limit} generations used on the {plan} plan")]
    QuotaExceeded { plan: Plan, used: u32, limit: u32 },

    /// Too many requests in the current window
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The usage store could not be reached
    #[error("Failed to {operation}: {reason}")]
    PersistenceUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// The language-model provider failed
    #[error("Generation failed: {0}")]
    Generation(#[from] GeneratorError),

    /// The request was rejected before reaching the provider
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CoreError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::QuotaExceeded { .. } => "quota_exceeded",
            CoreError::RateLimited { .. } => "rate_limited",
            CoreError::PersistenceUnavailable { .. } => "persistence_unavailable",
            CoreError::Generation(_) => "generation_failed",
            CoreError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_message() {
        let err = CoreError::QuotaExceeded {
            plan: Plan::Free,
            used: 10,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "Monthly quota exceeded: 10/10 generations used on the free plan"
        );
        assert_eq!(err.code(), "quota_exceeded");
    }

    #[test]
    fn test_persistence_message() {
        let err = CoreError::PersistenceUnavailable {
            operation: "fetch usage",
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to fetch usage: connection refused");
        assert_eq!(err.code(), "persistence_unavailable");
    }
}
