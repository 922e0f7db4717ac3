//! Error types shared across Pocketbook crates.

use thiserror::Error;

/// Top-level error type for Pocketbook operations.
///
/// Crate-local errors (`FxError`, `LedgerError`) convert into this one at the
/// edge where a caller needs a single error code.
#[derive(Error, Debug)]
pub enum PocketbookError {
    /// Entity not found for the requesting user.
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input rejected by a business rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No exchange rate table could be obtained at all.
    #[error("Exchange rate source unavailable: {0}")]
    RateSourceUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PocketbookError {
    /// Check if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PocketbookError::RateSourceUnavailable(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            PocketbookError::NotFound { .. } => "NOT_FOUND",
            PocketbookError::Conflict(_) => "CONFLICT",
            PocketbookError::Validation(_) => "BAD_REQUEST",
            PocketbookError::RateSourceUnavailable(_) => "RATE_SOURCE_UNAVAILABLE",
            PocketbookError::Configuration(_) => "CONFIGURATION_ERROR",
            PocketbookError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for Pocketbook operations.
pub type Result<T> = std::result::Result<T, PocketbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PocketbookError::NotFound {
            entity: "Pot",
            id: "42".to_string(),
        };
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "Pot with ID 42 not found");
        assert!(!err.is_retryable());

        let err = PocketbookError::RateSourceUnavailable("timeout".to_string());
        assert_eq!(err.error_code(), "RATE_SOURCE_UNAVAILABLE");
        assert!(err.is_retryable());
    }
}
