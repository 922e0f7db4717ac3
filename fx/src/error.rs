//! FX error types.

use std::time::Duration;

use pocketbook_common::PocketbookError;
use thiserror::Error;

/// Errors that can occur while obtaining exchange rates.
///
/// Only [`FxError::RateSourceUnavailable`] ever leaves the rate cache; the
/// other variants describe why a single fetch failed.
#[derive(Debug, Error)]
pub enum FxError {
    /// The remote fetch failed and there is no cached table of any age.
    #[error("Rate source unavailable: {0}")]
    RateSourceUnavailable(String),

    /// Transport or HTTP status failure while talking to the source.
    #[error("Rate source {source_name} fetch failed: {message}")]
    Fetch { source_name: String, message: String },

    /// The source did not answer within the fetch timeout.
    #[error("Rate source {source_name} timed out after {after:?}")]
    Timeout { source_name: String, after: Duration },

    /// The source answered with a body we could not decode.
    #[error("Rate source {source_name} returned a malformed response: {message}")]
    MalformedResponse { source_name: String, message: String },
}

impl FxError {
    pub(crate) fn fetch(source_name: &str, message: impl ToString) -> Self {
        FxError::Fetch {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn malformed(source_name: &str, message: impl ToString) -> Self {
        FxError::MalformedResponse {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<FxError> for PocketbookError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::RateSourceUnavailable(reason) => PocketbookError::RateSourceUnavailable(reason),
            other => PocketbookError::RateSourceUnavailable(other.to_string()),
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
