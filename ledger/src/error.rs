//! Ledger error types.

use pocketbook_common::PocketbookError;
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// The entity does not exist or belongs to another user.
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// No budget is set for the category.
    #[error("Budget for category \"{0}\" not found")]
    CategoryNotFound(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// Amount must be strictly positive.
    #[error("Amount must be positive")]
    NonPositiveAmount,

    /// Adding to a pot would take its total over the target.
    #[error("Total cannot exceed target")]
    ExceedsTarget,

    /// Withdrawing more than a pot holds.
    #[error("Insufficient funds in pot")]
    InsufficientFunds,

    /// Other invalid input.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<LedgerError> for PocketbookError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { entity, id } => PocketbookError::NotFound { entity, id },
            LedgerError::CategoryNotFound(category) => PocketbookError::NotFound {
                entity: "Budget",
                id: category,
            },
            LedgerError::Conflict(message) => PocketbookError::Conflict(message),
            other => PocketbookError::Validation(other.to_string()),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
