//! Error model shared by every layer of the access-control core.

use thiserror::Error;

/// Result type used across the access-control core.
pub type AccessResult<T> = Result<T, AccessError>;

/// Access-control error.
///
/// Every repository and engine call surfaces the first of these it encounters.
/// There is no partial-success shape: a failed call yields an error and nothing
/// else.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// A single-entity lookup found no row.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// An identifier shape the resolver does not recognize (mixed lists,
    /// booleans, floats, nested values, ...).
    #[error("unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    /// Underlying storage/driver failure, opaque beyond its kind.
    #[error("storage failure in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// A multi-step mutation failed and was rolled back.
    #[error("transaction aborted in {operation}: {message}")]
    TransactionAborted {
        operation: &'static str,
        message: String,
    },
}

impl AccessError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedInputKind(detail.into())
    }

    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn aborted(operation: &'static str, message: impl Into<String>) -> Self {
        Self::TransactionAborted {
            operation,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
