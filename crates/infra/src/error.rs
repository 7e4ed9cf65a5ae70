//! SQLx → `AccessError` mapping.
//!
//! | SQLx error | AccessError |
//! |------------|-------------|
//! | Database (any code) | `Storage` with the driver message |
//! | PoolClosed / PoolTimedOut | `Storage` |
//! | RowNotFound | `Storage` (queries use `fetch_optional`) |
//! | anything inside a failed transaction | `TransactionAborted` |

use sqlx::{Sqlite, Transaction};
use tracing::{error, warn};

use rolegate_core::{AccessError, AccessResult};

pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> AccessError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = match db_err.code() {
                Some(code) => format!("database error {}: {}", code, db_err.message()),
                None => format!("database error: {}", db_err.message()),
            };
            AccessError::storage(operation, message)
        }
        sqlx::Error::PoolClosed => AccessError::storage(operation, "connection pool closed"),
        sqlx::Error::PoolTimedOut => AccessError::storage(operation, "timed out acquiring a connection"),
        sqlx::Error::RowNotFound => AccessError::storage(operation, "unexpected row not found"),
        other => AccessError::storage(operation, format!("sqlx error: {other}")),
    }
}

/// Commit on success, roll back on failure.
///
/// Any failure (including the commit itself) surfaces as
/// `TransactionAborted`.
pub(crate) async fn finish<T>(
    tx: Transaction<'_, Sqlite>,
    operation: &'static str,
    outcome: Result<T, sqlx::Error>,
) -> AccessResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| AccessError::aborted(operation, format!("commit failed: {e}")))?;
            Ok(value)
        }
        Err(err) => {
            warn!(operation, error = %err, "rolling back transaction");
            if let Err(rollback_err) = tx.rollback().await {
                error!(operation, error = %rollback_err, "rollback failed");
            }
            Err(AccessError::aborted(operation, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_become_storage_errors() {
        let err = map_sqlx_error("roles.get_ids", sqlx::Error::PoolClosed);
        assert_eq!(err, AccessError::storage("roles.get_ids", "connection pool closed"));
    }
}
