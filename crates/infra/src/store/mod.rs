//! SQLite-backed repositories.
//!
//! [`SqlRbacStore`] implements all three repository traits over one pool.
//! Single statements run on a pooled connection; `replace_*` and cascading
//! `delete` run in a transaction that rolls back on the first failure (or
//! when the calling future is dropped).

mod entity;
mod permissions;
mod pivot;
mod roles;
mod users;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use rolegate_core::{AccessResult, IdPage, Pagination};

use crate::error::{finish, map_sqlx_error};
use pivot::Pivot;

/// Roles, permissions and the three pivots in SQLite.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; cloning the store
/// clones the pool handle.
#[derive(Debug, Clone)]
pub struct SqlRbacStore {
    pool: SqlitePool,
}

impl SqlRbacStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn acquire(&self, operation: &'static str) -> AccessResult<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn add_pairs(&self, pivot: Pivot, operation: &'static str, owner: i64, related: &[i64]) -> AccessResult<()> {
        if related.is_empty() {
            return Ok(());
        }
        let mut conn = self.acquire(operation).await?;
        pivot
            .insert(&mut conn, owner, related)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Delete-all then insert, atomically.
    async fn replace_pairs(&self, pivot: Pivot, operation: &'static str, owner: i64, related: &[i64]) -> AccessResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let outcome = async {
            let removed = pivot.delete_owner(&mut tx, owner).await?;
            pivot.insert(&mut tx, owner, related).await?;
            Ok::<_, sqlx::Error>(removed)
        }
        .await;

        let removed = finish(tx, operation, outcome).await?;
        debug!(table = pivot.table, owner, removed, inserted = related.len(), "pivot replaced");
        Ok(())
    }

    async fn remove_pairs(&self, pivot: Pivot, operation: &'static str, owner: i64, related: &[i64]) -> AccessResult<()> {
        let mut conn = self.acquire(operation).await?;
        pivot
            .delete_pairs(&mut conn, owner, related)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }

    async fn clear_pairs(&self, pivot: Pivot, operation: &'static str, owner: i64) -> AccessResult<()> {
        let mut conn = self.acquire(operation).await?;
        pivot
            .delete_owner(&mut conn, owner)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }

    async fn count_pairs(&self, pivot: Pivot, operation: &'static str, owners: &[i64], related: &[i64]) -> AccessResult<u64> {
        let mut conn = self.acquire(operation).await?;
        pivot
            .count(&mut conn, owners, related)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn related_page<I: From<u64>>(
        &self,
        pivot: Pivot,
        operation: &'static str,
        owners: &[i64],
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<I>> {
        let mut conn = self.acquire(operation).await?;
        let (ids, total) = pivot
            .related_of(&mut conn, owners, pagination)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(IdPage::new(ids.into_iter().map(|id| I::from(id as u64)).collect(), total))
    }
}
