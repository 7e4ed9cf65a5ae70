//! Shared SQL for the three pivot tables.
//!
//! Every pivot is `(owner, related)` with a composite primary key. Callers
//! pass a connection so the same helpers run inside or outside a transaction.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use rolegate_core::Pagination;

/// Largest number of pairs bound in one INSERT.
const INSERT_CHUNK: usize = 400;

/// Largest number of ids bound in one `IN (...)` list. Two lists of this size
/// stay under SQLite's default limit of 999 bound variables.
pub(crate) const IN_LIST_CHUNK: usize = 400;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Pivot {
    pub table: &'static str,
    pub owner: &'static str,
    pub related: &'static str,
}

pub(crate) const ROLE_PERMISSIONS: Pivot = Pivot {
    table: "role_permissions",
    owner: "role_id",
    related: "permission_id",
};

pub(crate) const USER_ROLES: Pivot = Pivot {
    table: "user_roles",
    owner: "user_id",
    related: "role_id",
};

pub(crate) const USER_PERMISSIONS: Pivot = Pivot {
    table: "user_permissions",
    owner: "user_id",
    related: "permission_id",
};

/// Sort and deduplicate ids before they are counted or bound.
pub(crate) fn distinct(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn push_in_list(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[i64]) {
    builder.push(column).push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

impl Pivot {
    /// Insert-if-absent for every `(owner, related)` pair.
    pub async fn insert(&self, conn: &mut SqliteConnection, owner: i64, related: &[i64]) -> Result<(), sqlx::Error> {
        for chunk in related.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "INSERT INTO {} ({}, {}) ",
                self.table, self.owner, self.related
            ));
            builder.push_values(chunk, |mut row, id| {
                row.push_bind(owner).push_bind(*id);
            });
            builder.push(" ON CONFLICT DO NOTHING");
            builder.build().execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Delete every pair owned by `owner`.
    pub async fn delete_owner(&self, conn: &mut SqliteConnection, owner: i64) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, self.owner);
        let done = sqlx::query(&sql).bind(owner).execute(&mut *conn).await?;
        Ok(done.rows_affected())
    }

    /// Delete every pair pointing at `related`.
    pub async fn delete_related(&self, conn: &mut SqliteConnection, related: i64) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, self.related);
        let done = sqlx::query(&sql).bind(related).execute(&mut *conn).await?;
        Ok(done.rows_affected())
    }

    /// Delete exactly the given pairs; absent pairs are ignored.
    pub async fn delete_pairs(&self, conn: &mut SqliteConnection, owner: i64, related: &[i64]) -> Result<u64, sqlx::Error> {
        let mut deleted = 0;
        for chunk in related.chunks(IN_LIST_CHUNK) {
            let mut builder =
                QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE {} = ", self.table, self.owner));
            builder.push_bind(owner).push(" AND ");
            push_in_list(&mut builder, self.related, chunk);
            deleted += builder.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(deleted)
    }

    /// Pairs with an owner in `owners` and a related id in `related`.
    ///
    /// Both lists must be free of duplicates; per-chunk counts are summed.
    pub async fn count(&self, conn: &mut SqliteConnection, owners: &[i64], related: &[i64]) -> Result<u64, sqlx::Error> {
        let mut total = 0;
        for owner_chunk in owners.chunks(IN_LIST_CHUNK) {
            for related_chunk in related.chunks(IN_LIST_CHUNK) {
                let mut builder =
                    QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) AS n FROM {} WHERE ", self.table));
                push_in_list(&mut builder, self.owner, owner_chunk);
                builder.push(" AND ");
                push_in_list(&mut builder, self.related, related_chunk);
                let n: i64 = builder.build().fetch_one(&mut *conn).await?.try_get("n")?;
                total += n as u64;
            }
        }
        Ok(total)
    }

    /// Distinct related ids of `owners`, ordered, plus the unpaginated total.
    pub async fn related_of(
        &self,
        conn: &mut SqliteConnection,
        owners: &[i64],
        pagination: Option<Pagination>,
    ) -> Result<(Vec<i64>, u64), sqlx::Error> {
        self.project(conn, self.related, self.owner, owners, pagination).await
    }

    /// Owner ids pointing at `related`, ordered, plus the unpaginated total.
    pub async fn owners_of(
        &self,
        conn: &mut SqliteConnection,
        related: i64,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<i64>, u64), sqlx::Error> {
        self.project(conn, self.owner, self.related, &[related], pagination).await
    }

    async fn project(
        &self,
        conn: &mut SqliteConnection,
        select: &str,
        filter: &str,
        keys: &[i64],
        pagination: Option<Pagination>,
    ) -> Result<(Vec<i64>, u64), sqlx::Error> {
        if keys.is_empty() {
            return Ok((Vec::new(), 0));
        }
        if keys.len() > IN_LIST_CHUNK {
            return self.project_chunked(conn, select, filter, keys, pagination).await;
        }

        let mut count = QueryBuilder::<Sqlite>::new(format!(
            "SELECT COUNT(DISTINCT {select}) AS n FROM {} WHERE ",
            self.table
        ));
        push_in_list(&mut count, filter, keys);
        let total: i64 = count.build().fetch_one(&mut *conn).await?.try_get("n")?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT DISTINCT {select} AS id FROM {} WHERE ", self.table));
        push_in_list(&mut query, filter, keys);
        query.push(format!(" ORDER BY {select}"));
        if let Some(p) = pagination {
            query
                .push(" LIMIT ")
                .push_bind(i64::from(p.limit()))
                .push(" OFFSET ")
                .push_bind(p.offset() as i64);
        }

        let ids = query
            .build()
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((ids, total as u64))
    }

    /// Key lists too long for one statement: merge every chunk, then page.
    async fn project_chunked(
        &self,
        conn: &mut SqliteConnection,
        select: &str,
        filter: &str,
        keys: &[i64],
        pagination: Option<Pagination>,
    ) -> Result<(Vec<i64>, u64), sqlx::Error> {
        let mut merged = BTreeSet::new();
        for chunk in keys.chunks(IN_LIST_CHUNK) {
            let mut query =
                QueryBuilder::<Sqlite>::new(format!("SELECT DISTINCT {select} AS id FROM {} WHERE ", self.table));
            push_in_list(&mut query, filter, chunk);
            for row in query.build().fetch_all(&mut *conn).await? {
                merged.insert(row.try_get::<i64, _>("id")?);
            }
        }

        let ids: Vec<i64> = merged.into_iter().collect();
        let total = ids.len() as u64;
        let ids = match pagination {
            Some(p) => p.slice(&ids),
            None => ids,
        };
        Ok((ids, total))
    }
}
