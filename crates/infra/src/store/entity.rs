//! Row access shared by the `roles` and `permissions` tables.
//!
//! Both tables carry the same columns, so one set of queries serves both;
//! the repositories convert [`EntityRow`] into their own model.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use rolegate_auth::{Changes, NewPermission, NewRole, Permission, Role};
use rolegate_core::{GuardName, Pagination, PermissionId, RoleId};

use super::pivot::IN_LIST_CHUNK;

const COLUMNS: &str = "id, name, guard_name, description, created_at, updated_at";

#[derive(Debug)]
pub(crate) struct EntityRow {
    id: i64,
    name: String,
    guard_name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for EntityRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntityRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            guard_name: row.try_get("guard_name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<EntityRow> for Permission {
    fn from(row: EntityRow) -> Self {
        Permission {
            id: PermissionId::from_i64(row.id),
            name: row.name,
            guard_name: GuardName::from_display(&row.guard_name),
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<EntityRow> for Role {
    fn from(row: EntityRow) -> Self {
        Role {
            id: RoleId::from_i64(row.id),
            name: row.name,
            guard_name: GuardName::from_display(&row.guard_name),
            description: row.description,
            permissions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields written by find-or-create.
pub(crate) struct NewEntity<'a> {
    pub name: &'a str,
    pub guard_name: &'a GuardName,
    pub description: Option<&'a str>,
}

impl<'a> From<&'a NewPermission> for NewEntity<'a> {
    fn from(new: &'a NewPermission) -> Self {
        Self {
            name: &new.name,
            guard_name: &new.guard_name,
            description: new.description.as_deref(),
        }
    }
}

impl<'a> From<&'a NewRole> for NewEntity<'a> {
    fn from(new: &'a NewRole) -> Self {
        Self {
            name: &new.name,
            guard_name: &new.guard_name,
            description: new.description.as_deref(),
        }
    }
}

fn decode(rows: Vec<SqliteRow>) -> Result<Vec<EntityRow>, sqlx::Error> {
    rows.iter().map(|row| EntityRow::from_row(row)).collect()
}

/// Sort merged chunk results by id, dropping repeats.
fn ordered(mut rows: Vec<EntityRow>) -> Vec<EntityRow> {
    rows.sort_unstable_by_key(|row| row.id);
    rows.dedup_by_key(|row| row.id);
    rows
}

/// One of the two entity tables.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityTable(pub &'static str);

pub(crate) const PERMISSIONS: EntityTable = EntityTable("permissions");
pub(crate) const ROLES: EntityTable = EntityTable("roles");

impl EntityTable {
    pub async fn by_id(&self, pool: &SqlitePool, id: i64) -> Result<Option<EntityRow>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = ?", self.0);
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
        row.map(|r| EntityRow::from_row(&r)).transpose()
    }

    pub async fn by_guard_name(&self, pool: &SqlitePool, guard_name: &GuardName) -> Result<Option<EntityRow>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE guard_name = ?", self.0);
        let row = sqlx::query(&sql)
            .bind(guard_name.as_str())
            .fetch_optional(pool)
            .await?;
        row.map(|r| EntityRow::from_row(&r)).transpose()
    }

    /// Rows for `ids`, ordered by id. Long lists are fetched in chunks.
    pub async fn many_by_ids(&self, pool: &SqlitePool, ids: &[i64]) -> Result<Vec<EntityRow>, sqlx::Error> {
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM {} WHERE id IN (", self.0));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            rows.extend(decode(builder.build().fetch_all(pool).await?)?);
        }
        Ok(ordered(rows))
    }

    pub async fn many_by_guard_names(&self, pool: &SqlitePool, names: &[GuardName]) -> Result<Vec<EntityRow>, sqlx::Error> {
        let mut rows = Vec::with_capacity(names.len());
        for chunk in names.chunks(IN_LIST_CHUNK) {
            let mut builder =
                QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM {} WHERE guard_name IN (", self.0));
            let mut separated = builder.separated(", ");
            for name in chunk {
                separated.push_bind(name.as_str().to_string());
            }
            separated.push_unseparated(")");
            rows.extend(decode(builder.build().fetch_all(pool).await?)?);
        }
        Ok(ordered(rows))
    }

    /// Every id, ordered, plus the total row count.
    pub async fn ids(&self, pool: &SqlitePool, pagination: Option<Pagination>) -> Result<(Vec<i64>, u64), sqlx::Error> {
        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.0))
            .fetch_one(pool)
            .await?
            .try_get("n")?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} ORDER BY id", self.0));
        if let Some(p) = pagination {
            builder
                .push(" LIMIT ")
                .push_bind(i64::from(p.limit()))
                .push(" OFFSET ")
                .push_bind(p.offset() as i64);
        }
        let ids = builder
            .build()
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((ids, total as u64))
    }

    /// Insert unless the guard name exists, then read the row back.
    pub async fn find_or_create(&self, pool: &SqlitePool, new: NewEntity<'_>) -> Result<EntityRow, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} (name, guard_name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT (guard_name) DO NOTHING",
            self.0
        );
        sqlx::query(&sql)
            .bind(new.name)
            .bind(new.guard_name.as_str())
            .bind(new.description)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;

        self.by_guard_name(pool, new.guard_name)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Apply `changes`; `None` when the row does not exist.
    pub async fn update(&self, pool: &SqlitePool, id: i64, changes: &Changes) -> Result<Option<EntityRow>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET updated_at = ", self.0));
        builder.push_bind(Utc::now());
        if let (Some(name), Some(guard_name)) = (&changes.name, changes.guard_name()) {
            builder
                .push(", name = ")
                .push_bind(name.clone())
                .push(", guard_name = ")
                .push_bind(guard_name.into_string());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ").push_bind(description.clone());
        }
        builder.push(" WHERE id = ").push_bind(id);

        if builder.build().execute(pool).await?.rows_affected() == 0 {
            return Ok(None);
        }
        self.by_id(pool, id).await
    }

    pub async fn delete(&self, conn: &mut sqlx::SqliteConnection, id: i64) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.0);
        Ok(sqlx::query(&sql).bind(id).execute(&mut *conn).await?.rows_affected())
    }
}
