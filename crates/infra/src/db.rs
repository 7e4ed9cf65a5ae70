//! SQLite pool and schema.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use rolegate_core::AccessResult;

use crate::config::StoreConfig;
use crate::error::map_sqlx_error;

/// Idempotent schema. Pivot pairs are unique through their composite primary
/// keys; the count-based `has_all_*` predicates depend on it.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        guard_name  TEXT NOT NULL UNIQUE,
        description TEXT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        guard_name  TEXT NOT NULL UNIQUE,
        description TEXT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id       INTEGER NOT NULL,
        permission_id INTEGER NOT NULL,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS role_permissions_permission_id ON role_permissions (permission_id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS user_roles_role_id ON user_roles (role_id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_permissions (
        user_id       INTEGER NOT NULL,
        permission_id INTEGER NOT NULL,
        PRIMARY KEY (user_id, permission_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS user_permissions_permission_id ON user_permissions (permission_id)",
];

/// Open a pool for `config.database_url`, creating the database file if needed.
#[instrument(skip(config), fields(in_memory = config.is_in_memory()), err)]
pub async fn connect(config: &StoreConfig) -> AccessResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| map_sqlx_error("connect", e))?
        .create_if_missing(true);

    let mut pool = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.is_in_memory() {
        // The database lives exactly as long as its single connection.
        pool = pool.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    pool.connect_with(options)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create tables and indexes if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &SqlitePool) -> AccessResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
    }
    info!(statements = SCHEMA.len(), "schema ready");
    Ok(())
}
