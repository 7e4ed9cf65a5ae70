//! Infrastructure layer: configuration, the SQLite pool and schema, and the
//! SQL repositories behind [`rolegate_auth::AccessControl`].

use std::sync::Arc;

use rolegate_auth::AccessControl;
use rolegate_core::AccessResult;

/// Configuration loading and representation.
pub mod config;
/// Pool construction and schema migration.
pub mod db;
mod error;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use db::{connect, migrate};
pub use store::SqlRbacStore;

/// Connect, migrate and wire an engine over the SQL store.
pub async fn open(config: &StoreConfig) -> AccessResult<AccessControl> {
    let pool = connect(config).await?;
    migrate(&pool).await?;
    let store = Arc::new(SqlRbacStore::new(pool));
    Ok(AccessControl::from_store(store).with_page_defaults(config.page_defaults))
}
