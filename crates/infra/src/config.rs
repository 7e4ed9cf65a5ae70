//! Store configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ROLEGATE_DATABASE_URL` | `sqlite::memory:` |
//! | `ROLEGATE_MAX_CONNECTIONS` | `5` (always `1` for in-memory SQLite) |
//! | `ROLEGATE_DEFAULT_PAGE` | `1` |
//! | `ROLEGATE_DEFAULT_PAGE_SIZE` | `20` |

use thiserror::Error;

use rolegate_core::PageDefaults;

pub const DATABASE_URL: &str = "ROLEGATE_DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "ROLEGATE_MAX_CONNECTIONS";
pub const DEFAULT_PAGE: &str = "ROLEGATE_DEFAULT_PAGE";
pub const DEFAULT_PAGE_SIZE: &str = "ROLEGATE_DEFAULT_PAGE_SIZE";

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection and pagination settings for the SQL store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub page_defaults: PageDefaults,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            page_defaults: PageDefaults::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| IN_MEMORY_URL.to_string());

        let max_connections = parse_positive(&lookup, MAX_CONNECTIONS, 5)?;
        let page_defaults = PageDefaults {
            page: parse_positive(&lookup, DEFAULT_PAGE, 1)?,
            limit: parse_positive(&lookup, DEFAULT_PAGE_SIZE, 20)?,
        };

        let mut config = Self {
            database_url,
            max_connections,
            page_defaults,
        };
        if config.is_in_memory() {
            // Every pooled connection to `:memory:` would open its own database.
            config.max_connections = 1;
        }
        Ok(config)
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: "must be at least 1".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_single_connection_in_memory() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::in_memory());
        assert!(config.is_in_memory());
    }

    #[test]
    fn reads_file_database_and_page_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DATABASE_URL, "sqlite://rbac.db?mode=rwc"),
            (MAX_CONNECTIONS, "8"),
            (DEFAULT_PAGE_SIZE, "50"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.page_defaults, PageDefaults { page: 1, limit: 50 });
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = StoreConfig::from_lookup(lookup(&[(DEFAULT_PAGE_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: DEFAULT_PAGE_SIZE, .. }));

        let err = StoreConfig::from_lookup(lookup(&[(MAX_CONNECTIONS, "many")])).unwrap_err();
        assert!(err.to_string().contains(MAX_CONNECTIONS));
    }
}
