//! Database configuration
//!
//! Loaded with figment: built-in defaults, then an optional TOML file, then `PLAN_DB_` prefixed
//! environment variables (`PLAN_DB_DIALECT=mysql`, `PLAN_DB_MYSQL_HOST=...`).

use super::dialect::Dialect;
use super::error::{DatabaseError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "PLAN_DB_";

/// Connection settings for the analytics database
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatabaseConfig {
    /// Engine to use. Fixed for the lifetime of the process.
    pub dialect: Dialect,

    /// Database file for SQLite. Default: `database.db`.
    pub sqlite_path: PathBuf,

    /// MySQL server host. Default: `localhost`.
    pub mysql_host: String,

    /// MySQL server port. Default: `3306`.
    pub mysql_port: u16,

    pub mysql_user: String,

    pub mysql_password: String,

    /// MySQL schema name; required for the mysql dialect.
    pub mysql_database: String,

    /// Upper bound on pooled connections. Default: `16`.
    pub max_connections: usize,

    /// How long to wait for a free pooled connection. Default: `5000`.
    pub acquire_timeout_ms: u64,

    /// Upper bound on a single statement. Default: `30000`.
    pub operation_timeout_ms: u64,

    /// Retries for the first connection on open. Default: `3`.
    pub connect_retries: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            sqlite_path: PathBuf::from("database.db"),
            mysql_host: "localhost".to_string(),
            mysql_port: 3306,
            mysql_user: "root".to_string(),
            mysql_password: String::new(),
            mysql_database: String::new(),
            max_connections: 16,
            acquire_timeout_ms: 5000,
            operation_timeout_ms: 30_000,
            connect_retries: 3,
        }
    }
}

impl DatabaseConfig {
    /// SQLite configuration for the given file with default pool settings
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            sqlite_path: path.into(),
            ..Default::default()
        }
    }

    /// Builds a Figment that merges defaults, the TOML file if it exists, and the environment.
    pub fn figment(toml_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(DatabaseConfig::default()));
        if let Some(path) = toml_path.filter(|p| p.is_file()) {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate configuration
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(toml_path)
            .extract()
            .map_err(|e| DatabaseError::config(format!("failed to extract configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(DatabaseError::config("max_connections must be at least 1"));
        }
        match self.dialect {
            Dialect::Sqlite if self.sqlite_path.as_os_str().is_empty() => Err(
                DatabaseError::config("sqlite_path must be set for the sqlite dialect"),
            ),
            Dialect::Mysql if self.mysql_database.trim().is_empty() => Err(DatabaseError::config(
                "mysql_database must be set for the mysql dialect",
            )),
            _ => Ok(()),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.mysql_port, 3306);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.acquire_timeout(), Duration::from_millis(5000));
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DatabaseError::Config(_))));

        let config = DatabaseConfig::sqlite("");
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            dialect: Dialect::Mysql,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            dialect: Dialect::Mysql,
            mysql_database: "plan".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "dialect = \"mysql\"").unwrap();
        writeln!(file, "mysql_database = \"plan\"").unwrap();
        writeln!(file, "mysql_port = 3307").unwrap();
        drop(file);

        let config: DatabaseConfig = DatabaseConfig::figment(Some(&path)).extract().unwrap();
        assert_eq!(config.dialect, Dialect::Mysql);
        assert_eq!(config.mysql_port, 3307);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.mysql_host, "localhost");
    }

    #[test]
    fn test_missing_toml_is_ignored() {
        let config: DatabaseConfig = DatabaseConfig::figment(Some(Path::new("/nonexistent.toml")))
            .extract()
            .unwrap();
        assert_eq!(config.sqlite_path, PathBuf::from("database.db"));
    }
}
