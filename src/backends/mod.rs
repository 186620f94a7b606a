//! Connection pool implementations
//!
//! One [`ConnectionPool`](crate::core::ConnectionPool) per supported engine, each behind its
//! cargo feature.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::{MysqlConnection, MysqlPool};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqlitePool, SqlitePoolConfig};
