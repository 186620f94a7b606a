//! Core storage types and traits
//!
//! Dialect-neutral building blocks: errors, values, statements, the connection and pool traits,
//! the transaction executor and the [`Database`] facade built on them.

pub mod config;
pub mod connection;
pub mod database;
pub mod dialect;
pub mod error;
pub mod query_builder;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::DatabaseConfig;
pub use connection::{ConnectionPool, PoolStats, SqlConnection};
pub use database::Database;
pub use dialect::Dialect;
pub use error::{DatabaseError, Result};
pub use query_builder::{ColumnDef, CreateTableBuilder, SqlType};
pub use statement::{BatchExecutable, BatchedQuery, Executable, Query};
pub use transaction::{run_transaction, Transaction, TransactionContext};
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue, RowExt};
