//! # Plan Storage
//!
//! Transactional storage layer for the Plan analytics database: players, servers, sessions,
//! kills, pings, nicknames, TPS samples and the values extension plugins report about them.
//!
//! ## Features
//!
//! - **Two dialects**: SQLite (embedded, single file) and MySQL, chosen by configuration
//! - **Pooled connections**: `deadpool-sqlite` and `mysql_async` pools behind one trait
//! - **Atomic units of work**: every write is a [`Transaction`] that commits or rolls back whole
//! - **Self-describing schema patches**: each patch checks whether it is already in place, so an
//!   interrupted upgrade finishes on the next start
//! - **Conditional extension data**: values that depend on a condition are removed when the
//!   condition stops holding
//!
//! ## Supported Databases
//!
//! | Database | Feature | Notes |
//! |----------|---------|-------|
//! | SQLite | `sqlite` (default) | Bundled, WAL journaling |
//! | MySQL | `mysql` | utf8mb4 tables, row-locking reads |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plan_storage::prelude::*;
//! use plan_storage::extension::{
//!     NumberValue, ProviderInformation, ProviderKey, StorePlayerNumberResultTransaction,
//!     StorePluginTransaction, StoreProviderTransaction,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = Database::open(&DatabaseConfig::sqlite("plan.db")).await?;
//!     db.migrate().await?;
//!
//!     let server = "3d2a7a08-9a3f-4b5c-8f1e-0c6a1a2b3c4d";
//!     db.execute_transaction(&mut StorePluginTransaction::new("Jails", server))
//!         .await?;
//!     db.execute_transaction(&mut StoreProviderTransaction::new(
//!         server,
//!         ProviderInformation {
//!             plugin_name: "Jails".to_string(),
//!             name: "jailTime".to_string(),
//!             text: "Time in jail".to_string(),
//!             ..Default::default()
//!         },
//!     ))
//!     .await?;
//!     db.execute_transaction(&mut StorePlayerNumberResultTransaction::new(
//!         ProviderKey::new("Jails", server, "jailTime"),
//!         "b1f0c8c2-1d4e-4a43-9d8f-2e6a7b8c9d0e",
//!         NumberValue::Long(3_600_000),
//!     ))
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! src/
//! ├── core/          # errors, values, statements, transactions, config, Database facade
//! ├── backends/      # SQLite and MySQL pools
//! ├── schema/        # table definitions, creation, introspection
//! ├── patches/       # ordered, idempotent schema patches
//! ├── extension/     # extension data storage and conditional invalidation
//! └── bin/           # plan-migrate
//! ```

/// Core storage types and traits
pub mod core;

/// Connection pool implementations
pub mod backends;

/// Extension data storage and invalidation
pub mod extension;

/// Schema patches
pub mod patches;

/// Table definitions and schema introspection
pub mod schema;

/// Prelude for convenient imports
///
/// ```rust
/// use plan_storage::prelude::*;
///
/// let insert = Executable::new("INSERT INTO plan_users (uuid, name) VALUES (?, ?)")
///     .bind("b1f0c8c2-1d4e-4a43-9d8f-2e6a7b8c9d0e")
///     .bind("Alice");
/// assert_eq!(insert.params().len(), 2);
/// ```
pub mod prelude {
    pub use crate::core::{
        BatchExecutable, BatchedQuery, Database, DatabaseConfig, DatabaseError, DatabaseResult,
        DatabaseRow, DatabaseValue, Dialect, Executable, Query, Result, RowExt, Transaction,
        TransactionContext,
    };
    pub use crate::patches::{Patch, PatchOutcome, PatchReport};
}

// Re-export at root level for convenience
pub use core::{
    Database, DatabaseConfig, DatabaseError, DatabaseResult, DatabaseRow, DatabaseValue, Dialect,
    Result, Transaction, TransactionContext,
};
