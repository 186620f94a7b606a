//! The storage facade
//!
//! [`Database`] owns the connection pool for the configured dialect. Startup calls
//! [`Database::migrate`] once; after that every write goes through
//! [`Database::execute_transaction`] and every read through [`Database::query`].
//!
//! # Example
//!
//! ```no_run
//! use plan_storage::core::{Database, DatabaseConfig, Query, RowExt};
//!
//! # async fn example() -> plan_storage::Result<()> {
//! let db = Database::open(&DatabaseConfig::sqlite("plan.db")).await?;
//! let report = db.migrate().await?;
//! println!("{report}");
//!
//! let names = db
//!     .query(Query::list("SELECT name FROM plan_servers", |row| row.string("name")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::config::DatabaseConfig;
use super::connection::{ConnectionPool, PoolStats};
use super::dialect::Dialect;
use super::error::{DatabaseError, Result};
use super::statement::{BatchedQuery, Query};
use super::transaction::{run_transaction, Transaction, TransactionContext};
use super::value::DatabaseResult;
use crate::patches::{apply_patches, patch_catalog, PatchReport};
use crate::schema::CreateTablesTransaction;
use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attempts made for a transaction that keeps failing on lock contention
pub const DEADLOCK_ATTEMPTS: usize = 5;

fn deadlock_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(25))
        .with_max_delay(Duration::from_millis(500))
        .with_max_times(DEADLOCK_ATTEMPTS - 1)
        .with_jitter()
}

fn connect_backoff(retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(retries)
}

/// Pooled access to the analytics database
pub struct Database {
    pool: Arc<dyn ConnectionPool>,
    migrated: AtomicBool,
}

impl Database {
    /// Open the pool for the configured dialect and check that a connection can be made
    ///
    /// The first connection is retried with exponential backoff, `connect_retries` times.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let pool: Arc<dyn ConnectionPool> = match config.dialect {
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                use crate::backends::{SqlitePool, SqlitePoolConfig};
                let pool_config = SqlitePoolConfig::new(&config.sqlite_path)
                    .with_max_size(config.max_connections)
                    .with_acquire_timeout(config.acquire_timeout())
                    .with_operation_timeout(config.operation_timeout());
                Arc::new(SqlitePool::new(pool_config).await?)
            }
            #[cfg(feature = "mysql")]
            Dialect::Mysql => Arc::new(crate::backends::MysqlPool::new(config)?),
            #[allow(unreachable_patterns)]
            other => {
                return Err(DatabaseError::unsupported(format!(
                    "{} support was not compiled in",
                    other
                )))
            }
        };

        let db = Self::from_pool(pool);
        db.check_connection(config.connect_retries).await?;
        info!(dialect = %db.dialect(), "database opened");
        Ok(db)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            pool,
            migrated: AtomicBool::new(false),
        }
    }

    async fn check_connection(&self, retries: usize) -> Result<()> {
        (|| async { self.pool.acquire().await.map(drop) })
            .retry(connect_backoff(retries))
            .when(|e: &DatabaseError| {
                matches!(
                    e,
                    DatabaseError::ConnectionError(_) | DatabaseError::ConnectionTimeout { .. }
                )
            })
            .notify(|e: &DatabaseError, delay: Duration| {
                warn!(error = %e, ?delay, "database not reachable, retrying");
            })
            .await
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Create missing tables and apply the patch catalog
    ///
    /// Must be called exactly once, before anything else uses the database. A second call is an
    /// [`DatabaseError::Operation`]; a fatal patch failure comes back as
    /// [`DatabaseError::PatchFailed`] naming the patch.
    pub async fn migrate(&self) -> Result<PatchReport> {
        if self.migrated.swap(true, Ordering::AcqRel) {
            return Err(DatabaseError::operation("migrate() has already been called"));
        }

        let mut conn = self.pool.acquire().await?;
        run_transaction(conn.as_mut(), &mut CreateTablesTransaction).await?;
        let report = apply_patches(conn.as_mut(), &patch_catalog()).await?;

        info!(
            dialect = %self.dialect(),
            checked = report.len(),
            applied = report.applied().len(),
            "schema is up to date"
        );
        Ok(report)
    }

    /// Run `tx` on a pooled connection
    ///
    /// A transaction that fails on lock contention is rolled back and run again after a short
    /// backoff, up to [`DEADLOCK_ATTEMPTS`] times.
    pub async fn execute_transaction(&self, tx: &mut dyn Transaction) -> Result<()> {
        let mut delays = deadlock_backoff().build();
        let mut attempt = 1;
        loop {
            let mut conn = self.pool.acquire().await?;
            let result = run_transaction(conn.as_mut(), tx).await;
            drop(conn);

            match result {
                Err(e) if e.is_deadlock() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            transaction = tx.name().as_str(),
                            attempt,
                            ?delay,
                            error = %e,
                            "lock contention, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }

    /// Run a read on a pooled connection outside any transaction
    pub async fn query<T>(&self, query: Query<T>) -> Result<T> {
        let mut conn = self.pool.acquire().await?;
        TransactionContext::new(conn.as_mut()).query(query).await
    }

    /// Stream a large read to `consumer` in batches
    pub async fn query_batched<F>(&self, query: BatchedQuery, consumer: F) -> Result<()>
    where
        F: FnMut(DatabaseResult) -> Result<()> + Send,
    {
        let mut conn = self.pool.acquire().await?;
        TransactionContext::new(conn.as_mut())
            .query_batched(query, consumer)
            .await
    }

    pub fn status(&self) -> PoolStats {
        self.pool.status()
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await
    }
}
