//! Connection and pool traits
//!
//! Backends implement [`SqlConnection`] for one checked-out connection and [`ConnectionPool`] for
//! the pool that hands them out. Both are object safe so the [`Database`](crate::core::Database)
//! facade can hold either engine behind `Arc<dyn ConnectionPool>`.

use super::dialect::Dialect;
use super::error::Result;
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;

/// Consumer of row batches produced by [`SqlConnection::query_batched`]
pub type BatchConsumer<'a> = dyn FnMut(DatabaseResult) -> Result<()> + Send + 'a;

/// A single connection checked out of a pool
///
/// The connection is owned exclusively by whoever holds it; dropping it returns it to the pool.
/// All statements take positional `?` parameters.
#[async_trait]
pub trait SqlConnection: Send {
    /// Dialect of the engine behind this connection
    fn dialect(&self) -> Dialect;

    /// Execute a statement and return the number of affected rows
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Execute one statement for every parameter row, returning the total affected rows
    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<DatabaseValue>]) -> Result<u64>;

    /// Run a SELECT and read every row
    async fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<DatabaseResult>;

    /// Run a SELECT and hand the rows to `consumer` in batches of at most `batch_size`
    ///
    /// An error from the consumer stops the scan and is returned as-is.
    async fn query_batched(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
        batch_size: usize,
        consumer: &mut BatchConsumer<'_>,
    ) -> Result<()>;

    /// Begin a transaction
    async fn begin(&mut self) -> Result<()> {
        let sql = self.dialect().begin_transaction_sql();
        self.execute(sql, &[]).await.map(|_| ())
    }

    /// Commit the current transaction
    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    /// Roll back the current transaction
    async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Upper bound on open connections
    pub max_size: usize,
    /// Connections currently checked out
    pub in_use: usize,
}

/// Pool of [`SqlConnection`]s for one database
///
/// # Example
/// ```ignore
/// let mut conn = pool.acquire().await?;
/// conn.execute("DELETE FROM plan_ping WHERE date < ?", &[cutoff.into()]).await?;
/// drop(conn); // back to the pool
/// ```
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Check out a connection, waiting up to the configured acquire timeout
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>>;

    fn status(&self) -> PoolStats;

    /// Close idle connections and refuse further checkouts where the driver supports it
    async fn close(&self) -> Result<()>;
}
