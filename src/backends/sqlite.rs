//! Pooled SQLite backend
//!
//! Connections come from a `deadpool-sqlite` pool; every statement runs on the blocking thread
//! pool through `interact` and is bounded by the operation timeout.

use crate::core::{
    connection::{BatchConsumer, ConnectionPool, PoolStats, SqlConnection},
    dialect::Dialect,
    error::{DatabaseError, Result},
    value::{DatabaseResult, DatabaseRow, DatabaseValue},
};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, PoolConfig, PoolError, Runtime, TimeoutType};
use rusqlite::{params_from_iter, types::Value, Row};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Pool configuration for SQLite connections
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Database file
    pub path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,
    /// Timeout for database operations (query, execute, etc.)
    pub operation_timeout: Duration,
}

impl SqlitePoolConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: 16,
            acquire_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
        }
    }

    /// Set maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set connection acquisition timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set database operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Pool of SQLite connections to one database file
///
/// # Example
///
/// ```no_run
/// use plan_storage::backends::{SqlitePool, SqlitePoolConfig};
/// use plan_storage::core::ConnectionPool;
///
/// # async fn example() -> plan_storage::Result<()> {
/// let pool = SqlitePool::new(SqlitePoolConfig::new("plan.db")).await?;
/// let mut conn = pool.acquire().await?;
/// conn.execute("DELETE FROM plan_ping WHERE date < ?", &[0i64.into()]).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlitePool {
    pool: Pool,
    max_size: usize,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl SqlitePool {
    /// Create the pool and switch the database to WAL journaling
    ///
    /// # Errors
    ///
    /// Returns error if pool creation or initialization fails
    pub async fn new(config: SqlitePoolConfig) -> Result<Self> {
        let mut pool_config = PoolConfig::new(config.max_size);
        pool_config.timeouts.wait = Some(config.acquire_timeout);

        let mut sqlite_config = Config::new(config.path.clone());
        sqlite_config.pool = Some(pool_config);

        let pool = sqlite_config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| DatabaseError::connection(format!("Failed to create pool: {}", e)))?;

        let this = Self {
            pool,
            max_size: config.max_size,
            acquire_timeout: config.acquire_timeout,
            operation_timeout: config.operation_timeout,
        };

        let conn = this.get().await?;
        conn.interact(|conn| {
            // PRAGMA journal_mode returns a value, so we need to use query_row
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| DatabaseError::query(format!("Interact error: {}", e)))?
        .map_err(DatabaseError::from)?;

        debug!(path = %config.path.display(), max_size = config.max_size, "sqlite pool ready");
        Ok(this)
    }

    async fn get(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| match e {
            PoolError::Timeout(TimeoutType::Wait) => {
                let status = self.pool.status();
                DatabaseError::pool_exhausted(
                    status.size.saturating_sub(status.available),
                    self.max_size,
                )
            }
            PoolError::Timeout(_) => {
                DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
            }
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        })
    }
}

#[async_trait]
impl ConnectionPool for SqlitePool {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn acquire(&self) -> Result<Box<dyn SqlConnection>> {
        let conn = self.get().await?;
        let busy_timeout = self.operation_timeout;

        conn.interact(move |conn| {
            // A connection dropped mid-transaction comes back with the transaction still open.
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
            conn.busy_timeout(busy_timeout)?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| DatabaseError::query(format!("Interact error: {}", e)))?
        .map_err(DatabaseError::from)?;

        Ok(Box::new(SqliteConnection {
            conn,
            operation_timeout: self.operation_timeout,
        }))
    }

    fn status(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: self.max_size,
            in_use: status.size.saturating_sub(status.available),
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

/// One pooled SQLite connection
pub struct SqliteConnection {
    conn: Object,
    operation_timeout: Duration,
}

impl SqliteConnection {
    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        tokio::time::timeout(self.operation_timeout, self.conn.interact(f))
            .await
            .map_err(|_| DatabaseError::query_timeout(self.operation_timeout.as_millis() as u64))?
            .map_err(|e| DatabaseError::query(format!("Interact error: {}", e)))?
            .map_err(DatabaseError::from)
    }
}

/// Convert a rusqlite Row to a DatabaseRow
fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
    let mut db_row = DatabaseRow::new();
    let column_count = row.as_ref().column_count();

    for i in 0..column_count {
        let column_name = row.as_ref().column_name(i)?.to_string();
        let value = match row.get_ref(i)? {
            rusqlite::types::ValueRef::Null => DatabaseValue::Null,
            rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
            rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
            rusqlite::types::ValueRef::Text(v) => {
                DatabaseValue::String(String::from_utf8_lossy(v).to_string())
            }
            rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
        };
        db_row.insert(column_name, value);
    }

    Ok(db_row)
}

/// Convert DatabaseValue to an owned rusqlite parameter
fn to_sql_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(v) => Value::Integer(*v as i64),
        DatabaseValue::Int(v) => Value::Integer(*v as i64),
        DatabaseValue::Long(v) => Value::Integer(*v),
        DatabaseValue::Double(v) => Value::Real(*v),
        DatabaseValue::String(v) => Value::Text(v.clone()),
        DatabaseValue::Bytes(v) => Value::Blob(v.clone()),
    }
}

fn to_sql_values(params: &[DatabaseValue]) -> Vec<Value> {
    params.iter().map(to_sql_value).collect()
}

#[async_trait]
impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        let sql = sql.to_string();
        let params = to_sql_values(params);

        let affected = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                stmt.execute(params_from_iter(params.iter()))
            })
            .await?;

        Ok(affected as u64)
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<DatabaseValue>]) -> Result<u64> {
        let sql = sql.to_string();
        let rows: Vec<Vec<Value>> = rows.iter().map(|row| to_sql_values(row)).collect();

        let affected = self
            .run(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let mut total = 0usize;
                for row in &rows {
                    total += stmt.execute(params_from_iter(row.iter()))?;
                }
                Ok(total)
            })
            .await?;

        Ok(affected as u64)
    }

    async fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<DatabaseResult> {
        let sql = sql.to_string();
        let params = to_sql_values(params);

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), row_to_database_row)?;

            let mut results = Vec::new();
            for row_result in rows {
                results.push(row_result?);
            }
            Ok(results)
        })
        .await
    }

    async fn query_batched(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
        batch_size: usize,
        consumer: &mut BatchConsumer<'_>,
    ) -> Result<()> {
        let sql = sql.to_string();
        let params = to_sql_values(params);
        let batch_size = batch_size.max(1);
        let (sender, mut receiver) = tokio::sync::mpsc::channel::<DatabaseResult>(1);

        // Rows are read on the blocking pool and handed over one batch at a time.
        let producer = self.conn.interact(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut batch = Vec::with_capacity(batch_size);
            while let Some(row) = rows.next()? {
                batch.push(row_to_database_row(row)?);
                if batch.len() == batch_size {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    if sender.blocking_send(full).is_err() {
                        return Ok(());
                    }
                }
            }
            if !batch.is_empty() {
                let _ = sender.blocking_send(batch);
            }
            Ok::<_, rusqlite::Error>(())
        });

        let consume = async {
            while let Some(batch) = receiver.recv().await {
                if let Err(e) = consumer(batch) {
                    receiver.close();
                    return Err(e);
                }
            }
            Ok(())
        };

        let (produced, consumed) = tokio::time::timeout(self.operation_timeout, async {
            tokio::join!(producer, consume)
        })
        .await
        .map_err(|_| DatabaseError::query_timeout(self.operation_timeout.as_millis() as u64))?;

        consumed?;
        produced
            .map_err(|e| DatabaseError::query(format!("Interact error: {}", e)))?
            .map_err(DatabaseError::from)
    }
}
