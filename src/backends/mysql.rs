//! Pooled MySQL backend
//!
//! Built on `mysql_async`. Statements with parameters use the binary protocol; parameterless
//! statements go over the text protocol because not every DDL statement can be prepared.

use crate::core::{
    config::DatabaseConfig,
    connection::{BatchConsumer, ConnectionPool, PoolStats, SqlConnection},
    dialect::Dialect,
    error::{DatabaseError, Result},
    value::{DatabaseResult, DatabaseRow, DatabaseValue},
};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Row, Value};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pool of MySQL connections to one schema
pub struct MysqlPool {
    pool: Pool,
    max_size: usize,
    in_use: Arc<AtomicUsize>,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl MysqlPool {
    /// Create the pool from configuration; connections are opened lazily
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let constraints = PoolConstraints::new(1, config.max_connections).ok_or_else(|| {
            DatabaseError::config(format!(
                "Invalid pool size: {}",
                config.max_connections
            ))
        })?;

        let opts = connection_opts(config)
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        debug!(
            host = config.mysql_host.as_str(),
            database = config.mysql_database.as_str(),
            max_size = config.max_connections,
            "mysql pool ready"
        );

        Ok(Self {
            pool: Pool::new(opts),
            max_size: config.max_connections,
            in_use: Arc::new(AtomicUsize::new(0)),
            acquire_timeout: config.acquire_timeout(),
            operation_timeout: config.operation_timeout(),
        })
    }
}

/// Connection options for the configured server
fn connection_opts(config: &DatabaseConfig) -> OptsBuilder {
    let password = Some(config.mysql_password.as_str()).filter(|p| !p.is_empty());
    OptsBuilder::default()
        .ip_or_hostname(config.mysql_host.as_str())
        .tcp_port(config.mysql_port)
        .user(Some(config.mysql_user.as_str()))
        .pass(password)
        .db_name(Some(config.mysql_database.as_str()))
        // Affected-row counts must include rows matched but left unchanged, otherwise an
        // update-or-insert would insert a duplicate when the stored value did not change.
        .client_found_rows(true)
}

/// Run one driver call, bounded by the operation timeout
async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, mysql_async::Error>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| DatabaseError::query_timeout(timeout.as_millis() as u64))?
        .map_err(DatabaseError::from)
}

#[async_trait]
impl ConnectionPool for MysqlPool {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn acquire(&self) -> Result<Box<dyn SqlConnection>> {
        let conn = tokio::time::timeout(self.acquire_timeout, self.pool.get_conn())
            .await
            .map_err(|_| {
                let active = self.in_use.load(Ordering::Acquire);
                if active >= self.max_size {
                    DatabaseError::pool_exhausted(active, self.max_size)
                } else {
                    DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
                }
            })?
            .map_err(|e| DatabaseError::connection(format!("Failed to acquire connection: {}", e)))?;

        self.in_use.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MysqlConnection {
            conn,
            in_use: Arc::clone(&self.in_use),
            operation_timeout: self.operation_timeout,
        }))
    }

    fn status(&self) -> PoolStats {
        PoolStats {
            max_size: self.max_size,
            in_use: self.in_use.load(Ordering::Acquire),
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

/// One pooled MySQL connection
pub struct MysqlConnection {
    conn: Conn,
    in_use: Arc<AtomicUsize>,
    operation_timeout: Duration,
}

impl Drop for MysqlConnection {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

fn to_mysql_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::NULL,
        DatabaseValue::Bool(v) => Value::Int(*v as i64),
        DatabaseValue::Int(v) => Value::Int(*v as i64),
        DatabaseValue::Long(v) => Value::Int(*v),
        DatabaseValue::Double(v) => Value::Double(*v),
        DatabaseValue::String(v) => Value::Bytes(v.as_bytes().to_vec()),
        DatabaseValue::Bytes(v) => Value::Bytes(v.clone()),
    }
}

fn to_params(params: &[DatabaseValue]) -> Params {
    Params::Positional(params.iter().map(to_mysql_value).collect())
}

fn from_mysql_value(value: Value) -> DatabaseValue {
    match value {
        Value::NULL => DatabaseValue::Null,
        // The text protocol returns every column as bytes.
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => DatabaseValue::String(text),
            Err(e) => DatabaseValue::Bytes(e.into_bytes()),
        },
        Value::Int(v) => DatabaseValue::Long(v),
        Value::UInt(v) => DatabaseValue::Long(v as i64),
        Value::Float(v) => DatabaseValue::Double(v as f64),
        Value::Double(v) => DatabaseValue::Double(v),
        other => DatabaseValue::String(other.as_sql(true)),
    }
}

fn row_to_database_row(row: Row) -> DatabaseRow {
    let names: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect();
    names
        .into_iter()
        .zip(
            row.unwrap_raw()
                .into_iter()
                .map(|v| v.map_or(DatabaseValue::Null, from_mysql_value)),
        )
        .collect()
}

#[async_trait]
impl SqlConnection for MysqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        let timeout = self.operation_timeout;
        if params.is_empty() {
            bounded(timeout, self.conn.query_drop(sql)).await?;
        } else {
            bounded(timeout, self.conn.exec_drop(sql, to_params(params))).await?;
        }
        Ok(self.conn.affected_rows())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<DatabaseValue>]) -> Result<u64> {
        let timeout = self.operation_timeout;
        let mut total = 0;
        for row in rows {
            bounded(timeout, self.conn.exec_drop(sql, to_params(row))).await?;
            total += self.conn.affected_rows();
        }
        Ok(total)
    }

    async fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<DatabaseResult> {
        let timeout = self.operation_timeout;
        let rows: Vec<Row> = if params.is_empty() {
            bounded(timeout, self.conn.query(sql)).await?
        } else {
            bounded(timeout, self.conn.exec(sql, to_params(params))).await?
        };

        Ok(rows.into_iter().map(row_to_database_row).collect())
    }

    async fn query_batched(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
        batch_size: usize,
        consumer: &mut BatchConsumer<'_>,
    ) -> Result<()> {
        let batch_size = batch_size.max(1);
        let timeout = self.operation_timeout;
        let mut result = bounded(timeout, self.conn.exec_iter(sql, to_params(params))).await?;

        // Each fetch is bounded separately so a long stream is not cut off as a whole.
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(row) = bounded(timeout, result.next()).await? {
            batch.push(row_to_database_row(row));
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if let Err(e) = consumer(full) {
                    // Drain the rest so the connection can be reused.
                    bounded(timeout, result.drop_result()).await?;
                    return Err(e);
                }
            }
        }
        if !batch.is_empty() {
            consumer(batch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_protocol_bytes_read_as_strings() {
        let value = from_mysql_value(Value::Bytes(b"42".to_vec()));
        assert_eq!(value, DatabaseValue::String("42".to_string()));
        assert_eq!(value.as_long(), Some(42));

        let value = from_mysql_value(Value::Bytes(vec![0xff, 0xfe]));
        assert_eq!(value, DatabaseValue::Bytes(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_parameter_conversion() {
        assert_eq!(to_mysql_value(&DatabaseValue::Bool(true)), Value::Int(1));
        assert_eq!(to_mysql_value(&DatabaseValue::Null), Value::NULL);
        assert_eq!(
            to_mysql_value(&DatabaseValue::String("plan".to_string())),
            Value::Bytes(b"plan".to_vec())
        );
    }

    #[test]
    fn test_options_come_from_config_fields() {
        let config = DatabaseConfig {
            dialect: Dialect::Mysql,
            mysql_host: "db.internal".to_string(),
            mysql_port: 3307,
            mysql_user: "plan".to_string(),
            mysql_password: "p@ss:word/#".to_string(),
            mysql_database: "plan".to_string(),
            ..Default::default()
        };
        let opts = mysql_async::Opts::from(connection_opts(&config));
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.user(), Some("plan"));
        assert_eq!(opts.pass(), Some("p@ss:word/#"));
        assert_eq!(opts.db_name(), Some("plan"));
    }

    #[test]
    fn test_empty_password_is_not_sent() {
        let config = DatabaseConfig {
            dialect: Dialect::Mysql,
            mysql_database: "plan".to_string(),
            ..Default::default()
        };
        let opts = mysql_async::Opts::from(connection_opts(&config));
        assert_eq!(opts.pass(), None);
        assert_eq!(opts.tcp_port(), 3306);
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let stalled = std::future::pending::<std::result::Result<(), mysql_async::Error>>();
        let err = bounded(Duration::from_millis(10), stalled).await.unwrap_err();
        assert!(matches!(err, DatabaseError::QueryTimeout { timeout_ms: 10 }));
    }

    #[test]
    fn test_pool_requires_valid_size() {
        let config = DatabaseConfig {
            dialect: Dialect::Mysql,
            mysql_database: "plan".to_string(),
            max_connections: 0,
            ..Default::default()
        };
        assert!(matches!(
            MysqlPool::new(&config),
            Err(DatabaseError::Config(_))
        ));
    }
}
