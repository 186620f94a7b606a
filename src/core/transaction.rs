//! Atomic units of work
//!
//! Everything that writes goes through a [`Transaction`]. The executor binds it to one
//! connection, begins, asks [`Transaction::should_be_executed`], runs
//! [`Transaction::perform_operations`] and then commits. Any error rolls the whole unit back and
//! comes out as [`DatabaseError::TransactionFailed`] naming the transaction.
//!
//! # Example
//!
//! ```ignore
//! struct RemoveOldPings { cutoff: i64 }
//!
//! #[async_trait]
//! impl Transaction for RemoveOldPings {
//!     async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
//!         tx.execute(Executable::new("DELETE FROM plan_ping WHERE date < ?").bind(self.cutoff))
//!             .await?;
//!         Ok(())
//!     }
//! }
//!
//! db.execute_transaction(&mut RemoveOldPings { cutoff }).await?;
//! ```

use super::connection::SqlConnection;
use super::dialect::Dialect;
use super::error::{DatabaseError, Result};
use super::statement::{BatchExecutable, BatchedQuery, Executable, Query};
use super::value::DatabaseResult;
use async_trait::async_trait;
use tracing::{debug, warn};

/// A unit of work that is committed or rolled back as a whole
///
/// Implementations may be run more than once: lock contention makes the executor roll back and
/// start over.
#[async_trait]
pub trait Transaction: Send {
    /// Name used in logs and in [`DatabaseError::TransactionFailed`]
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }

    /// Guard evaluated inside the transaction before any work is done
    async fn should_be_executed(&mut self, _tx: &mut TransactionContext<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()>;
}

/// `a::b::Foo<c::Bar>` -> `Foo`
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Statement scope handed to a running [`Transaction`]
///
/// Every statement runs on the connection the transaction was started on, so later statements
/// see earlier writes.
pub struct TransactionContext<'c> {
    conn: &'c mut dyn SqlConnection,
    dialect: Dialect,
    mid_commit_done: bool,
}

impl<'c> TransactionContext<'c> {
    pub(crate) fn new(conn: &'c mut dyn SqlConnection) -> Self {
        let dialect = conn.dialect();
        Self {
            conn,
            dialect,
            mid_commit_done: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Execute a statement; `true` when at least one row was affected
    pub async fn execute(&mut self, statement: Executable) -> Result<bool> {
        debug!(sql = statement.sql(), "execute");
        let affected = self
            .conn
            .execute(statement.sql(), statement.params())
            .await?;
        Ok(affected > 0)
    }

    /// Execute a statement for every parameter row; returns the total affected rows
    pub async fn execute_batch(&mut self, statement: BatchExecutable) -> Result<u64> {
        if statement.is_empty() {
            return Ok(0);
        }
        debug!(
            sql = statement.sql(),
            rows = statement.rows().len(),
            "execute batch"
        );
        self.conn
            .execute_batch(statement.sql(), statement.rows())
            .await
    }

    /// Run a query, reading every row before mapping
    pub async fn query<T>(&mut self, query: Query<T>) -> Result<T> {
        let (sql, params, mapper) = query.into_parts();
        debug!(sql = sql.as_str(), "query");
        let rows = self.conn.query(&sql, &params).await?;
        mapper(rows)
    }

    /// Run a query and stream its rows to `consumer` in batches
    pub async fn query_batched<F>(&mut self, query: BatchedQuery, mut consumer: F) -> Result<()>
    where
        F: FnMut(DatabaseResult) -> Result<()> + Send,
    {
        debug!(
            sql = query.sql(),
            batch_size = query.batch_size(),
            "batched query"
        );
        self.conn
            .query_batched(
                query.sql(),
                query.params(),
                query.batch_size(),
                &mut consumer,
            )
            .await
    }

    /// Run another transaction inside this one
    ///
    /// The child shares this connection and scope. Its guard is honored and a failure in either
    /// rolls back both. The single mid-transaction commit is shared too: once either side has
    /// used it, another call from parent or child is an error.
    pub async fn execute_other(&mut self, other: &mut dyn Transaction) -> Result<()> {
        run_body(other, self)
            .await
            .map(|_| ())
            .map_err(|e| DatabaseError::transaction_failed(other.name(), e))
    }

    /// Commit everything done so far and continue in a fresh transaction on the same connection
    ///
    /// Allowed once per transaction.
    pub async fn commit_mid_transaction(&mut self) -> Result<()> {
        if self.mid_commit_done {
            return Err(DatabaseError::operation(
                "commit_mid_transaction called more than once in the same transaction",
            ));
        }
        self.conn.commit().await?;
        self.conn.begin().await?;
        self.mid_commit_done = true;
        Ok(())
    }
}

/// Guard then body; `Ok(false)` when the guard declined
async fn run_body(tx: &mut dyn Transaction, ctx: &mut TransactionContext<'_>) -> Result<bool> {
    if !tx.should_be_executed(ctx).await? {
        return Ok(false);
    }
    tx.perform_operations(ctx).await?;
    Ok(true)
}

/// Run `tx` on `conn` as one atomic unit
///
/// Commits on success. On failure rolls back and returns
/// [`DatabaseError::TransactionFailed`] wrapping the cause.
pub async fn run_transaction(conn: &mut dyn SqlConnection, tx: &mut dyn Transaction) -> Result<()> {
    let name = tx.name();
    conn.begin()
        .await
        .map_err(|e| DatabaseError::transaction_failed(&name, e))?;

    let outcome = {
        let mut ctx = TransactionContext::new(&mut *conn);
        run_body(tx, &mut ctx).await
    };

    let result = match outcome {
        Ok(executed) => match conn.commit().await {
            Ok(()) => {
                if executed {
                    debug!(transaction = name.as_str(), "committed");
                } else {
                    debug!(transaction = name.as_str(), "skipped by guard");
                }
                return Ok(());
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    if let Err(rollback_err) = conn.rollback().await {
        warn!(
            transaction = name.as_str(),
            error = %rollback_err,
            "rollback failed"
        );
    }
    warn!(transaction = name.as_str(), error = %result, "rolled back");
    Err(DatabaseError::transaction_failed(name, result))
}
