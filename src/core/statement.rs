//! Statement primitives
//!
//! [`Executable`] and [`Query`] pair a SQL template with its bound parameters. They carry no
//! connection and no state, so the same constructor can be called for every use; only a
//! [`TransactionContext`](crate::core::TransactionContext) or a
//! [`Database`](crate::core::Database) runs them.

use super::error::{DatabaseError, Result};
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue, RowExt};

/// Column alias that [`Query::count`] reads
pub const COUNT_ALIAS: &str = "c";

/// A statement that does not return rows
#[derive(Debug, Clone, PartialEq)]
pub struct Executable {
    sql: String,
    params: Vec<DatabaseValue>,
}

impl Executable {
    /// Create a statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a statement with all parameters at once
    pub fn with_params(sql: impl Into<String>, params: Vec<DatabaseValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Bind the next positional parameter
    #[must_use]
    pub fn bind(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }
}

/// One statement executed once per parameter row
#[derive(Debug, Clone, PartialEq)]
pub struct BatchExecutable {
    sql: String,
    rows: Vec<Vec<DatabaseValue>>,
}

impl BatchExecutable {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            rows: Vec::new(),
        }
    }

    /// Add one set of positional parameters
    pub fn add_row(&mut self, row: Vec<DatabaseValue>) {
        self.rows.push(row);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn rows(&self) -> &[Vec<DatabaseValue>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type RowMapper<T> = Box<dyn FnOnce(DatabaseResult) -> Result<T> + Send>;

/// A SELECT whose rows are mapped into `T` before the statement is released
pub struct Query<T> {
    sql: String,
    params: Vec<DatabaseValue>,
    mapper: RowMapper<T>,
}

impl<T> Query<T> {
    /// Create a query from SQL and a mapper over the complete row set
    pub fn new(
        sql: impl Into<String>,
        mapper: impl FnOnce(DatabaseResult) -> Result<T> + Send + 'static,
    ) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            mapper: Box::new(mapper),
        }
    }

    /// Bind the next positional parameter
    #[must_use]
    pub fn bind(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }

    /// Apply the mapper to rows read by a connection
    pub fn map_rows(self, rows: DatabaseResult) -> Result<T> {
        (self.mapper)(rows)
    }

    pub(crate) fn into_parts(self) -> (String, Vec<DatabaseValue>, RowMapper<T>) {
        (self.sql, self.params, self.mapper)
    }
}

impl<T: 'static> Query<Vec<T>> {
    /// Map every row with `f`
    pub fn list(
        sql: impl Into<String>,
        f: impl Fn(&DatabaseRow) -> Result<T> + Send + 'static,
    ) -> Self {
        Query::new(sql, move |rows| rows.iter().map(&f).collect())
    }
}

impl<T: 'static> Query<Option<T>> {
    /// Map the first row with `f`, if there is one
    pub fn first(
        sql: impl Into<String>,
        f: impl FnOnce(&DatabaseRow) -> Result<T> + Send + 'static,
    ) -> Self {
        Query::new(sql, move |rows| rows.first().map(f).transpose())
    }
}

impl Query<i64> {
    /// Read a single count aliased as [`COUNT_ALIAS`]
    pub fn count(sql: impl Into<String>) -> Self {
        Query::new(sql, |rows| {
            rows.first()
                .ok_or_else(|| DatabaseError::operation("Count query returned no rows"))?
                .long(COUNT_ALIAS)
        })
    }
}

impl Query<bool> {
    /// True when the count aliased as [`COUNT_ALIAS`] is above zero
    pub fn exists(sql: impl Into<String>) -> Self {
        Query::new(sql, |rows| match rows.first() {
            Some(row) => Ok(row.long(COUNT_ALIAS)? > 0),
            None => Ok(false),
        })
    }
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A SELECT whose rows are handed to a consumer in fixed-size batches
///
/// Used for scans too large to hold in memory at once; each batch is dropped after the consumer
/// returns.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedQuery {
    sql: String,
    params: Vec<DatabaseValue>,
    batch_size: usize,
}

impl BatchedQuery {
    /// Default number of rows per batch
    pub const DEFAULT_BATCH_SIZE: usize = 2500;

    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn bind(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.params.push(value.into());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
