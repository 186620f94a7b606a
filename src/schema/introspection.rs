//! Read-only lookups in the engine's own catalog
//!
//! SQLite answers from `sqlite_master` and the `pragma_*` table-valued functions; MySQL from
//! `information_schema`, scoped to the connected schema.

use crate::core::statement::Query;
use crate::core::value::RowExt;
use crate::core::{Dialect, Result, TransactionContext};

/// Declared width of a VARCHAR column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarcharLength {
    Bounded(u32),
    /// The engine does not enforce widths, or the column is not a VARCHAR
    Unbounded,
}

impl VarcharLength {
    /// Whether values of `length` characters fit
    pub fn fits(&self, length: u32) -> bool {
        match self {
            VarcharLength::Bounded(bound) => *bound >= length,
            VarcharLength::Unbounded => true,
        }
    }
}

/// A foreign key in `table` that references `referenced_table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    /// Constraint name; SQLite does not name foreign keys
    pub name: Option<String>,
}

pub async fn has_table(tx: &mut TransactionContext<'_>, table: &str) -> Result<bool> {
    let sql = match tx.dialect() {
        Dialect::Sqlite => "SELECT COUNT(1) as c FROM sqlite_master WHERE type='table' AND name=?",
        Dialect::Mysql => {
            "SELECT COUNT(1) as c FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA=DATABASE() AND TABLE_NAME=?"
        }
    };
    tx.query(Query::exists(sql).bind(table)).await
}

pub async fn has_column(tx: &mut TransactionContext<'_>, table: &str, column: &str) -> Result<bool> {
    let sql = match tx.dialect() {
        Dialect::Sqlite => "SELECT COUNT(1) as c FROM pragma_table_info(?) WHERE name=?",
        Dialect::Mysql => {
            "SELECT COUNT(1) as c FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA=DATABASE() AND TABLE_NAME=? AND COLUMN_NAME=?"
        }
    };
    tx.query(Query::exists(sql).bind(table).bind(column)).await
}

/// Width of a VARCHAR column; always [`VarcharLength::Unbounded`] on SQLite
pub async fn column_varchar_length(
    tx: &mut TransactionContext<'_>,
    table: &str,
    column: &str,
) -> Result<VarcharLength> {
    if !tx.dialect().enforces_varchar_length() {
        return Ok(VarcharLength::Unbounded);
    }
    let query = Query::first(
        "SELECT CHARACTER_MAXIMUM_LENGTH as length FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA=DATABASE() AND TABLE_NAME=? AND COLUMN_NAME=?",
        |row| row.opt_long("length"),
    )
    .bind(table)
    .bind(column);

    Ok(match tx.query(query).await?.flatten() {
        Some(length) => VarcharLength::Bounded(u32::try_from(length).unwrap_or(u32::MAX)),
        None => VarcharLength::Unbounded,
    })
}

/// Whether the column accepts NULL; false when the column does not exist
pub async fn is_column_nullable(
    tx: &mut TransactionContext<'_>,
    table: &str,
    column: &str,
) -> Result<bool> {
    let query = match tx.dialect() {
        Dialect::Sqlite => Query::first(
            "SELECT \"notnull\" as not_null FROM pragma_table_info(?) WHERE name=?",
            |row| Ok(!row.boolean("not_null")?),
        ),
        Dialect::Mysql => Query::first(
            "SELECT IS_NULLABLE as nullable FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA=DATABASE() AND TABLE_NAME=? AND COLUMN_NAME=?",
            |row| Ok(row.string("nullable")?.eq_ignore_ascii_case("YES")),
        ),
    };
    let nullable = tx.query(query.bind(table).bind(column)).await?;
    Ok(nullable.unwrap_or(false))
}

/// Foreign keys in other tables that reference `table`
pub async fn foreign_key_constraints_of(
    tx: &mut TransactionContext<'_>,
    table: &str,
) -> Result<Vec<ForeignKeyConstraint>> {
    let query = match tx.dialect() {
        Dialect::Sqlite => Query::list(
            "SELECT m.name as table_name, f.\"from\" as from_column, \
             f.\"table\" as referenced_table, f.\"to\" as referenced_column \
             FROM sqlite_master m JOIN pragma_foreign_key_list(m.name) f \
             WHERE m.type='table' AND f.\"table\"=?",
            |row| {
                Ok(ForeignKeyConstraint {
                    table: row.string("table_name")?,
                    column: row.string("from_column")?,
                    referenced_table: row.string("referenced_table")?,
                    referenced_column: row.string("referenced_column")?,
                    name: None,
                })
            },
        ),
        Dialect::Mysql => Query::list(
            "SELECT TABLE_NAME as table_name, COLUMN_NAME as from_column, \
             REFERENCED_TABLE_NAME as referenced_table, \
             REFERENCED_COLUMN_NAME as referenced_column, CONSTRAINT_NAME as constraint_name \
             FROM information_schema.KEY_COLUMN_USAGE \
             WHERE REFERENCED_TABLE_SCHEMA=DATABASE() AND REFERENCED_TABLE_NAME=?",
            |row| {
                Ok(ForeignKeyConstraint {
                    table: row.string("table_name")?,
                    column: row.string("from_column")?,
                    referenced_table: row.string("referenced_table")?,
                    referenced_column: row.string("referenced_column")?,
                    name: row.opt_string("constraint_name")?,
                })
            },
        ),
    };
    tx.query(query.bind(table)).await
}

/// Plan tables whose collation is not utf8mb4; always empty on SQLite
pub async fn tables_with_wrong_charset(tx: &mut TransactionContext<'_>) -> Result<Vec<String>> {
    if tx.dialect() != Dialect::Mysql {
        return Ok(Vec::new());
    }
    let query = Query::list(
        "SELECT TABLE_NAME as table_name FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA=DATABASE() AND TABLE_NAME LIKE 'plan\\_%' \
         AND TABLE_COLLATION NOT LIKE 'utf8mb4%'",
        |row| row.string("table_name"),
    );
    tx.query(query).await
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::{SqlitePool, SqlitePoolConfig};
    use crate::core::connection::ConnectionPool;
    use crate::core::statement::Executable;

    async fn pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqlitePoolConfig::new(dir.path().join("plan.db")))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_table_and_column_lookups() {
        let (_dir, pool) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        assert!(!has_table(&mut tx, "plan_users").await.unwrap());
        tx.execute(Executable::new(
            "CREATE TABLE plan_users (id INTEGER PRIMARY KEY, name VARCHAR(16) NOT NULL, hostname VARCHAR(255))",
        ))
        .await
        .unwrap();

        assert!(has_table(&mut tx, "plan_users").await.unwrap());
        assert!(has_column(&mut tx, "plan_users", "name").await.unwrap());
        assert!(!has_column(&mut tx, "plan_users", "registered").await.unwrap());
        assert!(!is_column_nullable(&mut tx, "plan_users", "name").await.unwrap());
        assert!(is_column_nullable(&mut tx, "plan_users", "hostname").await.unwrap());
        assert_eq!(
            column_varchar_length(&mut tx, "plan_users", "name").await.unwrap(),
            VarcharLength::Unbounded
        );
        assert!(tables_with_wrong_charset(&mut tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_referencing_table() {
        let (_dir, pool) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        tx.execute(Executable::new("CREATE TABLE plan_users (id INTEGER PRIMARY KEY)"))
            .await
            .unwrap();
        tx.execute(Executable::new(
            "CREATE TABLE plan_sessions (id INTEGER PRIMARY KEY, user_id INTEGER, \
             FOREIGN KEY(user_id) REFERENCES plan_users(id))",
        ))
        .await
        .unwrap();

        let constraints = foreign_key_constraints_of(&mut tx, "plan_users").await.unwrap();
        assert_eq!(
            constraints,
            vec![ForeignKeyConstraint {
                table: "plan_sessions".to_string(),
                column: "user_id".to_string(),
                referenced_table: "plan_users".to_string(),
                referenced_column: "id".to_string(),
                name: None,
            }]
        );
        assert!(foreign_key_constraints_of(&mut tx, "plan_sessions")
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_varchar_fits() {
        assert!(VarcharLength::Bounded(250).fits(250));
        assert!(!VarcharLength::Bounded(50).fits(250));
        assert!(VarcharLength::Unbounded.fits(u32::MAX));
    }
}
