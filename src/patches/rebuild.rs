//! Rebuild-table sequence
//!
//! SQLite cannot drop or retype columns, so changing a table's shape means renaming it to
//! `<table>_temp`, creating the new shape under the original name, copying the rows across and
//! dropping the temp table. Each step can be repeated: the rename only happens while the temp
//! table is absent and a half-created target is dropped before it is created again.
//!
//! With foreign keys enforced, SQLite moves references held by other tables along with the
//! rename, so only tables nothing else references are rebuilt this way.

use crate::core::statement::{Executable, Query};
use super::PatchOutcome;
use crate::core::{Dialect, Result, TransactionContext};
use crate::schema::introspection::{foreign_key_constraints_of, has_table};
use tracing::debug;

/// Name the original table is parked under while it is rebuilt
pub fn temp_table_name(table: &str) -> String {
    format!("{}_temp", table)
}

/// One table rebuild
#[derive(Debug, Clone)]
pub struct TableRebuild {
    pub table: &'static str,
    /// CREATE TABLE statement of the new shape, without `IF NOT EXISTS`
    pub create_sql: String,
    /// Columns of the new table that are filled from the old rows
    pub columns: Vec<&'static str>,
    /// One SELECT expression per column, evaluated against the temp table
    pub select: Vec<String>,
    /// Rows of the temp table to keep
    pub filter: Option<String>,
}

impl TableRebuild {
    pub fn insert_select_sql(&self) -> String {
        let mut sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.table,
            self.columns.join(", "),
            self.select.join(", "),
            temp_table_name(self.table)
        );
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }
}

pub async fn rename_table(tx: &mut TransactionContext<'_>, from: &str, to: &str) -> Result<()> {
    let sql = tx.dialect().rename_table_sql(from, to);
    tx.execute(Executable::new(sql)).await?;
    Ok(())
}

/// Drop the foreign keys that reference `table`; SQLite cannot drop constraints and keeps them
async fn drop_foreign_keys_referencing(tx: &mut TransactionContext<'_>, table: &str) -> Result<()> {
    if tx.dialect() != Dialect::Mysql {
        return Ok(());
    }
    for constraint in foreign_key_constraints_of(tx, table).await? {
        if let Some(name) = constraint.name {
            debug!(
                table = constraint.table.as_str(),
                constraint = name.as_str(),
                "dropping foreign key"
            );
            tx.execute(Executable::new(format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                constraint.table, name
            )))
            .await?;
        }
    }
    Ok(())
}

async fn row_count(tx: &mut TransactionContext<'_>, table: &str) -> Result<i64> {
    tx.query(Query::count(format!("SELECT COUNT(1) as c FROM {}", table)))
        .await
}

/// Run the full rename-create-copy-drop sequence
///
/// Returns how many rows of the old table the filter left behind.
pub async fn rebuild_table(tx: &mut TransactionContext<'_>, rebuild: &TableRebuild) -> Result<u64> {
    let temp = temp_table_name(rebuild.table);
    let dialect = tx.dialect();

    if has_table(tx, &temp).await? {
        debug!(table = rebuild.table, "resuming interrupted rebuild");
    } else {
        rename_table(tx, rebuild.table, &temp).await?;
    }
    drop_foreign_keys_referencing(tx, &temp).await?;

    tx.execute(Executable::new(dialect.drop_table_if_exists_sql(rebuild.table)))
        .await?;
    tx.execute(Executable::new(rebuild.create_sql.clone()))
        .await?;
    tx.execute(Executable::new(rebuild.insert_select_sql()))
        .await?;
    let old_rows = row_count(tx, &temp).await?;
    let carried = row_count(tx, rebuild.table).await?;
    tx.execute(Executable::new(dialect.drop_table_if_exists_sql(&temp)))
        .await?;

    debug!(table = rebuild.table, old_rows, carried, "table rebuilt");
    Ok(u64::try_from(old_rows - carried).unwrap_or(0))
}

/// Rebuild `rebuild` and report the rows that could not be carried over
pub async fn apply_rebuild(
    tx: &mut TransactionContext<'_>,
    rebuild: &TableRebuild,
    missing: &str,
) -> Result<PatchOutcome> {
    let left_behind = rebuild_table(tx, rebuild).await?;
    if left_behind == 0 {
        return Ok(PatchOutcome::Applied);
    }
    Ok(PatchOutcome::AppliedWithWarning(format!(
        "{} rows of {} were not carried over because their {} no longer exist",
        left_behind, rebuild.table, missing
    )))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::{SqlitePool, SqlitePoolConfig};
    use crate::core::connection::ConnectionPool;
    use crate::core::value::RowExt;
    use crate::schema::introspection::has_column;

    fn widen_names() -> TableRebuild {
        TableRebuild {
            table: "plan_names",
            create_sql: "CREATE TABLE plan_names (id INTEGER PRIMARY KEY, name VARCHAR(75) NOT NULL, \
                         upper_name VARCHAR(75) NOT NULL)"
                .to_string(),
            columns: vec!["id", "name", "upper_name"],
            select: vec![
                "id".to_string(),
                "name".to_string(),
                "UPPER(name)".to_string(),
            ],
            filter: Some("name IS NOT NULL".to_string()),
        }
    }

    #[test]
    fn test_insert_select_sql() {
        assert_eq!(
            widen_names().insert_select_sql(),
            "INSERT INTO plan_names (id, name, upper_name) SELECT id, name, UPPER(name) \
             FROM plan_names_temp WHERE name IS NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_rebuild_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqlitePoolConfig::new(dir.path().join("plan.db")))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        tx.execute(Executable::new(
            "CREATE TABLE plan_names (id INTEGER PRIMARY KEY, name VARCHAR(75))",
        ))
        .await
        .unwrap();
        for name in ["a", "b"] {
            tx.execute(Executable::new("INSERT INTO plan_names (name) VALUES (?)").bind(name))
                .await
                .unwrap();
        }
        tx.execute(Executable::new("INSERT INTO plan_names (name) VALUES (NULL)"))
            .await
            .unwrap();

        // Interrupted after the rename with a half-built target in place.
        rename_table(&mut tx, "plan_names", "plan_names_temp")
            .await
            .unwrap();
        tx.execute(Executable::new("CREATE TABLE plan_names (id INTEGER PRIMARY KEY)"))
            .await
            .unwrap();

        let left_behind = rebuild_table(&mut tx, &widen_names()).await.unwrap();
        assert_eq!(left_behind, 1);

        assert!(!has_table(&mut tx, "plan_names_temp").await.unwrap());
        assert!(has_column(&mut tx, "plan_names", "upper_name").await.unwrap());
        let names = tx
            .query(Query::list(
                "SELECT upper_name FROM plan_names ORDER BY id",
                |row| row.string("upper_name"),
            ))
            .await
            .unwrap();
        assert_eq!(names, vec!["A", "B"]);
    }
}
