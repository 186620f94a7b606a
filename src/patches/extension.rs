//! Patches for the extension data tables

use super::columns::add_column;
use super::{Patch, PatchOutcome};
use crate::core::query_builder::{ColumnDef, SqlType};
use crate::core::statement::{Executable, Query};
use crate::core::{Result, TransactionContext};
use crate::schema::introspection::has_column;
use crate::schema::tables::{ExtensionPlayerTableValueTable, ExtensionServerTableValueTable};
use async_trait::async_trait;

/// Adds `table_row` to a table value table and numbers the rows stored before it existed
///
/// Rows are numbered per table (and per player for player tables) in id order, starting at 0.
pub struct TableRowPatch {
    name: &'static str,
    table: &'static str,
    /// Columns that identify one displayed table
    partition: &'static [&'static str],
}

const TABLE_ROW: &str = "table_row";

impl TableRowPatch {
    pub fn player() -> Self {
        Self {
            name: "PlayerTableRowPatch",
            table: ExtensionPlayerTableValueTable::TABLE_NAME,
            partition: &[
                ExtensionPlayerTableValueTable::TABLE_ID,
                ExtensionPlayerTableValueTable::USER_UUID,
            ],
        }
    }

    pub fn server() -> Self {
        Self {
            name: "ServerTableRowPatch",
            table: ExtensionServerTableValueTable::TABLE_NAME,
            partition: &[ExtensionServerTableValueTable::TABLE_ID],
        }
    }

    fn duplicate_rows_sql(&self) -> String {
        let group = format!("{}, {}", self.partition.join(", "), TABLE_ROW);
        format!(
            "SELECT COUNT(1) as c FROM (SELECT {group} FROM {table} GROUP BY {group} \
             HAVING COUNT(1) > 1) duplicates",
            group = group,
            table = self.table
        )
    }

    /// MySQL refuses to read the table being updated unless the read goes through a derived
    /// table it materializes; DISTINCT keeps the optimizer from merging it away.
    fn numbering_sql(&self) -> String {
        let matches: Vec<String> = self
            .partition
            .iter()
            .map(|c| format!("previous.{c}={table}.{c}", c = c, table = self.table))
            .collect();
        format!(
            "UPDATE {table} SET {row}=(SELECT COUNT(1) FROM \
             (SELECT DISTINCT id, {partition} FROM {table}) previous \
             WHERE {matches} AND previous.id<{table}.id)",
            table = self.table,
            row = TABLE_ROW,
            partition = self.partition.join(", "),
            matches = matches.join(" AND ")
        )
    }
}

#[async_trait]
impl Patch for TableRowPatch {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        if !has_column(tx, self.table, TABLE_ROW).await? {
            return Ok(false);
        }
        let duplicates = tx.query(Query::count(self.duplicate_rows_sql())).await?;
        Ok(duplicates == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        if !has_column(tx, self.table, TABLE_ROW).await? {
            let column = ColumnDef::new(TABLE_ROW, SqlType::Int)
                .not_null()
                .default_int(0);
            add_column(tx, self.table, &column).await?;
        }
        tx.execute(Executable::new(self.numbering_sql())).await?;
        Ok(PatchOutcome::Applied)
    }
}
