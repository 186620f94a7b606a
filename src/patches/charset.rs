//! MySQL character set conversion

use super::{Patch, PatchOutcome};
use crate::core::statement::Executable;
use crate::core::{Dialect, Result, TransactionContext};
use crate::schema::introspection::tables_with_wrong_charset;
use async_trait::async_trait;
use tracing::warn;

/// Converts Plan tables to utf8mb4 so that names with 4-byte characters can be stored
///
/// Cosmetic: a table that cannot be converted is reported and startup continues.
pub struct Utf8mb4CharsetPatch;

#[async_trait]
impl Patch for Utf8mb4CharsetPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        if tx.dialect() != Dialect::Mysql {
            return Ok(true);
        }
        Ok(tables_with_wrong_charset(tx).await?.is_empty())
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let mut failed = Vec::new();
        for table in tables_with_wrong_charset(tx).await? {
            if let Err(e) = tx.execute(Executable::new(convert_sql(&table))).await {
                warn!(table = table.as_str(), error = %e, "could not convert table to utf8mb4");
                failed.push(table);
            }
        }

        if failed.is_empty() {
            Ok(PatchOutcome::Applied)
        } else {
            Ok(PatchOutcome::AppliedWithWarning(unconverted_warning(&failed)))
        }
    }
}

fn convert_sql(table: &str) -> String {
    format!(
        "ALTER TABLE {} CONVERT TO CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci",
        table
    )
}

/// Names the tables left behind and the statement that converts each one
fn unconverted_warning(failed: &[String]) -> String {
    let statements: Vec<String> = failed.iter().map(|t| format!("{};", convert_sql(t))).collect();
    format!(
        "tables left in their old character set: {}. Names with 4-byte characters cannot be \
         stored in them until they are converted with: {}",
        failed.join(", "),
        statements.join(" ")
    )
}
