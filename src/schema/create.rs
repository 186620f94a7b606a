//! Creation of the latest schema

use super::tables::{create_table_statements, JoinAddressTable};
use crate::core::statement::{Executable, Query};
use crate::core::{Result, Transaction, TransactionContext};
use async_trait::async_trait;
use tracing::debug;

/// Creates every missing table of the latest schema
///
/// Existing tables are left as they are; bringing older shapes up to date is the job of the
/// patch catalog that runs afterwards.
#[derive(Debug, Default)]
pub struct CreateTablesTransaction;

#[async_trait]
impl Transaction for CreateTablesTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        for (table, sql) in create_table_statements(tx.dialect()) {
            debug!(table, "create table if missing");
            tx.execute(Executable::new(sql)).await?;
        }
        ensure_default_join_address(tx).await
    }
}

/// Sessions point at join address 1 until a real address is known, so the row must exist
pub(crate) async fn ensure_default_join_address(tx: &mut TransactionContext<'_>) -> Result<()> {
    let exists = tx
        .query(
            Query::exists(format!(
                "SELECT COUNT(1) as c FROM {} WHERE {}=?",
                JoinAddressTable::TABLE_NAME,
                JoinAddressTable::JOIN_ADDRESS
            ))
            .bind(JoinAddressTable::DEFAULT_VALUE_FOR_LOOKUP),
        )
        .await?;
    if !exists {
        tx.execute(
            Executable::new(format!(
                "INSERT INTO {} ({}) VALUES (?)",
                JoinAddressTable::TABLE_NAME,
                JoinAddressTable::JOIN_ADDRESS
            ))
            .bind(JoinAddressTable::DEFAULT_VALUE_FOR_LOOKUP),
        )
        .await?;
    }
    Ok(())
}
