//! Direct mutation patches: added columns, dropped tables and widened columns

use super::rebuild::{apply_rebuild, temp_table_name, TableRebuild};
use super::{Patch, PatchOutcome};
use crate::core::query_builder::{ColumnDef, SqlType};
use crate::core::statement::{Executable, Query};
use crate::core::{Result, TransactionContext};
use crate::schema::introspection::{
    column_varchar_length, has_column, has_table, is_column_nullable,
};
use crate::schema::tables::{ServerTable, UserInfoTable, UsersTable};
use async_trait::async_trait;

/// Adds one column with its default
pub struct AddColumnPatch {
    name: &'static str,
    table: &'static str,
    column: ColumnDef,
}

impl AddColumnPatch {
    pub fn new(name: &'static str, table: &'static str, column: ColumnDef) -> Self {
        Self {
            name,
            table,
            column,
        }
    }
}

#[async_trait]
impl Patch for AddColumnPatch {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        has_column(tx, self.table, self.column.name()).await
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        add_column(tx, self.table, &self.column).await?;
        Ok(PatchOutcome::Applied)
    }
}

pub(crate) async fn add_column(
    tx: &mut TransactionContext<'_>,
    table: &str,
    column: &ColumnDef,
) -> Result<()> {
    let dialect = tx.dialect();
    let sql = dialect.add_column_sql(table, &column.to_sql(dialect));
    tx.execute(Executable::new(sql)).await?;
    Ok(())
}

/// Drops a table that is no longer used
pub struct DropTablePatch {
    name: &'static str,
    table: &'static str,
}

impl DropTablePatch {
    pub fn new(name: &'static str, table: &'static str) -> Self {
        Self { name, table }
    }
}

#[async_trait]
impl Patch for DropTablePatch {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        Ok(!has_table(tx, self.table).await?)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let sql = tx.dialect().drop_table_if_exists_sql(self.table);
        tx.execute(Executable::new(sql)).await?;
        Ok(PatchOutcome::Applied)
    }
}

/// Widens VARCHAR columns in place
///
/// Only MySQL enforces widths; on SQLite the check always reports the patch as applied.
pub struct WidenVarcharPatch {
    name: &'static str,
    columns: Vec<(&'static str, ColumnDef)>,
}

impl WidenVarcharPatch {
    /// `columns` pairs a table with the full new definition of one of its columns
    pub fn new(name: &'static str, columns: Vec<(&'static str, ColumnDef)>) -> Self {
        Self { name, columns }
    }

    async fn too_narrow(
        tx: &mut TransactionContext<'_>,
        table: &str,
        column: &ColumnDef,
    ) -> Result<bool> {
        let wanted = match column.sql_type() {
            SqlType::Varchar(length) => length,
            _ => return Ok(false),
        };
        let current = column_varchar_length(tx, table, column.name()).await?;
        Ok(!current.fits(wanted))
    }
}

#[async_trait]
impl Patch for WidenVarcharPatch {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        for (table, column) in &self.columns {
            if Self::too_narrow(tx, table, column).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let dialect = tx.dialect();
        for (table, column) in &self.columns {
            if !Self::too_narrow(tx, table, column).await? {
                continue;
            }
            if let Some(sql) = dialect.modify_column_sql(table, &column.to_sql(dialect)) {
                tx.execute(Executable::new(sql)).await?;
            }
        }
        Ok(PatchOutcome::Applied)
    }
}

/// Adds `plan_servers.is_proxy` and flags the servers that were registered as proxies by name
///
/// On MySQL the column is committed before the flags are written, so the patch only counts as
/// applied once no legacy proxy is left unflagged.
pub struct ServerIsProxyPatch;

impl ServerIsProxyPatch {
    /// Name legacy proxy servers were stored under
    const LEGACY_PROXY_NAME: &'static str = "BungeeCord";

    fn unflagged_proxies() -> Query<i64> {
        Query::count(format!(
            "SELECT COUNT(1) as c FROM {} WHERE {}=? AND {}=?",
            ServerTable::TABLE_NAME,
            ServerTable::NAME,
            ServerTable::PROXY
        ))
        .bind(Self::LEGACY_PROXY_NAME)
        .bind(false)
    }
}

#[async_trait]
impl Patch for ServerIsProxyPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        if !has_column(tx, ServerTable::TABLE_NAME, ServerTable::PROXY).await? {
            return Ok(false);
        }
        Ok(tx.query(Self::unflagged_proxies()).await? == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        if !has_column(tx, ServerTable::TABLE_NAME, ServerTable::PROXY).await? {
            let column = ColumnDef::new(ServerTable::PROXY, SqlType::Boolean)
                .not_null()
                .default_bool(false);
            add_column(tx, ServerTable::TABLE_NAME, &column).await?;
        }

        tx.execute(
            Executable::new(format!(
                "UPDATE {} SET {}=? WHERE {}=?",
                ServerTable::TABLE_NAME,
                ServerTable::PROXY,
                ServerTable::NAME
            ))
            .bind(true)
            .bind(Self::LEGACY_PROXY_NAME),
        )
        .await?;
        Ok(PatchOutcome::Applied)
    }
}

/// Makes `plan_user_info.hostname` nullable
///
/// MySQL changes the column in place; SQLite rebuilds the table.
pub struct UserInfoHostnameAllowNullPatch;

#[async_trait]
impl Patch for UserInfoHostnameAllowNullPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        let nullable =
            is_column_nullable(tx, UserInfoTable::TABLE_NAME, UserInfoTable::HOSTNAME).await?;
        Ok(nullable && !has_table(tx, &temp_table_name(UserInfoTable::TABLE_NAME)).await?)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let dialect = tx.dialect();
        let column = ColumnDef::new(UserInfoTable::HOSTNAME, SqlType::Varchar(255));
        let modify = dialect.modify_column_sql(UserInfoTable::TABLE_NAME, &column.to_sql(dialect));
        if let Some(sql) = modify {
            tx.execute(Executable::new(sql)).await?;
            return Ok(PatchOutcome::Applied);
        }

        let columns = vec![
            UserInfoTable::ID,
            UserInfoTable::USER_ID,
            UserInfoTable::SERVER_ID,
            UserInfoTable::REGISTERED,
            UserInfoTable::OP,
            UserInfoTable::BANNED,
            UserInfoTable::HOSTNAME,
        ];
        let rebuild = TableRebuild {
            table: UserInfoTable::TABLE_NAME,
            create_sql: UserInfoTable::builder(dialect).build(),
            select: columns.iter().map(|c| c.to_string()).collect(),
            columns,
            filter: Some(format!(
                "{} IN (SELECT {} FROM {}) AND {} IN (SELECT {} FROM {})",
                UserInfoTable::USER_ID,
                UsersTable::ID,
                UsersTable::TABLE_NAME,
                UserInfoTable::SERVER_ID,
                ServerTable::ID,
                ServerTable::TABLE_NAME
            )),
        };
        apply_rebuild(tx, &rebuild, "players or servers").await
    }
}
