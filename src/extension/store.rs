//! Transactions that store what extension plugins report
//!
//! Metadata (plugins, providers and table providers) is upserted: an UPDATE first and an INSERT
//! only when the UPDATE matched nothing. Values are addressed by plugin name, server uuid and
//! provider name. Storing a value for a provider that was never stored is an operation error.

use super::invalidation::{
    RemoveUnsatisfiedConditionalPlayerResultsTransaction,
    RemoveUnsatisfiedConditionalServerResultsTransaction,
};
use crate::core::query_builder::{insert_sql, update_sql};
use crate::core::statement::{BatchExecutable, Executable, Query};
use crate::core::value::{DatabaseValue, RowExt};
use crate::core::{DatabaseError, Result, Transaction, TransactionContext};
use crate::schema::tables::{
    ExtensionGroupsTable, ExtensionPlayerTableValueTable, ExtensionPlayerValueTable,
    ExtensionPluginTable, ExtensionProviderTable, ExtensionServerTableValueTable,
    ExtensionServerValueTable, ExtensionTableProviderTable, EXTENSION_VALUE_LENGTH,
};
use async_trait::async_trait;
use tracing::debug;

const VALUE_LENGTH: usize = EXTENSION_VALUE_LENGTH as usize;
const NAME_LENGTH: usize = 50;
const CONDITION_LENGTH: usize = ExtensionProviderTable::CONDITION_LENGTH as usize;

/// First `max_chars` characters of `value`
pub fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

async fn upsert(
    tx: &mut TransactionContext<'_>,
    update: Executable,
    insert: Executable,
) -> Result<()> {
    if !tx.execute(update).await? {
        tx.execute(insert).await?;
    }
    Ok(())
}

/// Identifies one provider (or table provider) of one plugin on one server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub plugin_name: String,
    pub server_uuid: String,
    pub provider_name: String,
}

impl ProviderKey {
    pub fn new(
        plugin_name: impl Into<String>,
        server_uuid: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            server_uuid: server_uuid.into(),
            provider_name: provider_name.into(),
        }
    }
}

async fn plugin_id(
    tx: &mut TransactionContext<'_>,
    plugin_name: &str,
    server_uuid: &str,
) -> Result<i64> {
    let sql = format!("SELECT {} as id", ExtensionPluginTable::statement_select_plugin_id());
    tx.query(
        Query::first(sql, |row| row.opt_long("id"))
            .bind(plugin_name)
            .bind(server_uuid),
    )
    .await?
    .flatten()
    .ok_or_else(|| {
        DatabaseError::operation(format!(
            "Plugin '{}' of server {} has not been stored",
            plugin_name, server_uuid
        ))
    })
}

async fn provider_id(tx: &mut TransactionContext<'_>, key: &ProviderKey) -> Result<i64> {
    let sql = format!(
        "SELECT {} as id FROM {} WHERE {}=? AND {}={}",
        ExtensionProviderTable::ID,
        ExtensionProviderTable::TABLE_NAME,
        ExtensionProviderTable::PROVIDER_NAME,
        ExtensionProviderTable::PLUGIN_ID,
        ExtensionPluginTable::statement_select_plugin_id()
    );
    tx.query(
        Query::first(sql, |row| row.long("id"))
            .bind(&key.provider_name)
            .bind(&key.plugin_name)
            .bind(&key.server_uuid),
    )
    .await?
    .ok_or_else(|| {
        DatabaseError::operation(format!(
            "Provider '{}' of plugin '{}' on server {} has not been stored",
            key.provider_name, key.plugin_name, key.server_uuid
        ))
    })
}

async fn table_id(tx: &mut TransactionContext<'_>, key: &ProviderKey) -> Result<i64> {
    let sql = format!(
        "SELECT {} as id FROM {} WHERE {}=? AND {}={}",
        ExtensionTableProviderTable::ID,
        ExtensionTableProviderTable::TABLE_NAME,
        ExtensionTableProviderTable::TABLE_NAME_COLUMN,
        ExtensionTableProviderTable::PLUGIN_ID,
        ExtensionPluginTable::statement_select_plugin_id()
    );
    tx.query(
        Query::first(sql, |row| row.long("id"))
            .bind(&key.provider_name)
            .bind(&key.plugin_name)
            .bind(&key.server_uuid),
    )
    .await?
    .ok_or_else(|| {
        DatabaseError::operation(format!(
            "Table '{}' of plugin '{}' on server {} has not been stored",
            key.provider_name, key.plugin_name, key.server_uuid
        ))
    })
}

/// Records that a plugin reported on a server
#[derive(Debug, Clone)]
pub struct StorePluginTransaction {
    plugin_name: String,
    server_uuid: String,
    last_updated: i64,
}

impl StorePluginTransaction {
    /// Stamped with the current time
    pub fn new(plugin_name: impl Into<String>, server_uuid: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            server_uuid: server_uuid.into(),
            last_updated: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Use `epoch_ms` as the update time instead of now
    pub fn with_last_updated(mut self, epoch_ms: i64) -> Self {
        self.last_updated = epoch_ms;
        self
    }
}

#[async_trait]
impl Transaction for StorePluginTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        let params: Vec<DatabaseValue> = vec![
            self.last_updated.into(),
            (&self.plugin_name).into(),
            (&self.server_uuid).into(),
        ];
        let update = Executable::with_params(
            update_sql(
                ExtensionPluginTable::TABLE_NAME,
                &[ExtensionPluginTable::LAST_UPDATED],
                &[
                    ExtensionPluginTable::PLUGIN_NAME,
                    ExtensionPluginTable::SERVER_UUID,
                ],
            ),
            params.clone(),
        );
        let insert = Executable::with_params(
            insert_sql(
                ExtensionPluginTable::TABLE_NAME,
                &[
                    ExtensionPluginTable::LAST_UPDATED,
                    ExtensionPluginTable::PLUGIN_NAME,
                    ExtensionPluginTable::SERVER_UUID,
                ],
            ),
            params,
        );
        upsert(tx, update, insert).await
    }
}

/// Description of a value provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderInformation {
    pub plugin_name: String,
    pub name: String,
    pub text: String,
    pub description: Option<String>,
    pub priority: i32,
    pub groupable: bool,
    /// Condition that must hold for this provider's values to be kept
    pub condition: Option<String>,
    /// Condition this boolean provider asserts
    pub provided_condition: Option<String>,
    pub format_type: Option<String>,
    pub hidden: bool,
    pub is_player_name: bool,
    pub show_in_players_table: bool,
}

#[derive(Debug, Clone)]
pub struct StoreProviderTransaction {
    server_uuid: String,
    provider: ProviderInformation,
}

impl StoreProviderTransaction {
    pub fn new(server_uuid: impl Into<String>, provider: ProviderInformation) -> Self {
        Self {
            server_uuid: server_uuid.into(),
            provider,
        }
    }
}

#[async_trait]
impl Transaction for StoreProviderTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        let provider = &self.provider;
        let plugin_id = plugin_id(tx, &provider.plugin_name, &self.server_uuid).await?;

        let columns = [
            ExtensionProviderTable::TEXT,
            ExtensionProviderTable::DESCRIPTION,
            ExtensionProviderTable::PRIORITY,
            ExtensionProviderTable::GROUPABLE,
            ExtensionProviderTable::CONDITION,
            ExtensionProviderTable::PROVIDED_CONDITION,
            ExtensionProviderTable::FORMAT_TYPE,
            ExtensionProviderTable::HIDDEN,
            ExtensionProviderTable::IS_PLAYER_NAME,
            ExtensionProviderTable::SHOW_IN_PLAYERS_TABLE,
        ];
        let keys = [
            ExtensionProviderTable::PROVIDER_NAME,
            ExtensionProviderTable::PLUGIN_ID,
        ];
        let params: Vec<DatabaseValue> = vec![
            truncate(&provider.text, NAME_LENGTH).into(),
            provider.description.as_deref().map(|d| truncate(d, 150)).into(),
            provider.priority.into(),
            provider.groupable.into(),
            provider.condition.as_deref().map(|c| truncate(c, CONDITION_LENGTH)).into(),
            provider
                .provided_condition
                .as_deref()
                .map(|c| truncate(c, NAME_LENGTH))
                .into(),
            provider.format_type.as_ref().into(),
            provider.hidden.into(),
            provider.is_player_name.into(),
            provider.show_in_players_table.into(),
            truncate(&provider.name, NAME_LENGTH).into(),
            plugin_id.into(),
        ];

        let update = Executable::with_params(
            update_sql(ExtensionProviderTable::TABLE_NAME, &columns, &keys),
            params.clone(),
        );
        let all_columns: Vec<&str> = columns.iter().chain(keys.iter()).copied().collect();
        let insert = Executable::with_params(
            insert_sql(ExtensionProviderTable::TABLE_NAME, &all_columns),
            params,
        );
        upsert(tx, update, insert).await
    }
}

/// Description of a table provider; at most four columns are kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableInformation {
    pub plugin_name: String,
    pub name: String,
    pub columns: Vec<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreTableProviderTransaction {
    server_uuid: String,
    table: TableInformation,
}

impl StoreTableProviderTransaction {
    pub fn new(server_uuid: impl Into<String>, table: TableInformation) -> Self {
        Self {
            server_uuid: server_uuid.into(),
            table,
        }
    }
}

#[async_trait]
impl Transaction for StoreTableProviderTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        let table = &self.table;
        let plugin_id = plugin_id(tx, &table.plugin_name, &self.server_uuid).await?;

        let mut columns: Vec<&str> = ExtensionTableProviderTable::COLUMNS.to_vec();
        columns.push(ExtensionTableProviderTable::CONDITION);
        let keys = [
            ExtensionTableProviderTable::TABLE_NAME_COLUMN,
            ExtensionTableProviderTable::PLUGIN_ID,
        ];

        let mut params: Vec<DatabaseValue> = (0..ExtensionTableProviderTable::COLUMNS.len())
            .map(|i| table.columns.get(i).map(|c| truncate(c, NAME_LENGTH)).into())
            .collect();
        params.push(
            table
                .condition
                .as_deref()
                .map(|c| truncate(c, CONDITION_LENGTH))
                .into(),
        );
        params.push(truncate(&table.name, NAME_LENGTH).into());
        params.push(plugin_id.into());

        let update = Executable::with_params(
            update_sql(ExtensionTableProviderTable::TABLE_NAME, &columns, &keys),
            params.clone(),
        );
        columns.extend(keys);
        let insert = Executable::with_params(
            insert_sql(ExtensionTableProviderTable::TABLE_NAME, &columns),
            params,
        );
        upsert(tx, update, insert).await
    }
}

/// Store one value column of a provider for a player, or for the server when `player_uuid` is
/// `None`. Both value tables use the same value column names.
async fn store_value(
    tx: &mut TransactionContext<'_>,
    key: &ProviderKey,
    player_uuid: Option<&str>,
    column: &'static str,
    value: DatabaseValue,
) -> Result<()> {
    let provider_id = provider_id(tx, key).await?;
    let (table, keys) = match player_uuid {
        Some(_) => (
            ExtensionPlayerValueTable::TABLE_NAME,
            vec![
                ExtensionPlayerValueTable::PROVIDER_ID,
                ExtensionPlayerValueTable::USER_UUID,
            ],
        ),
        None => (
            ExtensionServerValueTable::TABLE_NAME,
            vec![ExtensionServerValueTable::PROVIDER_ID],
        ),
    };

    let mut params = vec![value, provider_id.into()];
    if let Some(uuid) = player_uuid {
        params.push(uuid.into());
    }

    let update = Executable::with_params(update_sql(table, &[column], &keys), params.clone());
    let mut columns = vec![column];
    columns.extend(keys);
    let insert = Executable::with_params(insert_sql(table, &columns), params);
    upsert(tx, update, insert).await
}

/// Boolean values may change which conditions hold, so the stored value is committed and every
/// conditional value is re-checked.
async fn store_boolean(
    tx: &mut TransactionContext<'_>,
    key: &ProviderKey,
    player_uuid: Option<&str>,
    value: bool,
) -> Result<()> {
    store_value(
        tx,
        key,
        player_uuid,
        ExtensionPlayerValueTable::BOOLEAN_VALUE,
        value.into(),
    )
    .await?;
    tx.commit_mid_transaction().await?;

    let mut players = RemoveUnsatisfiedConditionalPlayerResultsTransaction::default();
    tx.execute_other(&mut players).await?;
    let mut servers = RemoveUnsatisfiedConditionalServerResultsTransaction::default();
    tx.execute_other(&mut servers).await?;

    debug!(
        provider = key.provider_name.as_str(),
        removed = players.removed() + servers.removed(),
        "conditional values re-checked"
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct StorePlayerBooleanResultTransaction {
    key: ProviderKey,
    player_uuid: String,
    value: bool,
}

impl StorePlayerBooleanResultTransaction {
    pub fn new(key: ProviderKey, player_uuid: impl Into<String>, value: bool) -> Self {
        Self {
            key,
            player_uuid: player_uuid.into(),
            value,
        }
    }
}

#[async_trait]
impl Transaction for StorePlayerBooleanResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_boolean(tx, &self.key, Some(&self.player_uuid), self.value).await
    }
}

#[derive(Debug, Clone)]
pub struct StoreServerBooleanResultTransaction {
    key: ProviderKey,
    value: bool,
}

impl StoreServerBooleanResultTransaction {
    pub fn new(key: ProviderKey, value: bool) -> Self {
        Self { key, value }
    }
}

#[async_trait]
impl Transaction for StoreServerBooleanResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_boolean(tx, &self.key, None, self.value).await
    }
}

/// A numeric provider value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Long(i64),
    Double(f64),
    /// Fraction between 0 and 1
    Percentage(f64),
}

impl NumberValue {
    fn column(&self) -> &'static str {
        match self {
            NumberValue::Long(_) => ExtensionPlayerValueTable::LONG_VALUE,
            NumberValue::Double(_) => ExtensionPlayerValueTable::DOUBLE_VALUE,
            NumberValue::Percentage(_) => ExtensionPlayerValueTable::PERCENTAGE_VALUE,
        }
    }
}

impl From<NumberValue> for DatabaseValue {
    fn from(value: NumberValue) -> Self {
        match value {
            NumberValue::Long(v) => DatabaseValue::Long(v),
            NumberValue::Double(v) | NumberValue::Percentage(v) => DatabaseValue::Double(v),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorePlayerNumberResultTransaction {
    key: ProviderKey,
    player_uuid: String,
    value: NumberValue,
}

impl StorePlayerNumberResultTransaction {
    pub fn new(key: ProviderKey, player_uuid: impl Into<String>, value: NumberValue) -> Self {
        Self {
            key,
            player_uuid: player_uuid.into(),
            value,
        }
    }
}

#[async_trait]
impl Transaction for StorePlayerNumberResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_value(
            tx,
            &self.key,
            Some(&self.player_uuid),
            self.value.column(),
            self.value.into(),
        )
        .await
    }
}

#[derive(Debug, Clone)]
pub struct StoreServerNumberResultTransaction {
    key: ProviderKey,
    value: NumberValue,
}

impl StoreServerNumberResultTransaction {
    pub fn new(key: ProviderKey, value: NumberValue) -> Self {
        Self { key, value }
    }
}

#[async_trait]
impl Transaction for StoreServerNumberResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_value(tx, &self.key, None, self.value.column(), self.value.into()).await
    }
}

/// Stores a string value, cut to the width of the value column
#[derive(Debug, Clone)]
pub struct StorePlayerStringResultTransaction {
    key: ProviderKey,
    player_uuid: String,
    value: String,
}

impl StorePlayerStringResultTransaction {
    pub fn new(key: ProviderKey, player_uuid: impl Into<String>, value: &str) -> Self {
        Self {
            key,
            player_uuid: player_uuid.into(),
            value: truncate(value, VALUE_LENGTH),
        }
    }
}

#[async_trait]
impl Transaction for StorePlayerStringResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_value(
            tx,
            &self.key,
            Some(&self.player_uuid),
            ExtensionPlayerValueTable::STRING_VALUE,
            (&self.value).into(),
        )
        .await
    }
}

#[derive(Debug, Clone)]
pub struct StoreServerStringResultTransaction {
    key: ProviderKey,
    value: String,
}

impl StoreServerStringResultTransaction {
    pub fn new(key: ProviderKey, value: &str) -> Self {
        Self {
            key,
            value: truncate(value, VALUE_LENGTH),
        }
    }
}

#[async_trait]
impl Transaction for StoreServerStringResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_value(
            tx,
            &self.key,
            None,
            ExtensionServerValueTable::STRING_VALUE,
            (&self.value).into(),
        )
        .await
    }
}

/// Replaces the groups a provider reports for a player
#[derive(Debug, Clone)]
pub struct StorePlayerGroupsResultTransaction {
    key: ProviderKey,
    player_uuid: String,
    groups: Vec<String>,
}

impl StorePlayerGroupsResultTransaction {
    pub fn new(key: ProviderKey, player_uuid: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            key,
            player_uuid: player_uuid.into(),
            groups,
        }
    }
}

#[async_trait]
impl Transaction for StorePlayerGroupsResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        let provider_id = provider_id(tx, &self.key).await?;
        tx.execute(
            Executable::new(format!(
                "DELETE FROM {} WHERE {}=? AND {}=?",
                ExtensionGroupsTable::TABLE_NAME,
                ExtensionGroupsTable::PROVIDER_ID,
                ExtensionGroupsTable::USER_UUID
            ))
            .bind(provider_id)
            .bind(&self.player_uuid),
        )
        .await?;

        let mut insert = BatchExecutable::new(insert_sql(
            ExtensionGroupsTable::TABLE_NAME,
            &[
                ExtensionGroupsTable::PROVIDER_ID,
                ExtensionGroupsTable::USER_UUID,
                ExtensionGroupsTable::GROUP_NAME,
            ],
        ));
        for group in &self.groups {
            insert.add_row(vec![
                provider_id.into(),
                (&self.player_uuid).into(),
                truncate(group, ExtensionGroupsTable::GROUP_NAME_LENGTH).into(),
            ]);
        }
        tx.execute_batch(insert).await?;
        Ok(())
    }
}

/// Replace the rows of a table provider; `key.provider_name` is the table name
async fn store_table_rows(
    tx: &mut TransactionContext<'_>,
    key: &ProviderKey,
    player_uuid: Option<&str>,
    rows: &[Vec<String>],
) -> Result<()> {
    let table_id = table_id(tx, key).await?;

    let (table, mut columns, values, table_row) = match player_uuid {
        Some(_) => (
            ExtensionPlayerTableValueTable::TABLE_NAME,
            vec![
                ExtensionPlayerTableValueTable::TABLE_ID,
                ExtensionPlayerTableValueTable::USER_UUID,
            ],
            ExtensionPlayerTableValueTable::VALUES,
            ExtensionPlayerTableValueTable::TABLE_ROW,
        ),
        None => (
            ExtensionServerTableValueTable::TABLE_NAME,
            vec![ExtensionServerTableValueTable::TABLE_ID],
            ExtensionServerTableValueTable::VALUES,
            ExtensionServerTableValueTable::TABLE_ROW,
        ),
    };

    let filter: Vec<String> = columns.iter().map(|c| format!("{}=?", c)).collect();
    let mut key_params: Vec<DatabaseValue> = vec![table_id.into()];
    if let Some(uuid) = player_uuid {
        key_params.push(uuid.into());
    }
    tx.execute(Executable::with_params(
        format!("DELETE FROM {} WHERE {}", table, filter.join(" AND ")),
        key_params.clone(),
    ))
    .await?;

    columns.extend(values);
    columns.push(table_row);
    let mut insert = BatchExecutable::new(insert_sql(table, &columns));
    for (index, row) in rows.iter().enumerate() {
        let mut params = key_params.clone();
        for i in 0..values.len() {
            params.push(row.get(i).map(|cell| truncate(cell, VALUE_LENGTH)).into());
        }
        params.push((index as i64).into());
        insert.add_row(params);
    }
    tx.execute_batch(insert).await?;
    Ok(())
}

/// Replaces the rows of a player table; the key's provider name is the table name
#[derive(Debug, Clone)]
pub struct StorePlayerTableResultTransaction {
    key: ProviderKey,
    player_uuid: String,
    rows: Vec<Vec<String>>,
}

impl StorePlayerTableResultTransaction {
    pub fn new(key: ProviderKey, player_uuid: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            key,
            player_uuid: player_uuid.into(),
            rows,
        }
    }
}

#[async_trait]
impl Transaction for StorePlayerTableResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_table_rows(tx, &self.key, Some(&self.player_uuid), &self.rows).await
    }
}

#[derive(Debug, Clone)]
pub struct StoreServerTableResultTransaction {
    key: ProviderKey,
    rows: Vec<Vec<String>>,
}

impl StoreServerTableResultTransaction {
    pub fn new(key: ProviderKey, rows: Vec<Vec<String>>) -> Self {
        Self { key, rows }
    }
}

#[async_trait]
impl Transaction for StoreServerTableResultTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        store_table_rows(tx, &self.key, None, &self.rows).await
    }
}
