//! Removal of extension values whose gating condition no longer holds
//!
//! A provider (or table provider) may declare a `condition_name`. Its values are only valid while
//! a boolean provider of the same plugin asserts that condition for the same subject. A boolean
//! provider with `provided_condition = X` satisfies `X` when its value is true and `not_X` when
//! it is false.
//!
//! Unsatisfied rows are found with an anti-join against the satisfied set, read by id with a
//! locking select and then deleted by id. Deleting through a subquery over the same table would
//! be refused by MySQL.

use crate::core::statement::{BatchExecutable, Query};
use crate::core::value::RowExt;
use crate::core::{Dialect, Result, Transaction, TransactionContext};
use crate::schema::tables::{
    ExtensionGroupsTable, ExtensionPlayerTableValueTable, ExtensionPlayerValueTable,
    ExtensionProviderTable, ExtensionServerTableValueTable, ExtensionServerValueTable,
    ExtensionTableProviderTable,
};
use async_trait::async_trait;
use tracing::debug;

/// Prefix that negates a condition name
pub const NEGATION_PREFIX: &str = "not_";

/// Name of the condition a boolean value satisfies
pub fn satisfied_condition_name(provided_condition: &str, value: bool) -> String {
    if value {
        provided_condition.to_string()
    } else {
        format!("{}{}", NEGATION_PREFIX, provided_condition)
    }
}

/// Whose conditions are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionScope {
    /// Conditions are per player; values match on plugin and player uuid
    Player,
    /// Conditions are per server; values match on plugin only
    Server,
}

/// A table holding conditional values and the table that declares their condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConditionalValues {
    table: &'static str,
    declaring_table: &'static str,
    /// Column of `table` that references `declaring_table`
    declaring_key: &'static str,
}

impl ConditionScope {
    fn boolean_values_table(self) -> &'static str {
        match self {
            ConditionScope::Player => ExtensionPlayerValueTable::TABLE_NAME,
            ConditionScope::Server => ExtensionServerValueTable::TABLE_NAME,
        }
    }

    fn subject_column(self) -> Option<&'static str> {
        match self {
            ConditionScope::Player => Some(ExtensionPlayerValueTable::USER_UUID),
            ConditionScope::Server => None,
        }
    }

    fn conditional_values(self) -> Vec<ConditionalValues> {
        match self {
            ConditionScope::Player => vec![
                ConditionalValues {
                    table: ExtensionPlayerValueTable::TABLE_NAME,
                    declaring_table: ExtensionProviderTable::TABLE_NAME,
                    declaring_key: ExtensionPlayerValueTable::PROVIDER_ID,
                },
                ConditionalValues {
                    table: ExtensionGroupsTable::TABLE_NAME,
                    declaring_table: ExtensionProviderTable::TABLE_NAME,
                    declaring_key: ExtensionGroupsTable::PROVIDER_ID,
                },
                ConditionalValues {
                    table: ExtensionPlayerTableValueTable::TABLE_NAME,
                    declaring_table: ExtensionTableProviderTable::TABLE_NAME,
                    declaring_key: ExtensionPlayerTableValueTable::TABLE_ID,
                },
            ],
            ConditionScope::Server => vec![
                ConditionalValues {
                    table: ExtensionServerValueTable::TABLE_NAME,
                    declaring_table: ExtensionProviderTable::TABLE_NAME,
                    declaring_key: ExtensionServerValueTable::PROVIDER_ID,
                },
                ConditionalValues {
                    table: ExtensionServerTableValueTable::TABLE_NAME,
                    declaring_table: ExtensionTableProviderTable::TABLE_NAME,
                    declaring_key: ExtensionServerTableValueTable::TABLE_ID,
                },
            ],
        }
    }

    /// Subquery of satisfied `(condition_name, plugin_id[, uuid])` rows
    ///
    /// Binds two parameters: `true` then `false`.
    pub fn satisfied_conditions_sql(self, dialect: Dialect) -> String {
        let subject = match self.subject_column() {
            Some(column) => format!(", v.{} as uuid", column),
            None => String::new(),
        };
        let select = |condition: String| {
            format!(
                "SELECT {condition} as condition_name, p.{plugin_id} as plugin_id{subject} \
                 FROM {values} v JOIN {providers} p ON p.{id}=v.{provider_id} \
                 WHERE v.{boolean}=? AND p.{provided} IS NOT NULL",
                condition = condition,
                plugin_id = ExtensionProviderTable::PLUGIN_ID,
                subject = subject,
                values = self.boolean_values_table(),
                providers = ExtensionProviderTable::TABLE_NAME,
                id = ExtensionProviderTable::ID,
                provider_id = ExtensionPlayerValueTable::PROVIDER_ID,
                boolean = ExtensionPlayerValueTable::BOOLEAN_VALUE,
                provided = ExtensionProviderTable::PROVIDED_CONDITION,
            )
        };
        let provided = format!("p.{}", ExtensionProviderTable::PROVIDED_CONDITION);
        let negated = dialect.concat(&[&format!("'{}'", NEGATION_PREFIX), &provided]);
        format!("{} UNION {}", select(provided.clone()), select(negated))
    }

    fn unsatisfied_ids_sql(self, dialect: Dialect, values: &ConditionalValues) -> String {
        let subject = match self.subject_column() {
            Some(column) => format!(" AND q.uuid=v.{}", column),
            None => String::new(),
        };
        format!(
            "SELECT v.id as id FROM {table} v \
             JOIN {declaring} d ON d.id=v.{key} \
             LEFT JOIN ({satisfied}) q ON q.condition_name=d.{condition} \
             AND q.plugin_id=d.{plugin_id}{subject} \
             WHERE d.{condition} IS NOT NULL AND q.condition_name IS NULL{for_update}",
            table = values.table,
            declaring = values.declaring_table,
            key = values.declaring_key,
            satisfied = self.satisfied_conditions_sql(dialect),
            condition = ExtensionProviderTable::CONDITION,
            plugin_id = ExtensionProviderTable::PLUGIN_ID,
            subject = subject,
            for_update = dialect.for_update(),
        )
    }
}

/// Delete every conditional value of `scope` whose condition is not satisfied
async fn remove_unsatisfied(tx: &mut TransactionContext<'_>, scope: ConditionScope) -> Result<u64> {
    let dialect = tx.dialect();
    let mut removed = 0;

    for values in scope.conditional_values() {
        let query = Query::list(scope.unsatisfied_ids_sql(dialect, &values), |row| {
            row.long("id")
        })
        .bind(true)
        .bind(false);
        let ids = tx.query(query).await?;
        if ids.is_empty() {
            continue;
        }

        let mut delete = BatchExecutable::new(format!("DELETE FROM {} WHERE id=?", values.table));
        for id in &ids {
            delete.add_row(vec![(*id).into()]);
        }
        removed += tx.execute_batch(delete).await?;
        debug!(table = values.table, removed = ids.len(), "removed unsatisfied values");
    }

    Ok(removed)
}

/// Removes player values, groups and table rows whose condition no longer holds
#[derive(Debug, Default)]
pub struct RemoveUnsatisfiedConditionalPlayerResultsTransaction {
    removed: u64,
}

impl RemoveUnsatisfiedConditionalPlayerResultsTransaction {
    /// Rows deleted by the last run
    pub fn removed(&self) -> u64 {
        self.removed
    }
}

#[async_trait]
impl Transaction for RemoveUnsatisfiedConditionalPlayerResultsTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        self.removed = remove_unsatisfied(tx, ConditionScope::Player).await?;
        Ok(())
    }
}

/// Removes server values and table rows whose condition no longer holds
#[derive(Debug, Default)]
pub struct RemoveUnsatisfiedConditionalServerResultsTransaction {
    removed: u64,
}

impl RemoveUnsatisfiedConditionalServerResultsTransaction {
    pub fn removed(&self) -> u64 {
        self.removed
    }
}

#[async_trait]
impl Transaction for RemoveUnsatisfiedConditionalServerResultsTransaction {
    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        self.removed = remove_unsatisfied(tx, ConditionScope::Server).await?;
        Ok(())
    }
}
