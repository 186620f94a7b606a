//! Patches that correct stored rows rather than the schema

use super::columns::add_column;
use super::{Patch, PatchOutcome};
use crate::core::query_builder::{ColumnDef, SqlType};
use crate::core::statement::{Executable, Query};
use crate::core::{Result, TransactionContext};
use crate::schema::create::ensure_default_join_address;
use crate::schema::introspection::has_column;
use crate::schema::tables::{JoinAddressTable, SessionsTable, UserInfoTable, UsersTable};
use async_trait::async_trait;

/// Adds `plan_sessions.join_address_id` and fills it from the hostnames players joined with
///
/// Every step can run again: the column is added only when missing, addresses are inserted only
/// when absent and only sessions still pointing at the unknown address are updated. The patch
/// counts as applied once every stored hostname has its address row.
pub struct SessionJoinAddressPatch;

impl SessionJoinAddressPatch {
    /// Lower-cased address as stored in `plan_join_address`
    fn address_of(hostname: &str) -> String {
        format!("LOWER(SUBSTR({}, 1, {}))", hostname, JoinAddressTable::MAX_LENGTH)
    }

    /// `FROM` and `WHERE` selecting hostnames whose address row is missing
    fn missing_addresses() -> String {
        format!(
            "FROM {info} u WHERE u.{hostname} IS NOT NULL \
             AND {address} NOT IN (SELECT {address_col} FROM {join})",
            info = UserInfoTable::TABLE_NAME,
            hostname = UserInfoTable::HOSTNAME,
            address = Self::address_of(&format!("u.{}", UserInfoTable::HOSTNAME)),
            address_col = JoinAddressTable::JOIN_ADDRESS,
            join = JoinAddressTable::TABLE_NAME,
        )
    }
}

#[async_trait]
impl Patch for SessionJoinAddressPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        if !has_column(tx, SessionsTable::TABLE_NAME, SessionsTable::JOIN_ADDRESS_ID).await? {
            return Ok(false);
        }
        let missing = tx
            .query(Query::count(format!(
                "SELECT COUNT(1) as c {}",
                Self::missing_addresses()
            )))
            .await?;
        Ok(missing == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        if !has_column(tx, SessionsTable::TABLE_NAME, SessionsTable::JOIN_ADDRESS_ID).await? {
            let column = ColumnDef::new(SessionsTable::JOIN_ADDRESS_ID, SqlType::Int)
                .not_null()
                .default_int(1);
            add_column(tx, SessionsTable::TABLE_NAME, &column).await?;
        }
        ensure_default_join_address(tx).await?;

        let address = Self::address_of(&format!("u.{}", UserInfoTable::HOSTNAME));
        tx.execute(Executable::new(format!(
            "INSERT INTO {join} ({address_col}) SELECT DISTINCT {address} {missing}",
            join = JoinAddressTable::TABLE_NAME,
            address_col = JoinAddressTable::JOIN_ADDRESS,
            address = address,
            missing = Self::missing_addresses(),
        )))
        .await?;

        tx.execute(
            Executable::new(format!(
                "UPDATE {sessions} SET {join_id}=COALESCE(\
                 (SELECT j.{id} FROM {join} j JOIN {info} u ON {address}=j.{address_col} \
                 WHERE u.{user_id}={sessions}.{user_id} AND u.{server_id}={sessions}.{server_id} \
                 LIMIT 1), \
                 (SELECT {id} FROM {join} WHERE {address_col}=?)) \
                 WHERE {join_id} NOT IN (SELECT {id} FROM {join} WHERE {address_col}<>?)",
                sessions = SessionsTable::TABLE_NAME,
                join_id = SessionsTable::JOIN_ADDRESS_ID,
                id = JoinAddressTable::ID,
                join = JoinAddressTable::TABLE_NAME,
                info = UserInfoTable::TABLE_NAME,
                address = address,
                address_col = JoinAddressTable::JOIN_ADDRESS,
                user_id = SessionsTable::USER_ID,
                server_id = SessionsTable::SERVER_ID,
            ))
            .bind(JoinAddressTable::DEFAULT_VALUE_FOR_LOOKUP)
            .bind(JoinAddressTable::DEFAULT_VALUE_FOR_LOOKUP),
        )
        .await?;
        Ok(PatchOutcome::Applied)
    }
}

/// Resets AFK times that are negative or longer than their session
pub struct BadAfkThresholdValuePatch;

impl BadAfkThresholdValuePatch {
    fn bad_afk_time() -> String {
        format!(
            "{afk} < 0 OR {afk} > {end} - {start}",
            afk = SessionsTable::AFK_TIME,
            end = SessionsTable::SESSION_END,
            start = SessionsTable::SESSION_START
        )
    }
}

#[async_trait]
impl Patch for BadAfkThresholdValuePatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        let bad = tx
            .query(Query::count(format!(
                "SELECT COUNT(1) as c FROM {} WHERE {}",
                SessionsTable::TABLE_NAME,
                Self::bad_afk_time()
            )))
            .await?;
        Ok(bad == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        tx.execute(Executable::new(format!(
            "UPDATE {} SET {}=0 WHERE {}",
            SessionsTable::TABLE_NAME,
            SessionsTable::AFK_TIME,
            Self::bad_afk_time()
        )))
        .await?;
        Ok(PatchOutcome::Applied)
    }
}

/// Deletes per-server user info of users that no longer exist
pub struct RemoveDanglingUserDataPatch;

impl RemoveDanglingUserDataPatch {
    fn dangling() -> String {
        format!(
            "{} NOT IN (SELECT {} FROM {})",
            UserInfoTable::USER_ID,
            UsersTable::ID,
            UsersTable::TABLE_NAME
        )
    }
}

#[async_trait]
impl Patch for RemoveDanglingUserDataPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        let dangling = tx
            .query(Query::count(format!(
                "SELECT COUNT(1) as c FROM {} WHERE {}",
                UserInfoTable::TABLE_NAME,
                Self::dangling()
            )))
            .await?;
        Ok(dangling == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        tx.execute(Executable::new(format!(
            "DELETE FROM {} WHERE {}",
            UserInfoTable::TABLE_NAME,
            Self::dangling()
        )))
        .await?;
        Ok(PatchOutcome::Applied)
    }
}

/// Moves each user's registration date back to their earliest registration on any server
pub struct RegisterDateMinimizationPatch;

impl RegisterDateMinimizationPatch {
    fn earliest_registration() -> String {
        format!(
            "(SELECT MIN(ui.{registered}) FROM {info} ui WHERE ui.{user_id}={users}.{id})",
            registered = UserInfoTable::REGISTERED,
            info = UserInfoTable::TABLE_NAME,
            user_id = UserInfoTable::USER_ID,
            users = UsersTable::TABLE_NAME,
            id = UsersTable::ID
        )
    }
}

#[async_trait]
impl Patch for RegisterDateMinimizationPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        let later = tx
            .query(Query::count(format!(
                "SELECT COUNT(1) as c FROM {} WHERE {} > {}",
                UsersTable::TABLE_NAME,
                UsersTable::REGISTERED,
                Self::earliest_registration()
            )))
            .await?;
        Ok(later == 0)
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let earliest = Self::earliest_registration();
        tx.execute(Executable::new(format!(
            "UPDATE {users} SET {registered}={earliest} WHERE {registered} > {earliest}",
            users = UsersTable::TABLE_NAME,
            registered = UsersTable::REGISTERED,
            earliest = earliest
        )))
        .await?;
        Ok(PatchOutcome::Applied)
    }
}
