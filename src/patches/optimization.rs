//! Table rebuilds that switch between surrogate ids and natural uuid keys
//!
//! Each rebuild maps the old key columns through correlated subqueries against `plan_users` and
//! `plan_servers`. A uuid column without a foreign key falls back to [`UNKNOWN_UUID`] when the
//! old id no longer resolves, so those rows are carried over. Rows that would break a foreign key
//! of the new table cannot be copied; their count comes back as
//! [`PatchOutcome::AppliedWithWarning`].

use super::rebuild::{apply_rebuild, temp_table_name, TableRebuild};
use super::{Patch, PatchOutcome};
use crate::core::{Dialect, Result, TransactionContext};
use crate::schema::introspection::{has_column, has_table};
use crate::schema::tables::{
    KillsTable, NicknamesTable, PingTable, ServerTable, SessionsTable, UsersTable,
};
use async_trait::async_trait;

/// `(SELECT <wanted> FROM <table> WHERE <table>.<key>=<temp>.<column>)`
fn lookup(table: &str, wanted: &str, key: &str, temp: &str, column: &str) -> String {
    format!(
        "(SELECT {table}.{wanted} FROM {table} WHERE {table}.{key}={temp}.{column})",
        table = table,
        wanted = wanted,
        key = key,
        temp = temp,
        column = column
    )
}

fn user_uuid_of(temp: &str, column: &str) -> String {
    lookup(UsersTable::TABLE_NAME, UsersTable::USER_UUID, UsersTable::ID, temp, column)
}

fn server_uuid_of(temp: &str, column: &str) -> String {
    lookup(ServerTable::TABLE_NAME, ServerTable::SERVER_UUID, ServerTable::ID, temp, column)
}

fn user_id_of(temp: &str, column: &str) -> String {
    lookup(UsersTable::TABLE_NAME, UsersTable::ID, UsersTable::USER_UUID, temp, column)
}

fn server_id_of(temp: &str, column: &str) -> String {
    lookup(ServerTable::TABLE_NAME, ServerTable::ID, ServerTable::SERVER_UUID, temp, column)
}

/// Stands in for a player or server uuid whose legacy id no longer resolves
pub const UNKNOWN_UUID: &str = "00000000-0000-0000-0000-000000000000";

fn or_unknown(expression: String) -> String {
    format!("COALESCE({}, '{}')", expression, UNKNOWN_UUID)
}

fn all_resolve(expressions: &[&String]) -> String {
    expressions
        .iter()
        .map(|e| format!("{} IS NOT NULL", e))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Applied once the new key column exists and no rebuild is half done
async fn rebuilt_with(tx: &mut TransactionContext<'_>, table: &str, column: &str) -> Result<bool> {
    Ok(has_column(tx, table, column).await? && !has_table(tx, &temp_table_name(table)).await?)
}

/// `plan_kills`: killer, victim and server ids become uuids
pub struct KillsOptimizationPatch;

impl KillsOptimizationPatch {
    pub(crate) fn rebuild(dialect: Dialect) -> TableRebuild {
        let temp = temp_table_name(KillsTable::TABLE_NAME);
        let killer = or_unknown(user_uuid_of(&temp, "killer_id"));
        let victim = or_unknown(user_uuid_of(&temp, "victim_id"));
        let server = or_unknown(server_uuid_of(&temp, "server_id"));
        let session_exists = format!(
            "{}.{} IN (SELECT {} FROM {})",
            temp,
            KillsTable::SESSION_ID,
            SessionsTable::ID,
            SessionsTable::TABLE_NAME
        );

        TableRebuild {
            table: KillsTable::TABLE_NAME,
            create_sql: KillsTable::builder(dialect).build(),
            columns: vec![
                KillsTable::ID,
                KillsTable::KILLER_UUID,
                KillsTable::VICTIM_UUID,
                KillsTable::SERVER_UUID,
                KillsTable::WEAPON,
                KillsTable::DATE,
                KillsTable::SESSION_ID,
            ],
            filter: Some(session_exists),
            select: vec![
                format!("{}.{}", temp, KillsTable::ID),
                killer,
                victim,
                server,
                format!("{}.{}", temp, KillsTable::WEAPON),
                format!("{}.{}", temp, KillsTable::DATE),
                format!("{}.{}", temp, KillsTable::SESSION_ID),
            ],
        }
    }
}

#[async_trait]
impl Patch for KillsOptimizationPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        rebuilt_with(tx, KillsTable::TABLE_NAME, KillsTable::KILLER_UUID).await
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let rebuild = Self::rebuild(tx.dialect());
        apply_rebuild(tx, &rebuild, "sessions").await
    }
}

/// `plan_nicknames`: user and server ids become uuids
pub struct NicknamesOptimizationPatch;

impl NicknamesOptimizationPatch {
    pub(crate) fn rebuild(dialect: Dialect) -> TableRebuild {
        let temp = temp_table_name(NicknamesTable::TABLE_NAME);
        let user = or_unknown(user_uuid_of(&temp, "user_id"));
        let server = or_unknown(server_uuid_of(&temp, "server_id"));

        TableRebuild {
            table: NicknamesTable::TABLE_NAME,
            create_sql: NicknamesTable::builder(dialect).build(),
            columns: vec![
                NicknamesTable::ID,
                NicknamesTable::USER_UUID,
                NicknamesTable::NICKNAME,
                NicknamesTable::SERVER_UUID,
                NicknamesTable::LAST_USED,
            ],
            filter: None,
            select: vec![
                format!("{}.{}", temp, NicknamesTable::ID),
                user,
                format!("{}.{}", temp, NicknamesTable::NICKNAME),
                server,
                format!("{}.{}", temp, NicknamesTable::LAST_USED),
            ],
        }
    }
}

#[async_trait]
impl Patch for NicknamesOptimizationPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        rebuilt_with(tx, NicknamesTable::TABLE_NAME, NicknamesTable::USER_UUID).await
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let rebuild = Self::rebuild(tx.dialect());
        apply_rebuild(tx, &rebuild, "players").await
    }
}

/// `plan_ping`: user and server uuids become ids
pub struct PingOptimizationPatch;

impl PingOptimizationPatch {
    pub(crate) fn rebuild(dialect: Dialect) -> TableRebuild {
        let temp = temp_table_name(PingTable::TABLE_NAME);
        let user = user_id_of(&temp, "uuid");
        let server = server_id_of(&temp, "server_uuid");

        TableRebuild {
            table: PingTable::TABLE_NAME,
            create_sql: PingTable::builder(dialect).build(),
            columns: vec![
                PingTable::ID,
                PingTable::USER_ID,
                PingTable::SERVER_ID,
                PingTable::DATE,
                PingTable::MAX_PING,
                PingTable::MIN_PING,
                PingTable::AVG_PING,
            ],
            filter: Some(all_resolve(&[&user, &server])),
            select: vec![
                format!("{}.{}", temp, PingTable::ID),
                user,
                server,
                format!("{}.{}", temp, PingTable::DATE),
                format!("{}.{}", temp, PingTable::MAX_PING),
                format!("{}.{}", temp, PingTable::MIN_PING),
                format!("{}.{}", temp, PingTable::AVG_PING),
            ],
        }
    }
}

#[async_trait]
impl Patch for PingOptimizationPatch {
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool> {
        rebuilt_with(tx, PingTable::TABLE_NAME, PingTable::USER_ID).await
    }

    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
        let rebuild = Self::rebuild(tx.dialect());
        apply_rebuild(tx, &rebuild, "players or servers").await
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::{SqlitePool, SqlitePoolConfig};
    use crate::core::connection::ConnectionPool;
    use crate::core::statement::{Executable, Query};
    use crate::core::value::RowExt;

    const SETUP: &[&str] = &[
        "CREATE TABLE plan_users (id INTEGER PRIMARY KEY, uuid VARCHAR(36) NOT NULL UNIQUE)",
        "CREATE TABLE plan_servers (id INTEGER PRIMARY KEY, uuid VARCHAR(36) NOT NULL UNIQUE)",
        "CREATE TABLE plan_sessions (id INTEGER PRIMARY KEY)",
        "INSERT INTO plan_users (id, uuid) VALUES (1, 'user-1'), (2, 'user-2')",
        "INSERT INTO plan_servers (id, uuid) VALUES (1, 'server-1')",
        "INSERT INTO plan_sessions (id) VALUES (10)",
    ];

    #[test]
    fn test_lookup_expression() {
        assert_eq!(
            user_uuid_of("plan_kills_temp", "killer_id"),
            "(SELECT plan_users.uuid FROM plan_users WHERE plan_users.id=plan_kills_temp.killer_id)"
        );
    }

    #[tokio::test]
    async fn test_kills_ids_become_uuids() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqlitePoolConfig::new(dir.path().join("plan.db")))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        for sql in SETUP {
            tx.execute(Executable::new(*sql)).await.unwrap();
        }
        tx.execute(Executable::new(
            "CREATE TABLE plan_kills (id INTEGER PRIMARY KEY, killer_id INTEGER NOT NULL, \
             victim_id INTEGER NOT NULL, server_id INTEGER NOT NULL, weapon VARCHAR(30) NOT NULL, \
             date BIGINT NOT NULL, session_id INTEGER NOT NULL)",
        ))
        .await
        .unwrap();
        tx.execute(Executable::new(
            "INSERT INTO plan_kills (id, killer_id, victim_id, server_id, weapon, date, session_id) \
             VALUES (5, 1, 2, 1, 'Sword', 1000, 10), (6, 1, 99, 1, 'Bow', 2000, 10), \
             (7, 2, 1, 1, 'Axe', 3000, 99)",
        ))
        .await
        .unwrap();

        let patch = KillsOptimizationPatch;
        assert!(!patch.has_been_applied(&mut tx).await.unwrap());
        let outcome = patch.apply_patch(&mut tx).await.unwrap();
        assert!(patch.has_been_applied(&mut tx).await.unwrap());
        assert_eq!(
            outcome,
            PatchOutcome::AppliedWithWarning(
                "1 rows of plan_kills were not carried over because their sessions no longer exist"
                    .to_string()
            )
        );

        let kills = tx
            .query(Query::list(
                "SELECT id, killer_uuid, victim_uuid, server_uuid FROM plan_kills ORDER BY id",
                |row| {
                    Ok((
                        row.long("id")?,
                        row.string("killer_uuid")?,
                        row.string("victim_uuid")?,
                        row.string("server_uuid")?,
                    ))
                },
            ))
            .await
            .unwrap();
        assert_eq!(
            kills,
            vec![
                (
                    5,
                    "user-1".to_string(),
                    "user-2".to_string(),
                    "server-1".to_string()
                ),
                (
                    6,
                    "user-1".to_string(),
                    UNKNOWN_UUID.to_string(),
                    "server-1".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_ping_rebuild_resumes_after_rename() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqlitePoolConfig::new(dir.path().join("plan.db")))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        for sql in SETUP {
            tx.execute(Executable::new(*sql)).await.unwrap();
        }
        // Left behind by a run that stopped right after renaming.
        tx.execute(Executable::new(
            "CREATE TABLE plan_ping_temp (id INTEGER PRIMARY KEY, uuid VARCHAR(36) NOT NULL, \
             server_uuid VARCHAR(36) NOT NULL, date BIGINT NOT NULL, max_ping INTEGER NOT NULL, \
             min_ping INTEGER NOT NULL, avg_ping DOUBLE NOT NULL)",
        ))
        .await
        .unwrap();
        tx.execute(Executable::new(
            "INSERT INTO plan_ping_temp (uuid, server_uuid, date, max_ping, min_ping, avg_ping) \
             VALUES ('user-1', 'server-1', 1, 80, 20, 45.5), ('user-2', 'server-1', 2, 60, 10, 30.0), \
             ('user-9', 'server-1', 3, 70, 15, 40.0)",
        ))
        .await
        .unwrap();
        tx.execute(Executable::new(PingTable::builder(Dialect::Sqlite).build()))
            .await
            .unwrap();

        let patch = PingOptimizationPatch;
        assert!(!patch.has_been_applied(&mut tx).await.unwrap());
        let outcome = patch.apply_patch(&mut tx).await.unwrap();
        assert!(patch.has_been_applied(&mut tx).await.unwrap());
        assert!(matches!(
            outcome,
            PatchOutcome::AppliedWithWarning(reason) if reason.starts_with("1 rows of plan_ping")
        ));

        let pings = tx
            .query(Query::list(
                "SELECT user_id, server_id, avg_ping FROM plan_ping ORDER BY date",
                |row| Ok((row.long("user_id")?, row.long("server_id")?)),
            ))
            .await
            .unwrap();
        assert_eq!(pings, vec![(1, 1), (2, 1)]);
    }

    #[tokio::test]
    async fn test_nicknames_keep_unresolved_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqlitePoolConfig::new(dir.path().join("plan.db")))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut tx = TransactionContext::new(conn.as_mut());

        for sql in SETUP {
            tx.execute(Executable::new(*sql)).await.unwrap();
        }
        tx.execute(Executable::new(
            "CREATE TABLE plan_nicknames (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, \
             nickname VARCHAR(75) NOT NULL, server_id INTEGER NOT NULL, last_used BIGINT NOT NULL)",
        ))
        .await
        .unwrap();
        tx.execute(Executable::new(
            "INSERT INTO plan_nicknames (user_id, nickname, server_id, last_used) \
             VALUES (2, 'Bee', 1, 300), (7, 'Gone', 1, 400)",
        ))
        .await
        .unwrap();

        let outcome = NicknamesOptimizationPatch
            .apply_patch(&mut tx)
            .await
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);

        let nicknames = tx
            .query(Query::list(
                "SELECT uuid, nickname, last_used FROM plan_nicknames ORDER BY last_used",
                |row| Ok((row.string("uuid")?, row.string("nickname")?, row.long("last_used")?)),
            ))
            .await
            .unwrap();
        assert_eq!(
            nicknames,
            vec![
                ("user-2".to_string(), "Bee".to_string(), 300),
                (UNKNOWN_UUID.to_string(), "Gone".to_string(), 400),
            ]
        );
    }
}
