//! Integration tests for the storage layer
//!
//! These tests run the public API end to end against SQLite files:
//! - Upgrading a database created by an old release
//! - Re-running the patch catalog
//! - Extension values and conditional invalidation through the facade
//! - Concurrent transactions on one pool

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use plan_storage::backends::{SqlitePool, SqlitePoolConfig};
    use plan_storage::core::{ConnectionPool, Executable, Query, RowExt, SqlConnection};
    use plan_storage::extension::{
        NumberValue, ProviderInformation, ProviderKey, StorePlayerBooleanResultTransaction,
        StorePlayerNumberResultTransaction, StorePluginTransaction, StoreProviderTransaction,
    };
    use plan_storage::patches::optimization::UNKNOWN_UUID;
    use plan_storage::patches::PatchOutcome;
    use plan_storage::{Database, DatabaseConfig, DatabaseError, Result, Transaction, TransactionContext};
    use std::path::Path;
    use std::sync::Arc;

    /// Tables as an old release created them, before any of the patches
    const LEGACY_SCHEMA: &[&str] = &[
        "CREATE TABLE plan_version (version integer NOT NULL)",
        "CREATE TABLE plan_servers (id integer PRIMARY KEY, uuid varchar(36) NOT NULL UNIQUE, \
         name varchar(100), web_address varchar(100), is_installed boolean NOT NULL DEFAULT 1, \
         max_players integer NOT NULL DEFAULT -1)",
        "CREATE TABLE plan_users (id integer PRIMARY KEY, uuid varchar(36) NOT NULL UNIQUE, \
         registered bigint NOT NULL, name varchar(16) NOT NULL, \
         times_kicked integer NOT NULL DEFAULT 0)",
        "CREATE TABLE plan_user_info (id integer PRIMARY KEY, user_id integer NOT NULL, \
         server_id integer NOT NULL, registered bigint NOT NULL, \
         opped boolean NOT NULL DEFAULT 0, banned boolean NOT NULL DEFAULT 0)",
        "CREATE TABLE plan_sessions (id integer PRIMARY KEY, user_id integer NOT NULL, \
         server_id integer NOT NULL, session_start bigint NOT NULL, \
         session_end bigint NOT NULL, mob_kills integer NOT NULL, deaths integer NOT NULL)",
        "CREATE TABLE plan_kills (id integer PRIMARY KEY, killer_id integer NOT NULL, \
         victim_id integer NOT NULL, server_id integer NOT NULL, weapon varchar(30) NOT NULL, \
         date bigint NOT NULL, session_id integer NOT NULL)",
        "CREATE TABLE plan_nicknames (id integer PRIMARY KEY, user_id integer NOT NULL, \
         nickname varchar(75) NOT NULL, server_id integer NOT NULL)",
        "CREATE TABLE plan_ping (id integer PRIMARY KEY, uuid varchar(36) NOT NULL, \
         server_uuid varchar(36) NOT NULL, date bigint NOT NULL, max_ping integer NOT NULL, \
         min_ping integer NOT NULL, avg_ping double NOT NULL)",
    ];

    const LEGACY_DATA: &[&str] = &[
        "INSERT INTO plan_servers (id, uuid, name) VALUES (1, 'server-a', 'Survival'), \
         (2, 'proxy-a', 'BungeeCord')",
        "INSERT INTO plan_users (id, uuid, registered, name) VALUES \
         (1, 'uuid-alice', 5000, 'Alice'), (2, 'uuid-bob', 3000, 'Bob')",
        "INSERT INTO plan_user_info (id, user_id, server_id, registered) VALUES \
         (1, 1, 1, 2000), (2, 2, 1, 3000), (3, 99, 1, 100)",
        "INSERT INTO plan_sessions VALUES (1, 1, 1, 1000, 61000, 3, 0), \
         (2, 2, 1, 2000, 3000, 0, 1)",
        "INSERT INTO plan_kills VALUES (1, 1, 2, 1, 'Sword', 1500, 1), \
         (2, 1, 99, 1, 'Bow', 1600, 1), (3, 2, 1, 1, 'Axe', 1700, 99)",
        "INSERT INTO plan_nicknames VALUES (1, 1, 'Ali', 1), (2, 42, 'Ghost', 1)",
        "INSERT INTO plan_ping VALUES (1, 'uuid-alice', 'server-a', 1000, 80, 20, 45.5), \
         (2, 'uuid-nobody', 'server-a', 1000, 90, 30, 50.0)",
    ];

    async fn legacy_database(path: &Path) {
        let pool = SqlitePool::new(SqlitePoolConfig::new(path)).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for sql in LEGACY_SCHEMA.iter().chain(LEGACY_DATA) {
            conn.execute(sql, &[]).await.unwrap();
        }
    }

    async fn open(path: &Path) -> Database {
        Database::open(&DatabaseConfig::sqlite(path)).await.unwrap()
    }

    #[tokio::test]
    async fn test_legacy_database_is_upgraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.db");
        legacy_database(&path).await;

        let db = open(&path).await;
        let report = db.migrate().await.unwrap();

        for patch in [
            "VersionTableRemovalPatch",
            "SessionAfkTimePatch",
            "NicknameLastSeenPatch",
            "ServerIsProxyPatch",
            "UserInfoHostnamePatch",
            "NicknamesOptimizationPatch",
            "SessionJoinAddressPatch",
            "RemoveDanglingUserDataPatch",
            "RegisterDateMinimizationPatch",
        ] {
            assert_eq!(
                report.outcome_of(patch),
                Some(&PatchOutcome::Applied),
                "{patch}"
            );
        }
        assert_eq!(
            report.outcome_of("TransferTableRemovalPatch"),
            Some(&PatchOutcome::Skipped)
        );
        assert_eq!(
            report.warnings(),
            vec![
                (
                    "KillsOptimizationPatch",
                    "1 rows of plan_kills were not carried over because their sessions no longer exist"
                ),
                (
                    "PingOptimizationPatch",
                    "1 rows of plan_ping were not carried over because their players or servers no longer exist"
                ),
            ]
        );

        let tables = db
            .query(Query::list(
                "SELECT name FROM sqlite_master WHERE type='table' AND \
                 (name LIKE '%_temp' OR name IN ('plan_version', 'plan_transfer'))",
                |row| row.string("name"),
            ))
            .await
            .unwrap();
        assert!(tables.is_empty(), "{tables:?}");

        let kills = db
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
                    1,
                    "uuid-alice".to_string(),
                    "uuid-bob".to_string(),
                    "server-a".to_string()
                ),
                (
                    2,
                    "uuid-alice".to_string(),
                    UNKNOWN_UUID.to_string(),
                    "server-a".to_string()
                ),
            ]
        );

        let nicknames = db
            .query(Query::list(
                "SELECT uuid, server_uuid, last_used FROM plan_nicknames ORDER BY id",
                |row| {
                    Ok((
                        row.string("uuid")?,
                        row.string("server_uuid")?,
                        row.long("last_used")?,
                    ))
                },
            ))
            .await
            .unwrap();
        assert_eq!(
            nicknames,
            vec![
                ("uuid-alice".to_string(), "server-a".to_string(), 0),
                (UNKNOWN_UUID.to_string(), "server-a".to_string(), 0),
            ]
        );

        let pings = db
            .query(Query::list("SELECT user_id, server_id FROM plan_ping", |row| {
                Ok((row.long("user_id")?, row.long("server_id")?))
            }))
            .await
            .unwrap();
        assert_eq!(pings, vec![(1, 1)]);

        let proxies = db
            .query(Query::list(
                "SELECT name FROM plan_servers WHERE is_proxy=1",
                |row| row.string("name"),
            ))
            .await
            .unwrap();
        assert_eq!(proxies, vec!["BungeeCord"]);

        let registered = db
            .query(Query::list(
                "SELECT registered FROM plan_users ORDER BY id",
                |row| row.long("registered"),
            ))
            .await
            .unwrap();
        assert_eq!(registered, vec![2000, 3000]);

        let user_info = db
            .query(Query::count("SELECT COUNT(1) as c FROM plan_user_info"))
            .await
            .unwrap();
        assert_eq!(user_info, 2);

        let join_addresses = db
            .query(Query::list(
                "SELECT j.join_address as address FROM plan_sessions s \
                 JOIN plan_join_address j ON j.id=s.join_address_id ORDER BY s.id",
                |row| row.string("address"),
            ))
            .await
            .unwrap();
        assert_eq!(join_addresses, vec!["unknown", "unknown"]);
    }

    #[tokio::test]
    async fn test_catalog_rerun_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.db");
        legacy_database(&path).await;

        let first = open(&path).await.migrate().await.unwrap();
        assert!(!first.applied().is_empty());

        let second = open(&path).await.migrate().await.unwrap();
        assert_eq!(second.len(), first.len());
        assert!(second.applied().is_empty(), "{second}");
        assert!(second
            .entries()
            .iter()
            .all(|(_, outcome)| *outcome == PatchOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_fresh_database_needs_no_patches() {
        let dir = tempfile::tempdir().unwrap();
        let report = open(&dir.path().join("database.db"))
            .await
            .migrate()
            .await
            .unwrap();
        assert!(report.applied().is_empty(), "{report}");
        assert!(report.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_values_through_facade() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir.path().join("database.db")).await;
        db.migrate().await.unwrap();

        let server = "server-a";
        let player = "uuid-alice";
        db.execute_transaction(&mut StorePluginTransaction::new("Jobs", server))
            .await
            .unwrap();
        for (name, condition, provided) in [
            ("isEmployed", None, Some("employed")),
            ("salary", Some("employed"), None),
            ("benefits", Some("not_employed"), None),
        ] {
            let provider = ProviderInformation {
                plugin_name: "Jobs".to_string(),
                name: name.to_string(),
                text: name.to_string(),
                condition: condition.map(str::to_string),
                provided_condition: provided.map(str::to_string),
                ..Default::default()
            };
            db.execute_transaction(&mut StoreProviderTransaction::new(server, provider))
                .await
                .unwrap();
        }

        let key = |provider: &str| ProviderKey::new("Jobs", server, provider);
        for provider in ["salary", "benefits"] {
            db.execute_transaction(&mut StorePlayerNumberResultTransaction::new(
                key(provider),
                player,
                NumberValue::Double(12.5),
            ))
            .await
            .unwrap();
        }

        let stored = || {
            Query::list(
                "SELECT p.name as name FROM plan_extension_user_values v \
                 JOIN plan_extension_providers p ON p.id=v.provider_id \
                 WHERE v.double_value IS NOT NULL ORDER BY p.name",
                |row| row.string("name"),
            )
        };

        db.execute_transaction(&mut StorePlayerBooleanResultTransaction::new(
            key("isEmployed"),
            player,
            true,
        ))
        .await
        .unwrap();
        assert_eq!(db.query(stored()).await.unwrap(), vec!["salary"]);

        db.execute_transaction(&mut StorePlayerBooleanResultTransaction::new(
            key("isEmployed"),
            player,
            false,
        ))
        .await
        .unwrap();
        assert!(db.query(stored()).await.unwrap().is_empty());
    }

    /// Inserts a server, then fails when asked to
    struct InsertServer {
        uuid: String,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Transaction for InsertServer {
        async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
            tx.execute(
                Executable::new("INSERT INTO plan_servers (uuid, name, web_address) VALUES (?, ?, ?)")
                    .bind(&self.uuid)
                    .bind("Server")
                    .bind(""),
            )
            .await?;
            if self.fail {
                return Err(DatabaseError::operation("refusing to finish"));
            }
            Ok(())
        }
    }

    /// Inserts a server, runs a nested `InsertServer`, then fails when asked to
    struct InsertServerWithChild {
        child_fails: bool,
        parent_fails: bool,
    }

    #[async_trait::async_trait]
    impl Transaction for InsertServerWithChild {
        async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
            tx.execute(
                Executable::new("INSERT INTO plan_servers (uuid, name, web_address) VALUES (?, ?, ?)")
                    .bind("server-parent")
                    .bind("Parent")
                    .bind(""),
            )
            .await?;
            tx.execute_other(&mut InsertServer {
                uuid: "server-child".to_string(),
                fail: self.child_fails,
            })
            .await?;
            if self.parent_fails {
                return Err(DatabaseError::operation("refusing to finish"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_nested_transaction_is_rolled_back_with_its_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir.path().join("database.db")).await;
        db.migrate().await.unwrap();
        let servers = || Query::count("SELECT COUNT(1) as c FROM plan_servers");

        for (child_fails, parent_fails) in [(false, true), (true, false)] {
            let err = db
                .execute_transaction(&mut InsertServerWithChild {
                    child_fails,
                    parent_fails,
                })
                .await
                .unwrap_err();
            match err {
                DatabaseError::TransactionFailed { transaction, .. } => {
                    assert_eq!(transaction, "InsertServerWithChild");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(db.query(servers()).await.unwrap(), 0);
        }

        db.execute_transaction(&mut InsertServerWithChild {
            child_fails: false,
            parent_fails: false,
        })
        .await
        .unwrap();
        assert_eq!(db.query(servers()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(open(&dir.path().join("database.db")).await);
        db.migrate().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                let mut tx = InsertServer {
                    uuid: format!("server-{i}"),
                    fail: i % 2 == 1,
                };
                db.execute_transaction(&mut tx).await
            }));
        }

        let mut failures = 0;
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                assert!(matches!(e, DatabaseError::TransactionFailed { .. }));
                failures += 1;
            }
        }
        assert_eq!(failures, 5);

        let servers = db
            .query(Query::count("SELECT COUNT(1) as c FROM plan_servers"))
            .await
            .unwrap();
        assert_eq!(servers, 5);
    }
}
