//! Table definitions of the latest schema
//!
//! Each table is a unit struct carrying its on-disk name, column names and the statement that
//! creates it. Older shapes of the same tables only exist in the patches that convert them.

use crate::core::query_builder::{CreateTableBuilder, SqlType};
use crate::core::Dialect;

pub struct ServerTable;

impl ServerTable {
    pub const TABLE_NAME: &'static str = "plan_servers";

    pub const ID: &'static str = "id";
    pub const SERVER_UUID: &'static str = "uuid";
    pub const NAME: &'static str = "name";
    pub const WEB_ADDRESS: &'static str = "web_address";
    pub const INSTALLED: &'static str = "is_installed";
    pub const PROXY: &'static str = "is_proxy";
    pub const MAX_PLAYERS: &'static str = "max_players";
    pub const PLAN_VERSION: &'static str = "plan_version";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::SERVER_UUID, SqlType::Varchar(36))
            .not_null()
            .unique()
            .column(Self::NAME, SqlType::Varchar(100))
            .column(Self::WEB_ADDRESS, SqlType::Varchar(100))
            .column(Self::INSTALLED, SqlType::Boolean)
            .not_null()
            .default_bool(true)
            .column(Self::PROXY, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::MAX_PLAYERS, SqlType::Int)
            .not_null()
            .default_int(-1)
            .column(Self::PLAN_VERSION, SqlType::Varchar(18))
            .not_null()
            .default_text("Old")
            .build()
    }
}

pub struct UsersTable;

impl UsersTable {
    pub const TABLE_NAME: &'static str = "plan_users";

    pub const ID: &'static str = "id";
    pub const USER_UUID: &'static str = "uuid";
    pub const REGISTERED: &'static str = "registered";
    pub const USER_NAME: &'static str = "name";
    pub const TIMES_KICKED: &'static str = "times_kicked";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::USER_UUID, SqlType::Varchar(36))
            .not_null()
            .unique()
            .column(Self::REGISTERED, SqlType::Long)
            .not_null()
            .column(Self::USER_NAME, SqlType::Varchar(36))
            .not_null()
            .column(Self::TIMES_KICKED, SqlType::Int)
            .not_null()
            .default_int(0)
            .build()
    }
}

pub struct UserInfoTable;

impl UserInfoTable {
    pub const TABLE_NAME: &'static str = "plan_user_info";

    pub const ID: &'static str = "id";
    pub const USER_ID: &'static str = "user_id";
    pub const SERVER_ID: &'static str = "server_id";
    pub const REGISTERED: &'static str = "registered";
    pub const OP: &'static str = "opped";
    pub const BANNED: &'static str = "banned";
    pub const HOSTNAME: &'static str = "hostname";

    pub fn create_table_sql(dialect: Dialect) -> String {
        Self::builder(dialect).if_not_exists().build()
    }

    pub(crate) fn builder(dialect: Dialect) -> CreateTableBuilder {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .primary_key(Self::ID)
            .column(Self::USER_ID, SqlType::Int)
            .not_null()
            .column(Self::SERVER_ID, SqlType::Int)
            .not_null()
            .column(Self::REGISTERED, SqlType::Long)
            .not_null()
            .column(Self::OP, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::BANNED, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::HOSTNAME, SqlType::Varchar(255))
            .foreign_key(Self::USER_ID, UsersTable::TABLE_NAME, UsersTable::ID)
            .foreign_key(Self::SERVER_ID, ServerTable::TABLE_NAME, ServerTable::ID)
    }
}

pub struct JoinAddressTable;

impl JoinAddressTable {
    pub const TABLE_NAME: &'static str = "plan_join_address";

    pub const ID: &'static str = "id";
    pub const JOIN_ADDRESS: &'static str = "join_address";

    /// Address recorded when a session has no known join address
    pub const DEFAULT_VALUE_FOR_LOOKUP: &'static str = "unknown";
    /// Width of the address column; 191 characters keeps the unique index within MySQL's limit
    pub const MAX_LENGTH: u32 = 191;

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::JOIN_ADDRESS, SqlType::Varchar(Self::MAX_LENGTH))
            .not_null()
            .unique()
            .build()
    }
}

pub struct SessionsTable;

impl SessionsTable {
    pub const TABLE_NAME: &'static str = "plan_sessions";

    pub const ID: &'static str = "id";
    pub const USER_ID: &'static str = "user_id";
    pub const SERVER_ID: &'static str = "server_id";
    pub const SESSION_START: &'static str = "session_start";
    pub const SESSION_END: &'static str = "session_end";
    pub const MOB_KILLS: &'static str = "mob_kills";
    pub const DEATHS: &'static str = "deaths";
    pub const AFK_TIME: &'static str = "afk_time";
    pub const JOIN_ADDRESS_ID: &'static str = "join_address_id";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::USER_ID, SqlType::Int)
            .not_null()
            .column(Self::SERVER_ID, SqlType::Int)
            .not_null()
            .column(Self::SESSION_START, SqlType::Long)
            .not_null()
            .column(Self::SESSION_END, SqlType::Long)
            .not_null()
            .column(Self::MOB_KILLS, SqlType::Int)
            .not_null()
            .column(Self::DEATHS, SqlType::Int)
            .not_null()
            .column(Self::AFK_TIME, SqlType::Long)
            .not_null()
            .default_int(0)
            .column(Self::JOIN_ADDRESS_ID, SqlType::Int)
            .not_null()
            .default_int(1)
            .foreign_key(Self::USER_ID, UsersTable::TABLE_NAME, UsersTable::ID)
            .foreign_key(Self::SERVER_ID, ServerTable::TABLE_NAME, ServerTable::ID)
            .foreign_key(
                Self::JOIN_ADDRESS_ID,
                JoinAddressTable::TABLE_NAME,
                JoinAddressTable::ID,
            )
            .build()
    }
}

pub struct KillsTable;

impl KillsTable {
    pub const TABLE_NAME: &'static str = "plan_kills";

    pub const ID: &'static str = "id";
    pub const KILLER_UUID: &'static str = "killer_uuid";
    pub const VICTIM_UUID: &'static str = "victim_uuid";
    pub const SERVER_UUID: &'static str = "server_uuid";
    pub const WEAPON: &'static str = "weapon";
    pub const DATE: &'static str = "date";
    pub const SESSION_ID: &'static str = "session_id";

    pub fn create_table_sql(dialect: Dialect) -> String {
        Self::builder(dialect).if_not_exists().build()
    }

    pub(crate) fn builder(dialect: Dialect) -> CreateTableBuilder {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .primary_key(Self::ID)
            .column(Self::KILLER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::VICTIM_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::SERVER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::WEAPON, SqlType::Varchar(30))
            .not_null()
            .column(Self::DATE, SqlType::Long)
            .not_null()
            .column(Self::SESSION_ID, SqlType::Int)
            .not_null()
            .foreign_key(Self::SESSION_ID, SessionsTable::TABLE_NAME, SessionsTable::ID)
    }
}

pub struct PingTable;

impl PingTable {
    pub const TABLE_NAME: &'static str = "plan_ping";

    pub const ID: &'static str = "id";
    pub const USER_ID: &'static str = "user_id";
    pub const SERVER_ID: &'static str = "server_id";
    pub const DATE: &'static str = "date";
    pub const MAX_PING: &'static str = "max_ping";
    pub const MIN_PING: &'static str = "min_ping";
    pub const AVG_PING: &'static str = "avg_ping";

    pub fn create_table_sql(dialect: Dialect) -> String {
        Self::builder(dialect).if_not_exists().build()
    }

    pub(crate) fn builder(dialect: Dialect) -> CreateTableBuilder {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .primary_key(Self::ID)
            .column(Self::USER_ID, SqlType::Int)
            .not_null()
            .column(Self::SERVER_ID, SqlType::Int)
            .not_null()
            .column(Self::DATE, SqlType::Long)
            .not_null()
            .column(Self::MAX_PING, SqlType::Int)
            .not_null()
            .column(Self::MIN_PING, SqlType::Int)
            .not_null()
            .column(Self::AVG_PING, SqlType::Double)
            .not_null()
            .foreign_key(Self::USER_ID, UsersTable::TABLE_NAME, UsersTable::ID)
            .foreign_key(Self::SERVER_ID, ServerTable::TABLE_NAME, ServerTable::ID)
    }
}

pub struct NicknamesTable;

impl NicknamesTable {
    pub const TABLE_NAME: &'static str = "plan_nicknames";

    pub const ID: &'static str = "id";
    pub const USER_UUID: &'static str = "uuid";
    pub const NICKNAME: &'static str = "nickname";
    pub const SERVER_UUID: &'static str = "server_uuid";
    pub const LAST_USED: &'static str = "last_used";

    pub fn create_table_sql(dialect: Dialect) -> String {
        Self::builder(dialect).if_not_exists().build()
    }

    pub(crate) fn builder(dialect: Dialect) -> CreateTableBuilder {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .primary_key(Self::ID)
            .column(Self::USER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::NICKNAME, SqlType::Varchar(75))
            .not_null()
            .column(Self::SERVER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::LAST_USED, SqlType::Long)
            .not_null()
            .default_int(0)
    }
}

pub struct TpsTable;

impl TpsTable {
    pub const TABLE_NAME: &'static str = "plan_tps";

    pub const ID: &'static str = "id";
    pub const SERVER_ID: &'static str = "server_id";
    pub const DATE: &'static str = "date";
    pub const TPS: &'static str = "tps";
    pub const PLAYERS_ONLINE: &'static str = "players_online";
    pub const CPU_USAGE: &'static str = "cpu_usage";
    pub const RAM_USAGE: &'static str = "ram_usage";
    pub const ENTITIES: &'static str = "entities";
    pub const CHUNKS: &'static str = "chunks_loaded";
    pub const FREE_DISK: &'static str = "free_disk_space";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::SERVER_ID, SqlType::Int)
            .not_null()
            .column(Self::DATE, SqlType::Long)
            .not_null()
            .column(Self::TPS, SqlType::Double)
            .not_null()
            .column(Self::PLAYERS_ONLINE, SqlType::Int)
            .not_null()
            .column(Self::CPU_USAGE, SqlType::Double)
            .not_null()
            .column(Self::RAM_USAGE, SqlType::Long)
            .not_null()
            .column(Self::ENTITIES, SqlType::Int)
            .not_null()
            .column(Self::CHUNKS, SqlType::Int)
            .not_null()
            .column(Self::FREE_DISK, SqlType::Long)
            .not_null()
            .default_int(-1)
            .foreign_key(Self::SERVER_ID, ServerTable::TABLE_NAME, ServerTable::ID)
            .build()
    }
}

pub struct ExtensionPluginTable;

impl ExtensionPluginTable {
    pub const TABLE_NAME: &'static str = "plan_extension_plugins";

    pub const ID: &'static str = "id";
    pub const PLUGIN_NAME: &'static str = "name";
    pub const LAST_UPDATED: &'static str = "last_updated";
    pub const SERVER_UUID: &'static str = "server_uuid";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::PLUGIN_NAME, SqlType::Varchar(50))
            .not_null()
            .column(Self::LAST_UPDATED, SqlType::Long)
            .not_null()
            .column(Self::SERVER_UUID, SqlType::Varchar(36))
            .not_null()
            .unique_constraint(&[Self::PLUGIN_NAME, Self::SERVER_UUID])
            .build()
    }

    /// Subquery selecting a plugin id by name and server uuid; binds 2 parameters
    pub fn statement_select_plugin_id() -> String {
        format!(
            "(SELECT {} FROM {} WHERE {}=? AND {}=?)",
            Self::ID,
            Self::TABLE_NAME,
            Self::PLUGIN_NAME,
            Self::SERVER_UUID
        )
    }
}

pub struct ExtensionProviderTable;

impl ExtensionProviderTable {
    pub const TABLE_NAME: &'static str = "plan_extension_providers";

    pub const ID: &'static str = "id";
    pub const PROVIDER_NAME: &'static str = "name";
    pub const TEXT: &'static str = "text";
    pub const DESCRIPTION: &'static str = "description";
    pub const PRIORITY: &'static str = "priority";
    pub const GROUPABLE: &'static str = "groupable";
    pub const CONDITION: &'static str = "condition_name";
    pub const PROVIDED_CONDITION: &'static str = "provided_condition";
    pub const FORMAT_TYPE: &'static str = "format_type";
    pub const IS_PLAYER_NAME: &'static str = "player_name";
    pub const HIDDEN: &'static str = "hidden";
    pub const SHOW_IN_PLAYERS_TABLE: &'static str = "show_in_players_table";
    pub const PLUGIN_ID: &'static str = "plugin_id";

    /// Condition names may carry the `not_` prefix, hence the extra width
    pub const CONDITION_LENGTH: u32 = 54;

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::PROVIDER_NAME, SqlType::Varchar(50))
            .not_null()
            .column(Self::TEXT, SqlType::Varchar(50))
            .not_null()
            .column(Self::DESCRIPTION, SqlType::Varchar(150))
            .column(Self::PRIORITY, SqlType::Int)
            .not_null()
            .default_int(0)
            .column(Self::GROUPABLE, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::CONDITION, SqlType::Varchar(Self::CONDITION_LENGTH))
            .column(Self::PROVIDED_CONDITION, SqlType::Varchar(50))
            .column(Self::FORMAT_TYPE, SqlType::Varchar(25))
            .column(Self::HIDDEN, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::IS_PLAYER_NAME, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::SHOW_IN_PLAYERS_TABLE, SqlType::Boolean)
            .not_null()
            .default_bool(false)
            .column(Self::PLUGIN_ID, SqlType::Int)
            .not_null()
            .foreign_key(
                Self::PLUGIN_ID,
                ExtensionPluginTable::TABLE_NAME,
                ExtensionPluginTable::ID,
            )
            .build()
    }
}

pub struct ExtensionPlayerValueTable;

impl ExtensionPlayerValueTable {
    pub const TABLE_NAME: &'static str = "plan_extension_user_values";

    pub const ID: &'static str = "id";
    pub const BOOLEAN_VALUE: &'static str = "boolean_value";
    pub const DOUBLE_VALUE: &'static str = "double_value";
    pub const PERCENTAGE_VALUE: &'static str = "percentage_value";
    pub const LONG_VALUE: &'static str = "long_value";
    pub const STRING_VALUE: &'static str = "string_value";
    pub const USER_UUID: &'static str = "uuid";
    pub const PROVIDER_ID: &'static str = "provider_id";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::BOOLEAN_VALUE, SqlType::Boolean)
            .column(Self::DOUBLE_VALUE, SqlType::Double)
            .column(Self::PERCENTAGE_VALUE, SqlType::Double)
            .column(Self::LONG_VALUE, SqlType::Long)
            .column(Self::STRING_VALUE, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::USER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::PROVIDER_ID, SqlType::Int)
            .not_null()
            .foreign_key(
                Self::PROVIDER_ID,
                ExtensionProviderTable::TABLE_NAME,
                ExtensionProviderTable::ID,
            )
            .build()
    }
}

pub struct ExtensionServerValueTable;

impl ExtensionServerValueTable {
    pub const TABLE_NAME: &'static str = "plan_extension_server_values";

    pub const ID: &'static str = "id";
    pub const BOOLEAN_VALUE: &'static str = "boolean_value";
    pub const DOUBLE_VALUE: &'static str = "double_value";
    pub const PERCENTAGE_VALUE: &'static str = "percentage_value";
    pub const LONG_VALUE: &'static str = "long_value";
    pub const STRING_VALUE: &'static str = "string_value";
    pub const PROVIDER_ID: &'static str = "provider_id";

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::BOOLEAN_VALUE, SqlType::Boolean)
            .column(Self::DOUBLE_VALUE, SqlType::Double)
            .column(Self::PERCENTAGE_VALUE, SqlType::Double)
            .column(Self::LONG_VALUE, SqlType::Long)
            .column(Self::STRING_VALUE, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::PROVIDER_ID, SqlType::Int)
            .not_null()
            .foreign_key(
                Self::PROVIDER_ID,
                ExtensionProviderTable::TABLE_NAME,
                ExtensionProviderTable::ID,
            )
            .build()
    }
}

pub struct ExtensionGroupsTable;

impl ExtensionGroupsTable {
    pub const TABLE_NAME: &'static str = "plan_extension_groups";

    pub const ID: &'static str = "id";
    pub const PROVIDER_ID: &'static str = "provider_id";
    pub const USER_UUID: &'static str = "uuid";
    pub const GROUP_NAME: &'static str = "group_name";

    pub const GROUP_NAME_LENGTH: usize = 50;

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::PROVIDER_ID, SqlType::Int)
            .not_null()
            .column(Self::USER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::GROUP_NAME, SqlType::Varchar(50))
            .not_null()
            .foreign_key(
                Self::PROVIDER_ID,
                ExtensionProviderTable::TABLE_NAME,
                ExtensionProviderTable::ID,
            )
            .build()
    }
}

pub struct ExtensionTableProviderTable;

impl ExtensionTableProviderTable {
    pub const TABLE_NAME: &'static str = "plan_extension_tables";

    pub const ID: &'static str = "id";
    pub const TABLE_NAME_COLUMN: &'static str = "name";
    pub const COL_1: &'static str = "col_1_name";
    pub const COL_2: &'static str = "col_2_name";
    pub const COL_3: &'static str = "col_3_name";
    pub const COL_4: &'static str = "col_4_name";
    pub const CONDITION: &'static str = "condition_name";
    pub const PLUGIN_ID: &'static str = "plugin_id";

    pub const COLUMNS: [&'static str; 4] = [Self::COL_1, Self::COL_2, Self::COL_3, Self::COL_4];

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::TABLE_NAME_COLUMN, SqlType::Varchar(50))
            .not_null()
            .column(Self::COL_1, SqlType::Varchar(50))
            .column(Self::COL_2, SqlType::Varchar(50))
            .column(Self::COL_3, SqlType::Varchar(50))
            .column(Self::COL_4, SqlType::Varchar(50))
            .column(
                Self::CONDITION,
                SqlType::Varchar(ExtensionProviderTable::CONDITION_LENGTH),
            )
            .column(Self::PLUGIN_ID, SqlType::Int)
            .not_null()
            .foreign_key(
                Self::PLUGIN_ID,
                ExtensionPluginTable::TABLE_NAME,
                ExtensionPluginTable::ID,
            )
            .build()
    }
}

pub struct ExtensionPlayerTableValueTable;

impl ExtensionPlayerTableValueTable {
    pub const TABLE_NAME: &'static str = "plan_extension_user_table_values";

    pub const ID: &'static str = "id";
    pub const TABLE_ID: &'static str = "table_id";
    pub const USER_UUID: &'static str = "uuid";
    pub const VALUE_1: &'static str = "col_1_value";
    pub const VALUE_2: &'static str = "col_2_value";
    pub const VALUE_3: &'static str = "col_3_value";
    pub const VALUE_4: &'static str = "col_4_value";
    pub const TABLE_ROW: &'static str = "table_row";

    pub const VALUES: [&'static str; 4] = [Self::VALUE_1, Self::VALUE_2, Self::VALUE_3, Self::VALUE_4];

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::TABLE_ID, SqlType::Int)
            .not_null()
            .column(Self::USER_UUID, SqlType::Varchar(36))
            .not_null()
            .column(Self::VALUE_1, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_2, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_3, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_4, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::TABLE_ROW, SqlType::Int)
            .not_null()
            .default_int(0)
            .foreign_key(
                Self::TABLE_ID,
                ExtensionTableProviderTable::TABLE_NAME,
                ExtensionTableProviderTable::ID,
            )
            .build()
    }
}

pub struct ExtensionServerTableValueTable;

impl ExtensionServerTableValueTable {
    pub const TABLE_NAME: &'static str = "plan_extension_server_table_values";

    pub const ID: &'static str = "id";
    pub const TABLE_ID: &'static str = "table_id";
    pub const VALUE_1: &'static str = "col_1_value";
    pub const VALUE_2: &'static str = "col_2_value";
    pub const VALUE_3: &'static str = "col_3_value";
    pub const VALUE_4: &'static str = "col_4_value";
    pub const TABLE_ROW: &'static str = "table_row";

    pub const VALUES: [&'static str; 4] = [Self::VALUE_1, Self::VALUE_2, Self::VALUE_3, Self::VALUE_4];

    pub fn create_table_sql(dialect: Dialect) -> String {
        CreateTableBuilder::new(Self::TABLE_NAME, dialect)
            .if_not_exists()
            .primary_key(Self::ID)
            .column(Self::TABLE_ID, SqlType::Int)
            .not_null()
            .column(Self::VALUE_1, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_2, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_3, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::VALUE_4, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
            .column(Self::TABLE_ROW, SqlType::Int)
            .not_null()
            .default_int(0)
            .foreign_key(
                Self::TABLE_ID,
                ExtensionTableProviderTable::TABLE_NAME,
                ExtensionTableProviderTable::ID,
            )
            .build()
    }
}

/// Width of stored extension string values
pub const EXTENSION_VALUE_LENGTH: u32 = 250;

/// Every table of the latest schema in creation order; referenced tables come first
pub fn create_table_statements(dialect: Dialect) -> Vec<(&'static str, String)> {
    vec![
        (ServerTable::TABLE_NAME, ServerTable::create_table_sql(dialect)),
        (UsersTable::TABLE_NAME, UsersTable::create_table_sql(dialect)),
        (UserInfoTable::TABLE_NAME, UserInfoTable::create_table_sql(dialect)),
        (JoinAddressTable::TABLE_NAME, JoinAddressTable::create_table_sql(dialect)),
        (SessionsTable::TABLE_NAME, SessionsTable::create_table_sql(dialect)),
        (KillsTable::TABLE_NAME, KillsTable::create_table_sql(dialect)),
        (PingTable::TABLE_NAME, PingTable::create_table_sql(dialect)),
        (NicknamesTable::TABLE_NAME, NicknamesTable::create_table_sql(dialect)),
        (TpsTable::TABLE_NAME, TpsTable::create_table_sql(dialect)),
        (
            ExtensionPluginTable::TABLE_NAME,
            ExtensionPluginTable::create_table_sql(dialect),
        ),
        (
            ExtensionProviderTable::TABLE_NAME,
            ExtensionProviderTable::create_table_sql(dialect),
        ),
        (
            ExtensionPlayerValueTable::TABLE_NAME,
            ExtensionPlayerValueTable::create_table_sql(dialect),
        ),
        (
            ExtensionServerValueTable::TABLE_NAME,
            ExtensionServerValueTable::create_table_sql(dialect),
        ),
        (
            ExtensionGroupsTable::TABLE_NAME,
            ExtensionGroupsTable::create_table_sql(dialect),
        ),
        (
            ExtensionTableProviderTable::TABLE_NAME,
            ExtensionTableProviderTable::create_table_sql(dialect),
        ),
        (
            ExtensionPlayerTableValueTable::TABLE_NAME,
            ExtensionPlayerTableValueTable::create_table_sql(dialect),
        ),
        (
            ExtensionServerTableValueTable::TABLE_NAME,
            ExtensionServerTableValueTable::create_table_sql(dialect),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_statements_are_idempotent_creates() {
        for dialect in [Dialect::Sqlite, Dialect::Mysql] {
            let statements = create_table_statements(dialect);
            assert_eq!(statements.len(), 17);
            for (table, sql) in statements {
                assert!(
                    sql.starts_with(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                    "{}",
                    sql
                );
            }
        }
    }

    #[test]
    fn test_referenced_tables_are_created_first() {
        let statements = create_table_statements(Dialect::Mysql);
        let position = |name: &str| statements.iter().position(|(t, _)| *t == name).unwrap();
        for (index, (_, sql)) in statements.iter().enumerate() {
            for (other, _) in &statements {
                if sql.contains(&format!("REFERENCES {}(", other)) {
                    assert!(position(other) < index, "{} must precede {}", other, sql);
                }
            }
        }
    }

    #[test]
    fn test_plugin_id_subquery() {
        assert_eq!(
            ExtensionPluginTable::statement_select_plugin_id(),
            "(SELECT id FROM plan_extension_plugins WHERE name=? AND server_uuid=?)"
        );
    }
}
