//! The ordered patch catalog
//!
//! Order matters: later patches assume the columns added by earlier ones. New patches go at the
//! end and existing entries are never removed.

use super::charset::Utf8mb4CharsetPatch;
use super::columns::{
    AddColumnPatch, DropTablePatch, ServerIsProxyPatch, UserInfoHostnameAllowNullPatch,
    WidenVarcharPatch,
};
use super::data::{
    BadAfkThresholdValuePatch, RegisterDateMinimizationPatch, RemoveDanglingUserDataPatch,
    SessionJoinAddressPatch,
};
use super::extension::TableRowPatch;
use super::optimization::{
    KillsOptimizationPatch, NicknamesOptimizationPatch, PingOptimizationPatch,
};
use super::Patch;
use crate::core::query_builder::{ColumnDef, SqlType};
use crate::schema::tables::{
    ExtensionPlayerTableValueTable, ExtensionPlayerValueTable, ExtensionProviderTable,
    ExtensionServerTableValueTable, ExtensionServerValueTable, NicknamesTable, ServerTable,
    SessionsTable, TpsTable, UserInfoTable, UsersTable, EXTENSION_VALUE_LENGTH,
};

fn extension_value(column: &str) -> ColumnDef {
    ColumnDef::new(column, SqlType::Varchar(EXTENSION_VALUE_LENGTH))
}

pub fn patch_catalog() -> Vec<Box<dyn Patch>> {
    let mut table_values = Vec::new();
    for column in ExtensionPlayerTableValueTable::VALUES {
        table_values.push((ExtensionPlayerTableValueTable::TABLE_NAME, extension_value(column)));
    }
    for column in ExtensionServerTableValueTable::VALUES {
        table_values.push((ExtensionServerTableValueTable::TABLE_NAME, extension_value(column)));
    }

    vec![
        Box::new(DropTablePatch::new("VersionTableRemovalPatch", "plan_version")),
        Box::new(DropTablePatch::new("TransferTableRemovalPatch", "plan_transfer")),
        Box::new(AddColumnPatch::new(
            "DiskUsagePatch",
            TpsTable::TABLE_NAME,
            ColumnDef::new(TpsTable::FREE_DISK, SqlType::Long)
                .not_null()
                .default_int(-1),
        )),
        Box::new(AddColumnPatch::new(
            "SessionAfkTimePatch",
            SessionsTable::TABLE_NAME,
            ColumnDef::new(SessionsTable::AFK_TIME, SqlType::Long)
                .not_null()
                .default_int(0),
        )),
        Box::new(AddColumnPatch::new(
            "NicknameLastSeenPatch",
            NicknamesTable::TABLE_NAME,
            ColumnDef::new(NicknamesTable::LAST_USED, SqlType::Long)
                .not_null()
                .default_int(0),
        )),
        Box::new(ServerIsProxyPatch),
        Box::new(AddColumnPatch::new(
            "ServerPlanVersionPatch",
            ServerTable::TABLE_NAME,
            ColumnDef::new(ServerTable::PLAN_VERSION, SqlType::Varchar(18))
                .not_null()
                .default_text("Old"),
        )),
        Box::new(AddColumnPatch::new(
            "UserInfoHostnamePatch",
            UserInfoTable::TABLE_NAME,
            ColumnDef::new(UserInfoTable::HOSTNAME, SqlType::Varchar(255)),
        )),
        Box::new(UserInfoHostnameAllowNullPatch),
        Box::new(WidenVarcharPatch::new(
            "UsersTableNameLengthPatch",
            vec![(
                UsersTable::TABLE_NAME,
                ColumnDef::new(UsersTable::USER_NAME, SqlType::Varchar(36)).not_null(),
            )],
        )),
        Box::new(KillsOptimizationPatch),
        Box::new(NicknamesOptimizationPatch),
        Box::new(PingOptimizationPatch),
        Box::new(SessionJoinAddressPatch),
        Box::new(BadAfkThresholdValuePatch),
        Box::new(RemoveDanglingUserDataPatch),
        Box::new(RegisterDateMinimizationPatch),
        Box::new(AddColumnPatch::new(
            "ExtensionShowInPlayersTablePatch",
            ExtensionProviderTable::TABLE_NAME,
            ColumnDef::new(ExtensionProviderTable::SHOW_IN_PLAYERS_TABLE, SqlType::Boolean)
                .not_null()
                .default_bool(false),
        )),
        Box::new(WidenVarcharPatch::new(
            "ExtensionStringValueLengthPatch",
            vec![
                (
                    ExtensionPlayerValueTable::TABLE_NAME,
                    extension_value(ExtensionPlayerValueTable::STRING_VALUE),
                ),
                (
                    ExtensionServerValueTable::TABLE_NAME,
                    extension_value(ExtensionServerValueTable::STRING_VALUE),
                ),
            ],
        )),
        Box::new(WidenVarcharPatch::new(
            "ExtensionTableRowValueLengthPatch",
            table_values,
        )),
        Box::new(TableRowPatch::player()),
        Box::new(TableRowPatch::server()),
        Box::new(Utf8mb4CharsetPatch),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_order_and_names() {
        let names: Vec<String> = patch_catalog().iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), 23);
        assert_eq!(names.first().map(String::as_str), Some("VersionTableRemovalPatch"));
        assert_eq!(names.last().map(String::as_str), Some("Utf8mb4CharsetPatch"));

        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        let position = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert!(position("NicknameLastSeenPatch") < position("NicknamesOptimizationPatch"));
        assert!(position("UserInfoHostnamePatch") < position("UserInfoHostnameAllowNullPatch"));
        assert!(position("UserInfoHostnamePatch") < position("SessionJoinAddressPatch"));
    }
}
