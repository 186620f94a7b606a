//! SQL dialect descriptor
//!
//! The two supported engines disagree on enough syntax that every statement which is not plain
//! ANSI SQL asks the active [`Dialect`] for its fragment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Dialect {
    /// Embedded single-file engine
    Sqlite = 1,
    /// Client/server engine
    Mysql = 2,
}

impl Dialect {
    /// Convert dialect to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
        }
    }

    /// Whether the engine enforces `VARCHAR(n)` bounds
    ///
    /// SQLite stores any length in a `VARCHAR(n)` column, so width-widening patches never need
    /// to run there.
    pub fn enforces_varchar_length(&self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Whether columns can be retyped in place with `ALTER TABLE ... MODIFY`
    pub fn supports_modify_column(&self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Integer primary key with automatic numbering
    pub fn primary_key(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT",
            Dialect::Mysql => "INTEGER NOT NULL PRIMARY KEY AUTO_INCREMENT",
        }
    }

    pub fn boolean_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "BOOLEAN",
            Dialect::Mysql => "TINYINT(1)",
        }
    }

    pub fn int_type(&self) -> &'static str {
        "INTEGER"
    }

    pub fn long_type(&self) -> &'static str {
        "BIGINT"
    }

    pub fn double_type(&self) -> &'static str {
        "DOUBLE"
    }

    pub fn varchar_type(&self, length: u32) -> String {
        format!("VARCHAR({})", length)
    }

    /// Literal used for boolean defaults
    pub fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    /// Statement that renames a table
    pub fn rename_table_sql(&self, from: &str, to: &str) -> String {
        match self {
            Dialect::Sqlite => format!("ALTER TABLE {} RENAME TO {}", from, to),
            Dialect::Mysql => format!("RENAME TABLE {} TO {}", from, to),
        }
    }

    /// Statement that adds a column with its full definition
    pub fn add_column_sql(&self, table: &str, column_definition: &str) -> String {
        match self {
            Dialect::Sqlite => format!("ALTER TABLE {} ADD COLUMN {}", table, column_definition),
            Dialect::Mysql => format!("ALTER TABLE {} ADD {}", table, column_definition),
        }
    }

    /// Statement that replaces a column definition in place, where the engine allows it
    pub fn modify_column_sql(&self, table: &str, column_definition: &str) -> Option<String> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Mysql => Some(format!("ALTER TABLE {} MODIFY {}", table, column_definition)),
        }
    }

    pub fn drop_table_if_exists_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", table)
    }

    /// String concatenation of SQL expressions
    pub fn concat(&self, parts: &[&str]) -> String {
        match self {
            Dialect::Sqlite => parts.join(" || "),
            Dialect::Mysql => format!("CONCAT({})", parts.join(", ")),
        }
    }

    /// Statement that opens a transaction on a connection
    ///
    /// SQLite takes the write lock immediately so two writers cannot both read and then fail to
    /// upgrade their locks.
    pub fn begin_transaction_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "BEGIN IMMEDIATE",
            Dialect::Mysql => "START TRANSACTION",
        }
    }

    /// Suffix that turns a SELECT into a row-locking read
    pub fn for_update(&self) -> &'static str {
        match self {
            // The write lock taken by BEGIN IMMEDIATE already excludes other writers.
            Dialect::Sqlite => "",
            Dialect::Mysql => " FOR UPDATE",
        }
    }

    /// Statement that turns foreign-key enforcement off for the session, if it can be toggled
    /// while patches run
    pub fn disable_foreign_keys_sql(&self) -> Option<&'static str> {
        match self {
            // PRAGMA foreign_keys is a no-op inside a transaction.
            Dialect::Sqlite => None,
            Dialect::Mysql => Some("SET FOREIGN_KEY_CHECKS=0"),
        }
    }

    pub fn enable_foreign_keys_sql(&self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Mysql => Some("SET FOREIGN_KEY_CHECKS=1"),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            _ => Err(format!("Invalid dialect: '{}'", s)),
        }
    }
}
