//! Dialect-aware SQL builders
//!
//! Table and column definitions are built from typed parts so the same definition renders
//! correctly for every [`Dialect`]. Values never appear in generated SQL except as
//! column defaults; everything else is bound as a parameter.

use super::dialect::Dialect;

/// Column data types used by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Auto-numbered integer primary key
    Id,
    Int,
    Long,
    Double,
    Boolean,
    Varchar(u32),
}

impl SqlType {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            SqlType::Id => dialect.primary_key().to_string(),
            SqlType::Int => dialect.int_type().to_string(),
            SqlType::Long => dialect.long_type().to_string(),
            SqlType::Double => dialect.double_type().to_string(),
            SqlType::Boolean => dialect.boolean_type().to_string(),
            SqlType::Varchar(length) => dialect.varchar_type(*length),
        }
    }
}

/// Literal used as a column default
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl DefaultValue {
    fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            DefaultValue::Bool(v) => dialect.boolean_literal(*v).to_string(),
            DefaultValue::Int(v) => v.to_string(),
            DefaultValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }
}

/// A single column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    name: String,
    sql_type: SqlType,
    not_null: bool,
    unique: bool,
    default: Option<DefaultValue>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn default_bool(self, value: bool) -> Self {
        self.default_value(DefaultValue::Bool(value))
    }

    pub fn default_int(self, value: i64) -> Self {
        self.default_value(DefaultValue::Int(value))
    }

    pub fn default_text(self, value: &str) -> Self {
        self.default_value(DefaultValue::Text(value.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Full definition, e.g. `afk_time BIGINT DEFAULT 0 NOT NULL`
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.to_sql(dialect));
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql(dialect));
        }
        if self.not_null && self.sql_type != SqlType::Id {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    referenced_table: String,
    referenced_column: String,
}

/// CREATE TABLE builder
///
/// # Example
///
/// ```
/// use plan_storage::core::query_builder::{CreateTableBuilder, SqlType};
/// use plan_storage::core::Dialect;
///
/// let sql = CreateTableBuilder::new("plan_join_address", Dialect::Sqlite)
///     .primary_key("id")
///     .column("join_address", SqlType::Varchar(191))
///     .not_null()
///     .unique()
///     .build();
/// assert_eq!(
///     sql,
///     "CREATE TABLE plan_join_address (\
///      id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
///      join_address VARCHAR(191) NOT NULL UNIQUE)"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    table: String,
    dialect: Dialect,
    if_not_exists: bool,
    columns: Vec<ColumnDef>,
    foreign_keys: Vec<ForeignKey>,
    unique_constraints: Vec<Vec<String>>,
}

impl CreateTableBuilder {
    pub fn new(table: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            table: table.into(),
            dialect,
            if_not_exists: false,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    /// Render as `CREATE TABLE IF NOT EXISTS`
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Add the auto-numbered primary key column
    pub fn primary_key(self, column: &str) -> Self {
        self.column(column, SqlType::Id)
    }

    /// Add a column; the modifiers below apply to the most recently added column
    pub fn column(mut self, column: &str, sql_type: SqlType) -> Self {
        self.columns.push(ColumnDef::new(column, sql_type));
        self
    }

    pub fn column_def(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn not_null(self) -> Self {
        self.modify_last(ColumnDef::not_null)
    }

    pub fn unique(self) -> Self {
        self.modify_last(ColumnDef::unique)
    }

    pub fn default_bool(self, value: bool) -> Self {
        self.modify_last(|c| c.default_bool(value))
    }

    pub fn default_int(self, value: i64) -> Self {
        self.modify_last(|c| c.default_int(value))
    }

    pub fn default_text(self, value: &str) -> Self {
        self.modify_last(|c| c.default_text(value))
    }

    /// Add `FOREIGN KEY(column) REFERENCES table(referenced_column)`
    ///
    /// Constraints are left unnamed so each engine generates names that cannot clash with those
    /// of a renamed copy of the table.
    pub fn foreign_key(mut self, column: &str, referenced_table: &str, referenced_column: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
        });
        self
    }

    /// Add a multi-column UNIQUE constraint
    pub fn unique_constraint(mut self, columns: &[&str]) -> Self {
        self.unique_constraints
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    fn modify_last(mut self, f: impl FnOnce(ColumnDef) -> ColumnDef) -> Self {
        if let Some(last) = self.columns.pop() {
            self.columns.push(f(last));
        }
        self
    }

    pub fn build(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.to_sql(self.dialect))
            .collect();

        for columns in &self.unique_constraints {
            parts.push(format!("UNIQUE({})", columns.join(", ")));
        }
        for fk in &self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY({}) REFERENCES {}({})",
                fk.column, fk.referenced_table, fk.referenced_column
            ));
        }

        let create = if self.if_not_exists {
            "CREATE TABLE IF NOT EXISTS"
        } else {
            "CREATE TABLE"
        };
        format!("{} {} ({})", create, self.table, parts.join(", "))
    }
}

/// INSERT statement with positional placeholders
///
/// # Example
///
/// ```
/// use plan_storage::core::query_builder::insert_sql;
///
/// assert_eq!(
///     insert_sql("plan_extension_groups", &["provider_id", "uuid", "group_name"]),
///     "INSERT INTO plan_extension_groups (provider_id, uuid, group_name) VALUES (?, ?, ?)"
/// );
/// ```
pub fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// UPDATE statement setting `columns` and filtering on `where_columns`, all as placeholders
pub fn update_sql(table: &str, columns: &[&str], where_columns: &[&str]) -> String {
    let set: Vec<String> = columns.iter().map(|c| format!("{}=?", c)).collect();
    let filter: Vec<String> = where_columns.iter().map(|c| format!("{}=?", c)).collect();
    format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        set.join(", "),
        filter.join(" AND ")
    )
}
