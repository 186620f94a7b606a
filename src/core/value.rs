//! Bound parameter and result values
//!
//! Parameters travel to the drivers as [`DatabaseValue`]s and rows come back as
//! [`DatabaseRow`] maps, which the [`Query`](crate::core::Query) mappers read through the
//! [`RowExt`] accessors.

use super::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl DatabaseValue {
    /// Get the value as a boolean
    ///
    /// Both engines store booleans as integers, so integer 0/1 read back as booleans.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v != 0),
            DatabaseValue::Long(v) => Some(*v != 0),
            DatabaseValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as an i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Long(v) => i32::try_from(*v).ok(),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as i64),
            DatabaseValue::Double(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::Long(v) => Some(*v as f64),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string slice, without conversion
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as an owned string, converting numbers and decoding UTF-8 bytes
    pub fn to_text(&self) -> Option<String> {
        match self {
            DatabaseValue::Null => None,
            DatabaseValue::Bool(v) => Some(v.to_string()),
            DatabaseValue::Int(v) => Some(v.to_string()),
            DatabaseValue::Long(v) => Some(v.to_string()),
            DatabaseValue::Double(v) => Some(v.to_string()),
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Bytes(b) => String::from_utf8(b.clone()).ok(),
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(v: &String) -> Self {
        DatabaseValue::String(v.clone())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A row of database results (column name -> value mapping)
pub type DatabaseRow = HashMap<String, DatabaseValue>;

/// Multiple rows returned from a query
pub type DatabaseResult = Vec<DatabaseRow>;

/// Typed column access for result rows
///
/// A missing column is an operation error; `NULL` reads as `None` through the `opt_`
/// accessors.
pub trait RowExt {
    fn value(&self, column: &str) -> Result<&DatabaseValue>;

    fn long(&self, column: &str) -> Result<i64> {
        let value = self.value(column)?;
        value
            .as_long()
            .ok_or_else(|| DatabaseError::type_mismatch("long", value.type_name()))
    }

    fn int(&self, column: &str) -> Result<i32> {
        let value = self.value(column)?;
        value
            .as_int()
            .ok_or_else(|| DatabaseError::type_mismatch("int", value.type_name()))
    }

    fn boolean(&self, column: &str) -> Result<bool> {
        let value = self.value(column)?;
        value
            .as_bool()
            .ok_or_else(|| DatabaseError::type_mismatch("bool", value.type_name()))
    }

    fn string(&self, column: &str) -> Result<String> {
        let value = self.value(column)?;
        value
            .to_text()
            .ok_or_else(|| DatabaseError::type_mismatch("string", value.type_name()))
    }

    fn opt_long(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            DatabaseValue::Null => Ok(None),
            _ => self.long(column).map(Some),
        }
    }

    fn opt_double(&self, column: &str) -> Result<Option<f64>> {
        let value = self.value(column)?;
        match value {
            DatabaseValue::Null => Ok(None),
            other => other
                .as_double()
                .map(Some)
                .ok_or_else(|| DatabaseError::type_mismatch("double", other.type_name())),
        }
    }

    fn opt_string(&self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            DatabaseValue::Null => Ok(None),
            _ => self.string(column).map(Some),
        }
    }
}

impl RowExt for DatabaseRow {
    fn value(&self, column: &str) -> Result<&DatabaseValue> {
        self.get(column)
            .ok_or_else(|| DatabaseError::operation(format!("Column not found in row: {}", column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        let val = DatabaseValue::Int(42);
        assert_eq!(val.as_int(), Some(42));
        assert_eq!(val.as_long(), Some(42));
        assert_eq!(val.to_text().as_deref(), Some("42"));

        let val = DatabaseValue::String("123".to_string());
        assert_eq!(val.as_int(), Some(123));
        assert_eq!(val.as_long(), Some(123));

        let val = DatabaseValue::Long(1);
        assert_eq!(val.as_bool(), Some(true));
    }

    #[test]
    fn test_value_from_types() {
        let val: DatabaseValue = 42.into();
        assert_eq!(val, DatabaseValue::Int(42));

        let val: DatabaseValue = "hello".into();
        assert_eq!(val, DatabaseValue::String("hello".to_string()));

        let val: DatabaseValue = Some(42i64).into();
        assert_eq!(val, DatabaseValue::Long(42));

        let val: DatabaseValue = Option::<String>::None.into();
        assert_eq!(val, DatabaseValue::Null);
    }

    #[test]
    fn test_bytes_decode_as_text() {
        // MySQL returns VARCHAR columns as bytes in the text protocol.
        let val = DatabaseValue::Bytes(b"plan_users".to_vec());
        assert_eq!(val.to_text().as_deref(), Some("plan_users"));
        assert_eq!(DatabaseValue::Null.to_text(), None);
    }

    #[test]
    fn test_row_accessors() {
        let mut row = DatabaseRow::new();
        row.insert("id".to_string(), DatabaseValue::Long(7));
        row.insert("name".to_string(), DatabaseValue::String("Alice".to_string()));
        row.insert("hostname".to_string(), DatabaseValue::Null);
        row.insert("flag".to_string(), DatabaseValue::Long(0));

        assert_eq!(row.long("id").unwrap(), 7);
        assert_eq!(row.int("id").unwrap(), 7);
        assert_eq!(row.string("name").unwrap(), "Alice");
        assert_eq!(row.opt_string("hostname").unwrap(), None);
        assert!(!row.boolean("flag").unwrap());
        assert!(row.long("missing").is_err());
        assert!(matches!(
            row.long("name"),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }
}
