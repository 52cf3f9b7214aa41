//! Column and cell model shared by every REST backend.
//!
//! A table's metadata is an ordered list of [`ColumnSchema`]; a fetched
//! record is a [`Row`] whose values line up with that list position by
//! position.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::domain::Literal;

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    /// UTC timestamp with millisecond precision.
    Timestamp,
    Array(Box<ColumnType>),
}

impl ColumnType {
    pub fn array_of(element: ColumnType) -> Self {
        ColumnType::Array(Box::new(element))
    }

    /// Arrow type used when rows are handed to the engine.
    pub fn to_arrow(&self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Varchar => DataType::Utf8,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            ColumnType::Array(element) => {
                DataType::List(Arc::new(Field::new("item", element.to_arrow(), true)))
            }
        }
    }
}

/// One column of a table: name, type and whether nulls may appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnSchema {
    /// A column that is always populated (identifiers, request context).
    pub fn required(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
        }
    }

    pub fn nullable(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: true,
        }
    }

    pub fn to_field(&self) -> Field {
        Field::new(&self.name, self.column_type.to_arrow(), self.nullable)
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    BigInt(i64),
    Double(f64),
    Varchar(String),
    /// Milliseconds since the Unix epoch, UTC.
    Timestamp(i64),
    Array(Vec<Value>),
}

pub type Row = Vec<Value>;

/// Capability of a REST entity to render itself as a row.
///
/// The returned row must match the table's declared columns exactly:
/// same length, same order, same type per position.
pub trait ToRow {
    fn to_row(&self) -> Row;
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Timestamp from optional epoch milliseconds.
    pub fn timestamp(millis: Option<i64>) -> Self {
        millis.map(Value::Timestamp).unwrap_or(Value::Null)
    }

    /// Collect a list of items into an array value.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// The comparable literal for this value, if it has one.
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Boolean(b) => Some(Literal::Boolean(*b)),
            Value::BigInt(i) => Some(Literal::BigInt(*i)),
            Value::Varchar(s) => Some(Literal::Varchar(s.clone())),
            Value::Timestamp(t) => Some(Literal::Timestamp(*t)),
            Value::Null | Value::Double(_) | Value::Array(_) => None,
        }
    }

    /// Whether the value may be stored in a column of the given type.
    pub fn fits(&self, column_type: &ColumnType) -> bool {
        match (self, column_type) {
            (Value::Null, _) => true,
            (Value::Boolean(_), ColumnType::Boolean) => true,
            (Value::BigInt(_), ColumnType::BigInt) => true,
            (Value::Double(_), ColumnType::Double) => true,
            (Value::Varchar(_), ColumnType::Varchar) => true,
            (Value::Timestamp(_), ColumnType::Timestamp) => true,
            (Value::Array(items), ColumnType::Array(element)) => {
                items.iter().all(|v| v.fits(element))
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Varchar(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Check that a row lines up with its table's columns.
pub fn row_matches_schema(row: &[Value], columns: &[ColumnSchema]) -> bool {
    row.len() == columns.len()
        && row
            .iter()
            .zip(columns)
            .all(|(v, c)| v.fits(&c.column_type) && (c.nullable || !v.is_null()))
}
