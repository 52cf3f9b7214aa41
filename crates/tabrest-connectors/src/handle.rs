//! Table handles and splits: the immutable units of work passed between
//! planning and execution.
//!
//! Every "mutation" returns a new handle. Handles serialize to a stable JSON
//! form (`schemaTableName`, `constraint`, `offset`, `limit`, `pageIncrement`,
//! `sortOrder`) so they can be shipped to executors and decoded there.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Constraint;
use crate::value::ColumnType;

/// Sentinel limit meaning "no limit".
pub const NO_LIMIT: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTableName {
    pub schema_name: String,
    pub table_name: String,
}

impl SchemaTableName {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for SchemaTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}

/// A column reference. Equality covers both name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHandle {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnHandle {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Query parameter value used by most REST APIs.
    pub fn as_param(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortItem {
    pub name: String,
    pub direction: SortDirection,
}

impl SortItem {
    pub fn asc(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        write!(f, "{} {}", self.name, dir)
    }
}

/// What subset of a table a fetch should retrieve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableHandle {
    schema_table_name: SchemaTableName,
    constraint: Constraint,
    offset: u32,
    limit: u64,
    page_increment: u32,
    #[serde(default)]
    sort_order: Option<Vec<SortItem>>,
}

impl TableHandle {
    /// An unconstrained, unlimited handle for the table.
    pub fn new(schema_table_name: SchemaTableName) -> Self {
        Self {
            schema_table_name,
            constraint: Constraint::all(),
            offset: 0,
            limit: NO_LIMIT,
            page_increment: 1,
            sort_order: None,
        }
    }

    pub fn schema_table_name(&self) -> &SchemaTableName {
        &self.schema_table_name
    }

    pub fn table_name(&self) -> &str {
        &self.schema_table_name.table_name
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Zero-based page offset this handle starts from.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == NO_LIMIT
    }

    /// Distance between consecutive pages fetched for this handle.
    pub fn page_increment(&self) -> u32 {
        self.page_increment
    }

    pub fn sort_order(&self) -> Option<&[SortItem]> {
        self.sort_order.as_deref()
    }

    pub fn with_constraint(&self, constraint: Constraint) -> Self {
        Self {
            constraint,
            ..self.clone()
        }
    }

    pub fn with_limit(&self, limit: u64) -> Self {
        Self {
            limit,
            ..self.clone()
        }
    }

    /// Replace the sort order; an empty list clears it.
    pub fn with_sort_order(&self, sort_order: Vec<SortItem>) -> Self {
        Self {
            sort_order: if sort_order.is_empty() {
                None
            } else {
                Some(sort_order)
            },
            ..self.clone()
        }
    }

    pub fn with_page_window(&self, offset: u32, page_increment: u32) -> Self {
        Self {
            offset,
            page_increment: page_increment.max(1),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.schema_table_name)?;
        if !self.constraint.is_all() {
            let cols: Vec<&str> = self
                .constraint
                .column_domains()
                .iter()
                .map(|cd| cd.column.name.as_str())
                .collect();
            write!(f, " constraint=[{}]", cols.join(","))?;
        }
        if !self.is_unlimited() {
            write!(f, " limit={}", self.limit)?;
        }
        if let Some(sort) = &self.sort_order {
            let items: Vec<String> = sort.iter().map(|s| s.to_string()).collect();
            write!(f, " sort=[{}]", items.join(","))?;
        }
        if self.page_increment > 1 {
            write!(f, " pages={}+{}k", self.offset + 1, self.page_increment)?;
        }
        Ok(())
    }
}

/// One schedulable unit of fetch work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub table_handle: TableHandle,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl Split {
    pub fn new(table_handle: TableHandle) -> Self {
        Self {
            table_handle,
            addresses: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Literal, Range};

    fn issues() -> SchemaTableName {
        SchemaTableName::new("github", "issues")
    }

    fn constrained() -> Constraint {
        Constraint::from_domains(vec![
            (
                ColumnHandle::new("owner", ColumnType::Varchar),
                Domain::single(Literal::Varchar("octo".into())),
            ),
            (
                ColumnHandle::new("updated_at", ColumnType::Timestamp),
                Domain::ranges(vec![Range::greater_or_equal(Literal::Timestamp(1000))]),
            ),
        ])
    }

    #[test]
    fn test_with_methods_do_not_mutate_original() {
        let base = TableHandle::new(issues());
        let limited = base.with_limit(10);
        assert!(base.is_unlimited());
        assert_eq!(limited.limit(), 10);
        assert_eq!(limited.schema_table_name(), base.schema_table_name());

        let sorted = limited.with_sort_order(vec![SortItem::desc("created_at")]);
        assert_eq!(limited.sort_order(), None);
        assert_eq!(sorted.sort_order(), Some(&[SortItem::desc("created_at")][..]));
        assert_eq!(sorted.with_sort_order(vec![]).sort_order(), None);
    }

    #[test]
    fn test_page_window_increment_at_least_one() {
        let h = TableHandle::new(issues()).with_page_window(2, 0);
        assert_eq!(h.offset(), 2);
        assert_eq!(h.page_increment(), 1);
    }

    #[test]
    fn test_wire_field_names() {
        let h = TableHandle::new(issues()).with_sort_order(vec![SortItem::asc("updated_at")]);
        let v: serde_json::Value = serde_json::from_str(&h.to_json().unwrap()).unwrap();
        for key in ["schemaTableName", "constraint", "offset", "limit", "pageIncrement", "sortOrder"] {
            assert!(v.get(key).is_some(), "missing {key} in {v}");
        }
        assert_eq!(v["schemaTableName"]["tableName"], "issues");
        assert_eq!(v["sortOrder"][0]["direction"], "ASC");
    }

    #[test]
    fn test_handle_roundtrip_with_all_fields() {
        let h = TableHandle::new(issues())
            .with_constraint(constrained())
            .with_limit(250)
            .with_page_window(1, 3)
            .with_sort_order(vec![SortItem::desc("updated_at")]);
        let back = TableHandle::from_json(&h.to_json().unwrap()).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_handle_roundtrip_with_empty_fields() {
        let h = TableHandle::new(issues());
        let back = TableHandle::from_json(&h.to_json().unwrap()).unwrap();
        assert_eq!(back, h);
        assert!(back.is_unlimited());
        assert!(back.constraint().is_all());
    }

    #[test]
    fn test_handle_roundtrip_zero_limit() {
        let h = TableHandle::new(issues()).with_limit(0);
        let back = TableHandle::from_json(&h.to_json().unwrap()).unwrap();
        assert_eq!(back.limit(), 0);
    }

    #[test]
    fn test_split_roundtrip() {
        let split = Split {
            table_handle: TableHandle::new(issues()).with_constraint(constrained()),
            addresses: vec!["worker-1:8080".to_string()],
        };
        let json = serde_json::to_string(&split).unwrap();
        assert!(json.contains("\"tableHandle\""));
        assert!(json.contains("\"addresses\""));
        let back: Split = serde_json::from_str(&json).unwrap();
        assert_eq!(back, split);
    }

    #[test]
    fn test_column_handle_equality_includes_type() {
        let a = ColumnHandle::new("id", ColumnType::BigInt);
        let b = ColumnHandle::new("id", ColumnType::Varchar);
        assert_ne!(a, b);
        assert_eq!(a, ColumnHandle::new("id", ColumnType::BigInt));
    }

    #[test]
    fn test_display() {
        let h = TableHandle::new(issues())
            .with_constraint(constrained())
            .with_limit(5);
        assert_eq!(h.to_string(), "github.issues constraint=[owner,updated_at] limit=5");
    }
}
