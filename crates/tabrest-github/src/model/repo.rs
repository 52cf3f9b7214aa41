use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabrest_connectors::{ColumnSchema, ColumnType, Row, ToRow};

use super::timestamp;

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    #[serde(skip)]
    pub owner: String,
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub fork: bool,
    pub html_url: String,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    pub stargazers_count: Option<i64>,
    pub forks_count: Option<i64>,
    pub open_issues_count: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repo {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::required("name", ColumnType::Varchar),
            ColumnSchema::required("full_name", ColumnType::Varchar),
            ColumnSchema::nullable("description", ColumnType::Varchar),
            ColumnSchema::required("private", ColumnType::Boolean),
            ColumnSchema::required("fork", ColumnType::Boolean),
            ColumnSchema::required("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("language", ColumnType::Varchar),
            ColumnSchema::nullable("default_branch", ColumnType::Varchar),
            ColumnSchema::nullable("stargazers_count", ColumnType::BigInt),
            ColumnSchema::nullable("forks_count", ColumnType::BigInt),
            ColumnSchema::nullable("open_issues_count", ColumnType::BigInt),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
            ColumnSchema::nullable("pushed_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }
}

impl ToRow for Repo {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.id.into(),
            self.name.as_str().into(),
            self.full_name.as_str().into(),
            self.description.as_deref().into(),
            self.private.into(),
            self.fork.into(),
            self.html_url.as_str().into(),
            self.language.as_deref().into(),
            self.default_branch.as_deref().into(),
            self.stargazers_count.into(),
            self.forks_count.into(),
            self.open_issues_count.into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
            timestamp(&self.pushed_at),
        ]
    }
}
