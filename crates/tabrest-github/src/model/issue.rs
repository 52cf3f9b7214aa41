use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabrest_connectors::{ColumnSchema, ColumnType, Row, ToRow, Value};

use super::{label_ids, label_names, login, timestamp, Label, User};

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub user: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<User>,
    pub comments: Option<i64>,
    pub body: Option<String>,
    /// Present when the issue is a pull request.
    pub pull_request: Option<serde_json::Value>,
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::required("number", ColumnType::BigInt),
            ColumnSchema::required("title", ColumnType::Varchar),
            ColumnSchema::required("state", ColumnType::Varchar),
            ColumnSchema::nullable("user_login", ColumnType::Varchar),
            ColumnSchema::required("label_ids", ColumnType::array_of(ColumnType::BigInt)),
            ColumnSchema::required("label_names", ColumnType::array_of(ColumnType::Varchar)),
            ColumnSchema::required("assignee_logins", ColumnType::array_of(ColumnType::Varchar)),
            ColumnSchema::nullable("comments", ColumnType::BigInt),
            ColumnSchema::nullable("body", ColumnType::Varchar),
            ColumnSchema::required("is_pull_request", ColumnType::Boolean),
            ColumnSchema::required("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
            ColumnSchema::nullable("closed_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }
}

impl ToRow for Issue {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.number.into(),
            self.title.as_str().into(),
            self.state.as_str().into(),
            login(&self.user),
            label_ids(&self.labels),
            label_names(&self.labels),
            Value::array(self.assignees.iter().map(|u| u.login.as_str())),
            self.comments.into(),
            self.body.as_deref().into(),
            self.pull_request.is_some().into(),
            self.html_url.as_str().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
            timestamp(&self.closed_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub issue_url: Option<String>,
    pub user: Option<User>,
    pub body: Option<String>,
    pub author_association: Option<String>,
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueComment {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::nullable("issue_number", ColumnType::BigInt),
            ColumnSchema::nullable("user_login", ColumnType::Varchar),
            ColumnSchema::nullable("body", ColumnType::Varchar),
            ColumnSchema::nullable("author_association", ColumnType::Varchar),
            ColumnSchema::required("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }

    /// Issue number, taken from the last segment of `issue_url`.
    pub fn issue_number(&self) -> Option<i64> {
        self.issue_url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .and_then(|n| n.parse().ok())
    }
}

impl ToRow for IssueComment {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.issue_number().into(),
            login(&self.user),
            self.body.as_deref().into(),
            self.author_association.as_deref().into(),
            self.html_url.as_str().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
        ]
    }
}
