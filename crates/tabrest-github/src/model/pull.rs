use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabrest_connectors::{ColumnSchema, ColumnType, Row, ToRow, Value};

use super::{label_ids, label_names, login, timestamp, Label, User};

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pull {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub user: Option<User>,
    pub body: Option<String>,
    pub draft: Option<bool>,
    pub head: Option<BranchRef>,
    pub base: Option<BranchRef>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub requested_reviewers: Vec<User>,
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl Pull {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::required("number", ColumnType::BigInt),
            ColumnSchema::required("title", ColumnType::Varchar),
            ColumnSchema::required("state", ColumnType::Varchar),
            ColumnSchema::nullable("user_login", ColumnType::Varchar),
            ColumnSchema::nullable("body", ColumnType::Varchar),
            ColumnSchema::nullable("draft", ColumnType::Boolean),
            ColumnSchema::nullable("head_ref", ColumnType::Varchar),
            ColumnSchema::nullable("head_sha", ColumnType::Varchar),
            ColumnSchema::nullable("base_ref", ColumnType::Varchar),
            ColumnSchema::required("label_ids", ColumnType::array_of(ColumnType::BigInt)),
            ColumnSchema::required("label_names", ColumnType::array_of(ColumnType::Varchar)),
            ColumnSchema::required(
                "requested_reviewer_ids",
                ColumnType::array_of(ColumnType::BigInt),
            ),
            ColumnSchema::required(
                "requested_reviewer_logins",
                ColumnType::array_of(ColumnType::Varchar),
            ),
            ColumnSchema::required("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
            ColumnSchema::nullable("closed_at", ColumnType::Timestamp),
            ColumnSchema::nullable("merged_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }
}

impl ToRow for Pull {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.number.into(),
            self.title.as_str().into(),
            self.state.as_str().into(),
            login(&self.user),
            self.body.as_deref().into(),
            self.draft.into(),
            self.head.as_ref().map(|b| b.ref_name.as_str()).into(),
            self.head.as_ref().map(|b| b.sha.as_str()).into(),
            self.base.as_ref().map(|b| b.ref_name.as_str()).into(),
            label_ids(&self.labels),
            label_names(&self.labels),
            Value::array(self.requested_reviewers.iter().map(|u| u.id)),
            Value::array(self.requested_reviewers.iter().map(|u| u.login.as_str())),
            self.html_url.as_str().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
            timestamp(&self.closed_at),
            timestamp(&self.merged_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitActor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<GitActor>,
    pub committer: Option<GitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullCommit {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    #[serde(skip)]
    pub pull_number: i64,
    pub sha: String,
    pub commit: CommitDetail,
    /// GitHub account of the author; null when the email maps to no account.
    pub author: Option<User>,
    pub html_url: Option<String>,
}

impl PullCommit {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("pull_number", ColumnType::BigInt),
            ColumnSchema::required("sha", ColumnType::Varchar),
            ColumnSchema::required("message", ColumnType::Varchar),
            ColumnSchema::nullable("author_name", ColumnType::Varchar),
            ColumnSchema::nullable("author_email", ColumnType::Varchar),
            ColumnSchema::nullable("author_date", ColumnType::Timestamp),
            ColumnSchema::nullable("author_login", ColumnType::Varchar),
            ColumnSchema::nullable("committer_name", ColumnType::Varchar),
            ColumnSchema::nullable("committer_date", ColumnType::Timestamp),
            ColumnSchema::nullable("html_url", ColumnType::Varchar),
        ]
    }

    pub fn with_pull(mut self, owner: &str, repo: &str, pull_number: i64) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self.pull_number = pull_number;
        self
    }
}

impl ToRow for PullCommit {
    fn to_row(&self) -> Row {
        let author = self.commit.author.as_ref();
        let committer = self.commit.committer.as_ref();
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.pull_number.into(),
            self.sha.as_str().into(),
            self.commit.message.as_str().into(),
            author.and_then(|a| a.name.as_deref()).into(),
            author.and_then(|a| a.email.as_deref()).into(),
            timestamp(&author.and_then(|a| a.date)),
            login(&self.author),
            committer.and_then(|c| c.name.as_deref()).into(),
            timestamp(&committer.and_then(|c| c.date)),
            self.html_url.as_deref().into(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    #[serde(skip)]
    pub pull_number: i64,
    pub id: i64,
    pub user: Option<User>,
    pub state: String,
    pub body: Option<String>,
    pub commit_id: Option<String>,
    pub html_url: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("pull_number", ColumnType::BigInt),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::nullable("user_login", ColumnType::Varchar),
            ColumnSchema::required("state", ColumnType::Varchar),
            ColumnSchema::nullable("body", ColumnType::Varchar),
            ColumnSchema::nullable("commit_id", ColumnType::Varchar),
            ColumnSchema::nullable("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("submitted_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_pull(mut self, owner: &str, repo: &str, pull_number: i64) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self.pull_number = pull_number;
        self
    }
}

impl ToRow for Review {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.pull_number.into(),
            self.id.into(),
            login(&self.user),
            self.state.as_str().into(),
            self.body.as_deref().into(),
            self.commit_id.as_deref().into(),
            self.html_url.as_deref().into(),
            timestamp(&self.submitted_at),
        ]
    }
}
