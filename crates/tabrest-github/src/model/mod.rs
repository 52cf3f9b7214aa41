//! GitHub REST entities and their row form.
//!
//! Every entity deserializes straight from the API payload. Fields the
//! payload does not carry (owner, repo, pull number, run id) are context set
//! by the fetch code before the entity is turned into a row. Each entity
//! declares its table's columns next to its `ToRow` impl so the two stay in
//! lockstep.

mod actions;
mod issue;
mod pull;
mod repo;

pub use actions::{Artifact, Job, Step, Workflow, WorkflowRun};
pub use issue::{Issue, IssueComment};
pub use pull::{Pull, PullCommit, Review};
pub use repo::Repo;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabrest_connectors::{Envelope, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

/// Paged response wrapping its list with a `total_count`.
///
/// The Actions endpoints name the list after the resource
/// (`workflows`, `workflow_runs`, `jobs`, `artifacts`).
#[derive(Debug, Clone, Deserialize)]
pub struct CountedPage<T> {
    pub total_count: Option<u64>,
    #[serde(
        alias = "workflows",
        alias = "workflow_runs",
        alias = "jobs",
        alias = "artifacts"
    )]
    pub items: Option<Vec<T>>,
}

impl<T> Envelope for CountedPage<T> {
    type Item = T;

    fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    fn into_items(self) -> Option<Vec<T>> {
        self.items
    }
}

pub(crate) fn timestamp(value: &Option<DateTime<Utc>>) -> Value {
    Value::timestamp(value.map(|t| t.timestamp_millis()))
}

pub(crate) fn login(user: &Option<User>) -> Value {
    user.as_ref().map(|u| u.login.as_str()).into()
}

pub(crate) fn label_ids(labels: &[Label]) -> Value {
    Value::array(labels.iter().map(|l| l.id))
}

pub(crate) fn label_names(labels: &[Label]) -> Value {
    Value::array(labels.iter().map(|l| l.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_page_field_names() {
        for field in ["workflows", "workflow_runs", "jobs", "artifacts"] {
            let json = format!(r#"{{"total_count": 2, "{}": [1, 2]}}"#, field);
            let page: CountedPage<i64> = serde_json::from_str(&json).unwrap();
            assert_eq!(page.total_count(), Some(2));
            assert_eq!(page.into_items(), Some(vec![1, 2]));
        }
    }

    #[test]
    fn test_counted_page_null_list() {
        let page: CountedPage<i64> =
            serde_json::from_str(r#"{"total_count": 0, "jobs": null}"#).unwrap();
        assert_eq!(page.into_items(), None);
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn test_counted_page_missing_fields() {
        // item types need not implement Default
        let page: CountedPage<Named> = serde_json::from_str("{}").unwrap();
        assert_eq!(page.total_count(), None);
        assert_eq!(page.into_items(), None);

        let page: CountedPage<Named> =
            serde_json::from_str(r#"{"workflows": [{"name": "ci"}]}"#).unwrap();
        assert_eq!(page.total_count(), None);
        assert_eq!(
            page.into_items(),
            Some(vec![Named {
                name: "ci".to_string()
            }])
        );
    }

    #[test]
    fn test_timestamp_is_epoch_millis() {
        let t: DateTime<Utc> = "2024-03-01T12:00:00Z".parse().unwrap();
        assert_eq!(timestamp(&Some(t)), Value::Timestamp(1_709_294_400_000));
        assert_eq!(timestamp(&None), Value::Null);
    }
}
