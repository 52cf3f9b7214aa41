use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabrest_connectors::{ColumnSchema, ColumnType, Row, ToRow, Value};

use super::{login, timestamp, User};

#[derive(Debug, Clone, Deserialize)]
pub struct Workflow {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub name: String,
    pub path: String,
    pub state: String,
    pub html_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::required("name", ColumnType::Varchar),
            ColumnSchema::required("path", ColumnType::Varchar),
            ColumnSchema::required("state", ColumnType::Varchar),
            ColumnSchema::nullable("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }
}

impl ToRow for Workflow {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.name.as_str().into(),
            self.path.as_str().into(),
            self.state.as_str().into(),
            self.html_url.as_deref().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub name: Option<String>,
    pub workflow_id: i64,
    pub run_number: i64,
    pub run_attempt: Option<i64>,
    pub event: String,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: String,
    pub actor: Option<User>,
    pub html_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::nullable("name", ColumnType::Varchar),
            ColumnSchema::required("workflow_id", ColumnType::BigInt),
            ColumnSchema::required("run_number", ColumnType::BigInt),
            ColumnSchema::nullable("run_attempt", ColumnType::BigInt),
            ColumnSchema::required("event", ColumnType::Varchar),
            ColumnSchema::nullable("status", ColumnType::Varchar),
            ColumnSchema::nullable("conclusion", ColumnType::Varchar),
            ColumnSchema::nullable("head_branch", ColumnType::Varchar),
            ColumnSchema::required("head_sha", ColumnType::Varchar),
            ColumnSchema::nullable("actor_login", ColumnType::Varchar),
            ColumnSchema::nullable("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }
}

impl ToRow for WorkflowRun {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.name.as_deref().into(),
            self.workflow_id.into(),
            self.run_number.into(),
            self.run_attempt.into(),
            self.event.as_str().into(),
            self.status.as_deref().into(),
            self.conclusion.as_deref().into(),
            self.head_branch.as_deref().into(),
            self.head_sha.as_str().into(),
            login(&self.actor),
            self.html_url.as_deref().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub run_id: i64,
    pub run_attempt: Option<i64>,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub head_sha: Option<String>,
    pub runner_name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub html_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
}

impl Job {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::required("run_id", ColumnType::BigInt),
            ColumnSchema::nullable("run_attempt", ColumnType::BigInt),
            ColumnSchema::required("name", ColumnType::Varchar),
            ColumnSchema::required("status", ColumnType::Varchar),
            ColumnSchema::nullable("conclusion", ColumnType::Varchar),
            ColumnSchema::nullable("head_sha", ColumnType::Varchar),
            ColumnSchema::nullable("runner_name", ColumnType::Varchar),
            ColumnSchema::required("labels", ColumnType::array_of(ColumnType::Varchar)),
            ColumnSchema::nullable("html_url", ColumnType::Varchar),
            ColumnSchema::nullable("started_at", ColumnType::Timestamp),
            ColumnSchema::nullable("completed_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }

    /// The job's steps, each carrying the job's context.
    pub fn into_steps(self) -> Vec<Step> {
        let Self {
            owner,
            repo,
            id,
            run_id,
            name,
            steps,
            ..
        } = self;
        steps
            .unwrap_or_default()
            .into_iter()
            .map(|mut step| {
                step.owner = owner.clone();
                step.repo = repo.clone();
                step.run_id = run_id;
                step.job_id = id;
                step.job_name = name.clone();
                step
            })
            .collect()
    }
}

impl ToRow for Job {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.run_id.into(),
            self.run_attempt.into(),
            self.name.as_str().into(),
            self.status.as_str().into(),
            self.conclusion.as_deref().into(),
            self.head_sha.as_deref().into(),
            self.runner_name.as_deref().into(),
            Value::array(self.labels.iter()),
            self.html_url.as_deref().into(),
            timestamp(&self.started_at),
            timestamp(&self.completed_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    #[serde(skip)]
    pub run_id: i64,
    #[serde(skip)]
    pub job_id: i64,
    #[serde(skip)]
    pub job_name: String,
    pub number: i64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("run_id", ColumnType::BigInt),
            ColumnSchema::required("job_id", ColumnType::BigInt),
            ColumnSchema::required("job_name", ColumnType::Varchar),
            ColumnSchema::required("number", ColumnType::BigInt),
            ColumnSchema::required("name", ColumnType::Varchar),
            ColumnSchema::required("status", ColumnType::Varchar),
            ColumnSchema::nullable("conclusion", ColumnType::Varchar),
            ColumnSchema::nullable("started_at", ColumnType::Timestamp),
            ColumnSchema::nullable("completed_at", ColumnType::Timestamp),
        ]
    }
}

impl ToRow for Step {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.run_id.into(),
            self.job_id.into(),
            self.job_name.as_str().into(),
            self.number.into(),
            self.name.as_str().into(),
            self.status.as_str().into(),
            self.conclusion.as_deref().into(),
            timestamp(&self.started_at),
            timestamp(&self.completed_at),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactRun {
    pub id: Option<i64>,
    pub head_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub repo: String,
    pub id: i64,
    pub name: String,
    pub size_in_bytes: Option<i64>,
    pub expired: bool,
    pub archive_download_url: Option<String>,
    pub workflow_run: Option<ArtifactRun>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("owner", ColumnType::Varchar),
            ColumnSchema::required("repo", ColumnType::Varchar),
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::nullable("run_id", ColumnType::BigInt),
            ColumnSchema::required("name", ColumnType::Varchar),
            ColumnSchema::nullable("size_in_bytes", ColumnType::BigInt),
            ColumnSchema::required("expired", ColumnType::Boolean),
            ColumnSchema::nullable("head_branch", ColumnType::Varchar),
            ColumnSchema::nullable("archive_download_url", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::nullable("updated_at", ColumnType::Timestamp),
            ColumnSchema::nullable("expires_at", ColumnType::Timestamp),
        ]
    }

    pub fn with_repo(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }

    /// Pin the run when the listing was scoped to it; older payloads omit `workflow_run`.
    pub fn with_run_id(mut self, run_id: Option<i64>) -> Self {
        if let Some(run_id) = run_id {
            let run = self.workflow_run.get_or_insert(ArtifactRun {
                id: None,
                head_branch: None,
            });
            run.id = Some(run_id);
        }
        self
    }

    pub fn run_id(&self) -> Option<i64> {
        self.workflow_run.as_ref().and_then(|r| r.id)
    }
}

impl ToRow for Artifact {
    fn to_row(&self) -> Row {
        vec![
            self.owner.as_str().into(),
            self.repo.as_str().into(),
            self.id.into(),
            self.run_id().into(),
            self.name.as_str().into(),
            self.size_in_bytes.into(),
            self.expired.into(),
            self.workflow_run
                .as_ref()
                .and_then(|r| r.head_branch.as_deref())
                .into(),
            self.archive_download_url.as_deref().into(),
            timestamp(&self.created_at),
            timestamp(&self.updated_at),
            timestamp(&self.expires_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabrest_connectors::value::row_matches_schema;

    const JOB: &str = r#"{
        "id": 399444496,
        "run_id": 29679449,
        "run_attempt": 1,
        "name": "build",
        "status": "completed",
        "conclusion": "failure",
        "head_sha": "f83a356",
        "runner_name": "my runner",
        "labels": ["ubuntu-latest", "gpu"],
        "html_url": "https://github.com/o/r/runs/399444496",
        "started_at": "2020-01-20T17:42:40Z",
        "completed_at": "2020-01-20T17:44:39Z",
        "steps": [
            {"name": "Set up job", "status": "completed", "conclusion": "success", "number": 1,
             "started_at": "2020-01-20T09:42:40.000-08:00", "completed_at": "2020-01-20T09:42:41.000-08:00"},
            {"name": "Run tests", "status": "completed", "conclusion": "failure", "number": 2,
             "started_at": null, "completed_at": null}
        ]
    }"#;

    #[test]
    fn test_job_row() {
        let job: Job = serde_json::from_str(JOB).unwrap();
        let row = job.with_repo("o", "r").to_row();
        assert!(row_matches_schema(&row, &Job::columns()));
        assert_eq!(row[3], Value::BigInt(29679449));
        assert_eq!(row[10], Value::array(["ubuntu-latest", "gpu"]));
    }

    #[test]
    fn test_job_expands_into_steps() {
        let job: Job = serde_json::from_str(JOB).unwrap();
        let steps = job.with_repo("o", "r").into_steps();
        assert_eq!(steps.len(), 2);

        let rows: Vec<Row> = steps.iter().map(ToRow::to_row).collect();
        for row in &rows {
            assert!(row_matches_schema(row, &Step::columns()));
            assert_eq!(row[2], Value::BigInt(29679449));
            assert_eq!(row[3], Value::BigInt(399444496));
            assert_eq!(row[4], Value::from("build"));
        }
        // offsets normalize to UTC
        assert_eq!(rows[0][9], Value::Timestamp(1_579_542_160_000));
        assert_eq!(rows[1][8], Value::from("failure"));
    }

    #[test]
    fn test_job_without_steps() {
        let job: Job = serde_json::from_str(
            r#"{"id": 1, "run_id": 2, "name": "queued", "status": "queued", "steps": null}"#,
        )
        .unwrap();
        assert!(job.clone().into_steps().is_empty());
        let row = job.with_repo("o", "r").to_row();
        assert!(row_matches_schema(&row, &Job::columns()));
        assert_eq!(row[10], Value::Array(vec![]));
    }

    #[test]
    fn test_run_row() {
        let run: WorkflowRun = serde_json::from_str(
            r#"{"id": 30433642, "name": "Build", "workflow_id": 159038, "run_number": 562,
                "event": "push", "status": "queued", "conclusion": null,
                "head_branch": "master", "head_sha": "acb5820",
                "actor": {"login": "octocat", "id": 1},
                "created_at": "2020-01-22T19:33:08Z", "updated_at": "2020-01-22T19:33:08Z"}"#,
        )
        .unwrap();
        let row = run.with_repo("o", "r").to_row();
        assert!(row_matches_schema(&row, &WorkflowRun::columns()));
        assert_eq!(row[8], Value::from("queued"));
        assert_eq!(row[9], Value::Null);
        assert_eq!(row[12], Value::from("octocat"));
    }

    #[test]
    fn test_artifact_run_id() {
        let json = r#"{"id": 11, "name": "logs", "size_in_bytes": 556, "expired": false,
                       "workflow_run": {"id": 2332938, "head_branch": "main"}}"#;
        let artifact: Artifact = serde_json::from_str(json).unwrap();
        let row = artifact.clone().with_repo("o", "r").to_row();
        assert!(row_matches_schema(&row, &Artifact::columns()));
        assert_eq!(row[3], Value::BigInt(2332938));
        assert_eq!(row[7], Value::from("main"));

        let bare: Artifact =
            serde_json::from_str(r#"{"id": 12, "name": "x", "expired": true}"#).unwrap();
        assert_eq!(bare.run_id(), None);
        assert_eq!(bare.with_run_id(Some(5)).run_id(), Some(5));
    }

    #[test]
    fn test_workflow_row() {
        let workflow: Workflow = serde_json::from_str(
            r#"{"id": 161335, "name": "CI", "path": ".github/workflows/ci.yml", "state": "active"}"#,
        )
        .unwrap();
        let row = workflow.with_repo("o", "r").to_row();
        assert!(row_matches_schema(&row, &Workflow::columns()));
        assert_eq!(row[4], Value::from(".github/workflows/ci.yml"));
    }
}
