//! GitHub table registry and per-table fetch functions.
//!
//! Each fetch resolves its path scalars from the split's constraint, builds
//! the collection request and hands it to the page loop with an
//! entity-to-row mapper. Mapped rows are checked against the enforced
//! columns before they count toward the limit.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tabrest_connectors::{
    paginate, ApiResponse, Constraint, Envelope, FetchRequest, FilterApplier, PageWindow,
    RemoteSort, RestClient, RestRequest, RestResult, Row, TableDefinition, ToRow, PAGE_SIZE,
};
use tracing::debug;

use crate::filters::{
    updated_since, IssueCommentsFilter, IssuesFilter, OwnerFilter, PullScopedFilter, PullsFilter,
    RepoFilter, RunScopedFilter, RunsFilter, StepsFilter,
};
use crate::model::{
    Artifact, CountedPage, Issue, IssueComment, Job, Pull, PullCommit, Repo, Review, Step,
    Workflow, WorkflowRun,
};

/// HTTP side of the GitHub adapter.
#[derive(Debug, Clone)]
pub struct GithubBackend {
    client: RestClient,
}

impl GithubBackend {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn page<E: DeserializeOwned>(
        &self,
        call: &RestRequest,
        page: u32,
    ) -> RestResult<ApiResponse<E>> {
        let call = call.clone().param("per_page", PAGE_SIZE).param("page", page);
        self.client.get_json(&call).await
    }

    /// Page through a bare JSON array.
    async fn list<T, M>(
        &self,
        request: &FetchRequest,
        call: RestRequest,
        window: PageWindow,
        limit: u64,
        mut map: M,
    ) -> RestResult<Vec<Row>>
    where
        T: DeserializeOwned + Send,
        M: FnMut(T) -> Vec<Row> + Send,
    {
        let call = &call;
        paginate(
            window,
            limit,
            move |page| self.page::<Vec<T>>(call, page),
            |item: T| keep(request, map(item)),
        )
        .await
    }

    /// Page through a `{total_count, <items>}` envelope.
    async fn list_counted<T, M>(
        &self,
        request: &FetchRequest,
        call: RestRequest,
        window: PageWindow,
        limit: u64,
        mut map: M,
    ) -> RestResult<Vec<Row>>
    where
        T: DeserializeOwned + Send,
        M: FnMut(T) -> Vec<Row> + Send,
    {
        let call = &call;
        paginate(
            window,
            limit,
            move |page| self.page::<CountedPage<T>>(call, page),
            |item: T| keep(request, map(item)),
        )
        .await
    }

    /// Jobs of one run, or of every run (newest first) until the limit is reached.
    async fn jobs<M>(
        &self,
        request: &FetchRequest,
        owner: &str,
        repo: &str,
        run_id: Option<i64>,
        mut map: M,
    ) -> RestResult<Vec<Row>>
    where
        M: FnMut(Job) -> Vec<Row> + Send,
    {
        let limit = request.limit();
        if let Some(run_id) = run_id {
            return self
                .list_counted(request, jobs_call(owner, repo, run_id), request.window(), limit, map)
                .await;
        }

        // runs are paged with the split's window; each run's jobs are read whole
        let window = request.window();
        let runs_call = repo_call(owner, repo, &["actions", "runs"]);
        let mut rows = Vec::new();
        let mut page = window.first_page();
        loop {
            let runs = match self
                .page::<CountedPage<WorkflowRun>>(&runs_call, page)
                .await?
            {
                ApiResponse::Found(runs) => runs,
                ApiResponse::NotFound => break,
            };
            let total = runs.total_count();
            let runs = runs.into_items().unwrap_or_default();
            if runs.is_empty() {
                break;
            }
            for run in &runs {
                let remaining = limit - rows.len() as u64;
                let call = jobs_call(owner, repo, run.id);
                rows.extend(
                    self.list_counted(request, call, PageWindow::default(), remaining, &mut map)
                        .await?,
                );
                if rows.len() as u64 >= limit {
                    debug!("limit {} reached at run {}", limit, run.id);
                    return Ok(rows);
                }
            }
            if window.is_last(page, runs.len(), total) {
                break;
            }
            page = window.next_page(page);
        }
        Ok(rows)
    }
}

fn keep(request: &FetchRequest, rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter().filter(|row| request.accepts(row)).collect()
}

fn sorted(call: RestRequest, sort: Option<RemoteSort>) -> RestRequest {
    match sort {
        Some(sort) => call
            .param("sort", sort.key)
            .param("direction", sort.direction.as_param()),
        None => call,
    }
}

/// `/repos/{owner}/{repo}/{tail..}`, each value its own path segment.
fn repo_call(owner: &str, repo: &str, tail: &[&str]) -> RestRequest {
    RestRequest::get(["repos", owner, repo].into_iter().chain(tail.iter().copied()))
}

fn jobs_call(owner: &str, repo: &str, run_id: i64) -> RestRequest {
    repo_call(owner, repo, &["actions", "runs", &run_id.to_string(), "jobs"])
        .param("filter", "all")
}

/// `owner` then `repo`, failing on the first one that is unbound.
fn repo_scope(
    filter: &impl FilterApplier,
    constraint: &Constraint,
) -> RestResult<(String, String)> {
    let owner = filter.require_string("owner", constraint)?;
    let repo = filter.require_string("repo", constraint)?;
    Ok((owner, repo))
}

// ---------------------------------------------------------------------------
// Fetch functions
// ---------------------------------------------------------------------------

fn fetch_repos<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let owner = OwnerFilter.require_string("owner", request.constraint())?;
        let call = sorted(
            RestRequest::get(["users", owner.as_str(), "repos"]),
            request.sort,
        );
        backend
            .list(request, call, request.window(), request.limit(), |repo: Repo| {
                vec![repo.with_owner(&owner).to_row()]
            })
            .await
    })
}

fn fetch_issues<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&IssuesFilter, constraint)?;
        let state = IssuesFilter
            .optional_string("state", constraint)
            .unwrap_or_else(|| "all".to_string());
        let call = sorted(
            repo_call(&owner, &repo, &["issues"])
                .param("state", state)
                .param_opt("since", updated_since(constraint)),
            request.sort,
        );
        backend
            .list(request, call, request.window(), request.limit(), |issue: Issue| {
                vec![issue.with_repo(&owner, &repo).to_row()]
            })
            .await
    })
}

fn fetch_issue_comments<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&IssueCommentsFilter, constraint)?;
        let call = sorted(
            repo_call(&owner, &repo, &["issues", "comments"])
                .param_opt("since", updated_since(constraint)),
            request.sort,
        );
        backend
            .list(
                request,
                call,
                request.window(),
                request.limit(),
                |comment: IssueComment| vec![comment.with_repo(&owner, &repo).to_row()],
            )
            .await
    })
}

fn fetch_pulls<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&PullsFilter, constraint)?;
        let state = PullsFilter
            .optional_string("state", constraint)
            .unwrap_or_else(|| "all".to_string());
        let call = sorted(
            repo_call(&owner, &repo, &["pulls"]).param("state", state),
            request.sort,
        );
        backend
            .list(request, call, request.window(), request.limit(), |pull: Pull| {
                vec![pull.with_repo(&owner, &repo).to_row()]
            })
            .await
    })
}

fn fetch_pull_commits<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&PullScopedFilter, constraint)?;
        let number = PullScopedFilter.require_i64("pull_number", constraint)?;
        let call = repo_call(&owner, &repo, &["pulls", &number.to_string(), "commits"]);
        backend
            .list(
                request,
                call,
                request.window(),
                request.limit(),
                |commit: PullCommit| vec![commit.with_pull(&owner, &repo, number).to_row()],
            )
            .await
    })
}

fn fetch_reviews<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&PullScopedFilter, constraint)?;
        let number = PullScopedFilter.require_i64("pull_number", constraint)?;
        let call = repo_call(&owner, &repo, &["pulls", &number.to_string(), "reviews"]);
        backend
            .list(request, call, request.window(), request.limit(), |review: Review| {
                vec![review.with_pull(&owner, &repo, number).to_row()]
            })
            .await
    })
}

fn fetch_workflows<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let (owner, repo) = repo_scope(&RepoFilter, request.constraint())?;
        let call = repo_call(&owner, &repo, &["actions", "workflows"]);
        backend
            .list_counted(
                request,
                call,
                request.window(),
                request.limit(),
                |workflow: Workflow| vec![workflow.with_repo(&owner, &repo).to_row()],
            )
            .await
    })
}

fn fetch_runs<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&RunsFilter, constraint)?;
        let call = repo_call(&owner, &repo, &["actions", "runs"])
            .param_opt("status", RunsFilter.optional_string("status", constraint));
        backend
            .list_counted(
                request,
                call,
                request.window(),
                request.limit(),
                |run: WorkflowRun| vec![run.with_repo(&owner, &repo).to_row()],
            )
            .await
    })
}

fn fetch_jobs<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&RunScopedFilter, constraint)?;
        let run_id = RunScopedFilter.optional_i64("run_id", constraint);
        backend
            .jobs(request, &owner, &repo, run_id, |job: Job| {
                vec![job.with_repo(&owner, &repo).to_row()]
            })
            .await
    })
}

fn fetch_steps<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&StepsFilter, constraint)?;
        let steps = |job: Job| -> Vec<Row> {
            job.with_repo(&owner, &repo)
                .into_steps()
                .iter()
                .map(Step::to_row)
                .collect()
        };

        let Some(job_id) = StepsFilter.optional_i64("job_id", constraint) else {
            let run_id = StepsFilter.optional_i64("run_id", constraint);
            return backend.jobs(request, &owner, &repo, run_id, steps).await;
        };

        // a single job is one page; later page windows have nothing to read
        if request.window().offset > 0 {
            return Ok(vec![]);
        }
        let call = repo_call(&owner, &repo, &["actions", "jobs", &job_id.to_string()]);
        let rows = match backend.client.get_json::<Job>(&call).await? {
            ApiResponse::Found(job) => keep(request, steps(job)),
            ApiResponse::NotFound => vec![],
        };
        let limit = usize::try_from(request.limit()).unwrap_or(usize::MAX);
        Ok(rows.into_iter().take(limit).collect())
    })
}

fn fetch_artifacts<'a>(
    backend: &'a GithubBackend,
    request: &'a FetchRequest,
) -> BoxFuture<'a, RestResult<Vec<Row>>> {
    Box::pin(async move {
        let constraint = request.constraint();
        let (owner, repo) = repo_scope(&RunScopedFilter, constraint)?;
        let run_id = RunScopedFilter.optional_i64("run_id", constraint);
        let call = match run_id {
            Some(run_id) => repo_call(
                &owner,
                &repo,
                &["actions", "runs", &run_id.to_string(), "artifacts"],
            ),
            None => repo_call(&owner, &repo, &["actions", "artifacts"]),
        };
        backend
            .list_counted(
                request,
                call,
                request.window(),
                request.limit(),
                |artifact: Artifact| {
                    vec![artifact.with_repo(&owner, &repo).with_run_id(run_id).to_row()]
                },
            )
            .await
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every GitHub table, built once when the adapter is created.
pub fn tables() -> Vec<TableDefinition<GithubBackend>> {
    vec![
        TableDefinition::new("repos", Repo::columns(), fetch_repos)
            .with_filters(OwnerFilter)
            .with_sort("created_at", "created")
            .with_sort("updated_at", "updated")
            .with_sort("pushed_at", "pushed")
            .with_sort("full_name", "full_name"),
        TableDefinition::new("issues", Issue::columns(), fetch_issues)
            .with_filters(IssuesFilter)
            .with_sort("created_at", "created")
            .with_sort("updated_at", "updated"),
        TableDefinition::new("issue_comments", IssueComment::columns(), fetch_issue_comments)
            .with_filters(IssueCommentsFilter)
            .with_sort("created_at", "created")
            .with_sort("updated_at", "updated"),
        TableDefinition::new("pulls", Pull::columns(), fetch_pulls)
            .with_filters(PullsFilter)
            .with_sort("created_at", "created")
            .with_sort("updated_at", "updated"),
        TableDefinition::new("pull_commits", PullCommit::columns(), fetch_pull_commits)
            .with_filters(PullScopedFilter),
        TableDefinition::new("reviews", Review::columns(), fetch_reviews)
            .with_filters(PullScopedFilter),
        TableDefinition::new("workflows", Workflow::columns(), fetch_workflows)
            .with_filters(RepoFilter),
        TableDefinition::new("runs", WorkflowRun::columns(), fetch_runs).with_filters(RunsFilter),
        TableDefinition::new("jobs", Job::columns(), fetch_jobs).with_filters(RunScopedFilter),
        TableDefinition::new("steps", Step::columns(), fetch_steps).with_filters(StepsFilter),
        TableDefinition::new("artifacts", Artifact::columns(), fetch_artifacts)
            .with_filters(RunScopedFilter),
    ]
}
