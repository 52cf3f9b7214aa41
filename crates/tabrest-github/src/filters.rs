//! Pushdown declarations for every GitHub table.

use chrono::{DateTime, SecondsFormat};
use tabrest_connectors::{Constraint, FilterApplier, FilterKind, Literal};

use FilterKind::{Equal, Range};

/// Tables scoped to one owner.
pub struct OwnerFilter;

impl FilterApplier for OwnerFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal)]
    }
}

/// Tables scoped to one repository with nothing else to push.
pub struct RepoFilter;

impl FilterApplier for RepoFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal)]
    }
}

pub struct IssuesFilter;

impl FilterApplier for IssuesFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[
            ("owner", Equal),
            ("repo", Equal),
            ("state", Equal),
            ("updated_at", Range),
        ]
    }
}

pub struct IssueCommentsFilter;

impl FilterApplier for IssueCommentsFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal), ("updated_at", Range)]
    }
}

pub struct PullsFilter;

impl FilterApplier for PullsFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal), ("state", Equal)]
    }
}

/// Sub-resources of one pull request (commits, reviews).
pub struct PullScopedFilter;

impl FilterApplier for PullScopedFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal), ("pull_number", Equal)]
    }
}

pub struct RunsFilter;

impl FilterApplier for RunsFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal), ("status", Equal)]
    }
}

/// Tables listed per run, or across all runs when `run_id` is unbound.
pub struct RunScopedFilter;

impl FilterApplier for RunScopedFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[("owner", Equal), ("repo", Equal), ("run_id", Equal)]
    }
}

pub struct StepsFilter;

impl FilterApplier for StepsFilter {
    fn supported_filters(&self) -> &[(&'static str, FilterKind)] {
        &[
            ("owner", Equal),
            ("repo", Equal),
            ("run_id", Equal),
            ("job_id", Equal),
            ("conclusion", Equal),
        ]
    }
}

/// `since` parameter for the lower bound on `updated_at`, if any.
///
/// Truncated to whole seconds; the engine re-checks the exact bound.
pub fn updated_since(constraint: &Constraint) -> Option<String> {
    let Some(Literal::Timestamp(millis)) = constraint.domain("updated_at")?.lower_bound() else {
        return None;
    };
    DateTime::from_timestamp_millis(*millis).map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}
