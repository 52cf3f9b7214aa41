//! Dynamic filters: constraints discovered while the query is already running
//! (e.g. the build side of a join), offered to split generation.
//!
//! Waiting is best-effort. Split generation waits at most
//! [`DYNAMIC_FILTER_TIMEOUT`] for the filter to complete and then proceeds
//! with whatever constraint is known at that point.

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::Constraint;

pub const DYNAMIC_FILTER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
struct FilterState {
    constraint: Constraint,
    complete: bool,
}

/// Producer side, held by whatever discovers the constraint.
#[derive(Debug)]
pub struct DynamicFilterSender {
    tx: watch::Sender<FilterState>,
}

/// Consumer side, handed to split generation.
#[derive(Debug, Clone)]
pub struct DynamicFilter {
    rx: watch::Receiver<FilterState>,
}

/// A new, unconstrained and incomplete dynamic filter.
pub fn dynamic_filter() -> (DynamicFilterSender, DynamicFilter) {
    let (tx, rx) = watch::channel(FilterState {
        constraint: Constraint::all(),
        complete: false,
    });
    (DynamicFilterSender { tx }, DynamicFilter { rx })
}

impl DynamicFilterSender {
    /// Publish a partial constraint; waiters keep waiting.
    pub fn update(&self, constraint: Constraint) {
        self.tx.send_replace(FilterState {
            constraint,
            complete: false,
        });
    }

    /// Publish the final constraint and release waiters.
    pub fn complete(&self, constraint: Constraint) {
        self.tx.send_replace(FilterState {
            constraint,
            complete: true,
        });
    }
}

impl DynamicFilter {
    /// A filter that is already complete and constrains nothing.
    pub fn empty() -> Self {
        let (tx, rx) = watch::channel(FilterState {
            constraint: Constraint::all(),
            complete: true,
        });
        drop(tx);
        Self { rx }
    }

    pub fn current(&self) -> Constraint {
        self.rx.borrow().constraint.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.rx.borrow().complete
    }

    /// Wait up to `timeout` for completion, then return the latest constraint.
    pub async fn wait(&self, timeout: Duration) -> Constraint {
        let mut rx = self.rx.clone();
        let reason = match tokio::time::timeout(timeout, rx.wait_for(|s| s.complete)).await {
            Ok(Ok(state)) => return state.constraint.clone(),
            Ok(Err(_)) => "producer dropped",
            Err(_) => "timed out",
        };
        debug!("dynamic filter {}, using current constraint", reason);
        let constraint = rx.borrow().constraint.clone();
        constraint
    }
}
