//! Per-table filter pushdown and split expansion.
//!
//! A [`FilterApplier`] declares which columns a table can push into its REST
//! calls and how:
//! - `Equal` columns must be bound to a finite set of values. The adapter
//!   enforces them completely (path segment, query parameter, or a row check)
//!   and a multi-valued set is exploded into one split per value.
//! - `Range` columns are pushed as a lower bound (e.g. `since`) and remain
//!   for the engine to re-check.

use tracing::debug;

use crate::domain::{Constraint, Domain, Literal};
use crate::error::{RestError, RestResult};
use crate::handle::{ColumnHandle, TableHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Equal,
    Range,
    Unsupported,
}

/// Result of pushing a constraint into a handle.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterApplication {
    /// Handle carrying the accepted part of the constraint.
    pub handle: TableHandle,
    /// Entries the engine still has to evaluate itself.
    pub remaining: Constraint,
}

impl FilterApplication {
    /// Whether the engine must still re-check `column`.
    pub fn needs_recheck(&self, column: &str) -> bool {
        self.remaining.domain(column).is_some()
    }
}

pub trait FilterApplier: Send + Sync {
    /// Columns this table can push down, with their kind.
    fn supported_filters(&self) -> &[(&'static str, FilterKind)];

    fn filter_kind(&self, column: &str) -> FilterKind {
        self.supported_filters()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
            .unwrap_or(FilterKind::Unsupported)
    }

    /// The single value bound to a supported column, `None` if unbound or multi-valued.
    fn get_filter(&self, column: &str, constraint: &Constraint) -> Option<Literal> {
        if self.filter_kind(column) == FilterKind::Unsupported {
            return None;
        }
        constraint
            .domain(column)
            .and_then(|d| d.single_value())
            .cloned()
    }

    /// String value for a column needed to build the request path.
    fn require_string(&self, column: &str, constraint: &Constraint) -> RestResult<String> {
        self.get_filter(column, constraint)
            .and_then(|l| l.as_str().map(str::to_string))
            .ok_or_else(|| RestError::missing_constraint(column))
    }

    /// Integer value for a column needed to build the request path.
    fn require_i64(&self, column: &str, constraint: &Constraint) -> RestResult<i64> {
        self.optional_i64(column, constraint)
            .ok_or_else(|| RestError::missing_constraint(column))
    }

    fn optional_string(&self, column: &str, constraint: &Constraint) -> Option<String> {
        self.get_filter(column, constraint)
            .and_then(|l| l.as_str().map(str::to_string))
    }

    fn optional_i64(&self, column: &str, constraint: &Constraint) -> Option<i64> {
        self.get_filter(column, constraint).and_then(|l| l.as_i64())
    }

    fn apply_filter(
        &self,
        handle: &TableHandle,
        columns: &[ColumnHandle],
        constraint: &Constraint,
    ) -> Option<FilterApplication> {
        apply_filter(handle, columns, self.supported_filters(), constraint)
    }
}

fn kind_of(supported: &[(&'static str, FilterKind)], column: &str) -> FilterKind {
    supported
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, kind)| *kind)
        .unwrap_or(FilterKind::Unsupported)
}

/// Push the supported part of `constraint` into `handle`.
///
/// Returns `None` when there is nothing to push or the handle would not change.
pub fn apply_filter(
    handle: &TableHandle,
    columns: &[ColumnHandle],
    supported: &[(&'static str, FilterKind)],
    constraint: &Constraint,
) -> Option<FilterApplication> {
    if constraint.is_all() {
        return None;
    }

    let accepts = |column: &ColumnHandle, domain: &Domain| -> Option<FilterKind> {
        if !columns.contains(column) {
            return None;
        }
        match kind_of(supported, &column.name) {
            FilterKind::Equal if domain.discrete_values().is_some() => Some(FilterKind::Equal),
            FilterKind::Range => Some(FilterKind::Range),
            _ => None,
        }
    };

    let accepted = constraint.filter(|cd| accepts(&cd.column, &cd.domain).is_some());
    let remaining =
        constraint.filter(|cd| accepts(&cd.column, &cd.domain) != Some(FilterKind::Equal));

    let merged = handle.constraint().intersect(&accepted);
    if &merged == handle.constraint() {
        return None;
    }
    debug!(
        "pushed {} of {} filter columns into {}",
        accepted.column_domains().len(),
        constraint.column_domains().len(),
        handle.schema_table_name()
    );
    Some(FilterApplication {
        handle: handle.with_constraint(merged),
        remaining,
    })
}

/// Explode multi-valued `Equal` columns into one handle per combination.
///
/// Produces the cartesian product over all such columns; every other
/// constraint entry is carried unchanged. Without any such column the handle
/// is returned alone. A constraint no value can satisfy yields no handles.
pub fn expand_equal_constraints(
    handle: &TableHandle,
    supported: &[(&'static str, FilterKind)],
) -> Vec<TableHandle> {
    let constraint = handle.constraint();
    if constraint.is_none() {
        return vec![];
    }

    let exploded: Vec<(ColumnHandle, Vec<Literal>)> = constraint
        .column_domains()
        .iter()
        .filter(|cd| kind_of(supported, &cd.column.name) == FilterKind::Equal)
        .filter_map(|cd| {
            cd.domain
                .discrete_values()
                .filter(|values| values.len() > 1)
                .map(|values| (cd.column.clone(), values))
        })
        .collect();

    if exploded.is_empty() {
        return vec![handle.clone()];
    }

    exploded
        .iter()
        .fold(vec![constraint.clone()], |combinations, (column, values)| {
            combinations
                .iter()
                .flat_map(|c| {
                    values
                        .iter()
                        .map(move |v| c.with_domain(column.clone(), Domain::single(v.clone())))
                })
                .collect()
        })
        .into_iter()
        .map(|c| handle.with_constraint(c))
        .collect()
}
