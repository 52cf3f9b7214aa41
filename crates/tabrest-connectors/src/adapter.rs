//! Resource adapter: the engine-facing facade over one REST backend.
//!
//! A backend registers its tables once, at construction, as
//! [`TableDefinition`]s (columns, fetch function, filter applier, supported
//! sort keys). Every engine call is then a registry lookup followed by a pure
//! handle transformation or a fetch; the adapter holds no mutable state.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::config::RestConfig;
use crate::domain::{Constraint, Domain};
use crate::dynamic::{DynamicFilter, DYNAMIC_FILTER_TIMEOUT};
use crate::error::{RestError, RestResult};
use crate::filter::{expand_equal_constraints, FilterApplication, FilterApplier, FilterKind};
use crate::handle::{ColumnHandle, SchemaTableName, SortDirection, SortItem, Split, TableHandle};
use crate::pagination::PageWindow;
use crate::value::{ColumnSchema, Row, Value};

/// Per-table fetch entry point. Receives the backend and a fully resolved request.
pub type FetchFn<B> = for<'a> fn(&'a B, &'a FetchRequest) -> BoxFuture<'a, RestResult<Vec<Row>>>;

/// Sort key as the backend spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteSort {
    pub key: &'static str,
    pub direction: SortDirection,
}

/// Everything a fetch function needs for one split.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub handle: TableHandle,
    /// Requested sort, or the table's default; `None` if the table has no sort keys.
    pub sort: Option<RemoteSort>,
    /// Row position and domain of every `Equal` column the adapter enforces.
    pub enforced: Vec<(usize, Domain)>,
}

impl FetchRequest {
    pub fn constraint(&self) -> &Constraint {
        self.handle.constraint()
    }

    pub fn limit(&self) -> u64 {
        self.handle.limit()
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::from_handle(&self.handle)
    }

    /// Whether `row` satisfies every enforced column.
    ///
    /// Fetch functions filter mapped rows with this before they count
    /// toward the limit, for columns their query parameters cannot narrow
    /// exactly (e.g. a status filter also matching conclusions).
    pub fn accepts(&self, row: &[Value]) -> bool {
        self.enforced.iter().all(|(i, domain)| {
            row.get(*i)
                .and_then(Value::as_literal)
                .is_some_and(|l| domain.includes(&l))
        })
    }
}

/// A sort the table accepts for top-N pushdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedSort {
    pub item: SortItem,
    pub remote_key: &'static str,
}

/// Registry entry describing one table of a backend.
pub struct TableDefinition<B> {
    pub name: &'static str,
    pub columns: Vec<ColumnSchema>,
    pub fetch: FetchFn<B>,
    pub filter_applier: Option<Arc<dyn FilterApplier>>,
    /// First entry is the default sort.
    pub supported_sort: Vec<SupportedSort>,
}

impl<B> TableDefinition<B> {
    pub fn new(name: &'static str, columns: Vec<ColumnSchema>, fetch: FetchFn<B>) -> Self {
        Self {
            name,
            columns,
            fetch,
            filter_applier: None,
            supported_sort: vec![],
        }
    }

    pub fn with_filters(mut self, applier: impl FilterApplier + 'static) -> Self {
        self.filter_applier = Some(Arc::new(applier));
        self
    }

    /// Accept `local` in both directions, descending first.
    pub fn with_sort(mut self, local: &str, remote_key: &'static str) -> Self {
        for item in [SortItem::desc(local), SortItem::asc(local)] {
            self.supported_sort.push(SupportedSort { item, remote_key });
        }
        self
    }

    pub fn column_handles(&self) -> Vec<ColumnHandle> {
        self.columns
            .iter()
            .map(|c| ColumnHandle::new(c.name.clone(), c.column_type.clone()))
            .collect()
    }

    fn remote_sort(&self, item: &SortItem) -> Option<RemoteSort> {
        self.supported_sort
            .iter()
            .find(|s| &s.item == item)
            .map(|s| RemoteSort {
                key: s.remote_key,
                direction: s.item.direction,
            })
    }

    /// Row checks for the `Equal` columns bound in `constraint`.
    ///
    /// A bound column the table does not declare is an
    /// [`RestError::UnknownColumn`].
    fn enforced_checks(&self, constraint: &Constraint) -> RestResult<Vec<(usize, Domain)>> {
        let Some(applier) = &self.filter_applier else {
            return Ok(vec![]);
        };
        constraint
            .column_domains()
            .iter()
            .filter(|cd| applier.filter_kind(&cd.column.name) == FilterKind::Equal)
            .map(|cd| {
                self.columns
                    .iter()
                    .position(|c| c.name == cd.column.name)
                    .map(|i| (i, cd.domain.clone()))
                    .ok_or_else(|| {
                        RestError::UnknownColumn(format!("{}.{}", self.name, cd.column.name))
                    })
            })
            .collect()
    }

    fn default_sort(&self) -> Option<RemoteSort> {
        self.supported_sort.first().map(|s| RemoteSort {
            key: s.remote_key,
            direction: s.item.direction,
        })
    }
}

impl<B> fmt::Debug for TableDefinition<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDefinition")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("filters", &self.filter_applier.is_some())
            .field("supported_sort", &self.supported_sort)
            .finish()
    }
}

/// Engine-facing operations of a REST connector.
#[async_trait]
pub trait Rest: Send + Sync + fmt::Debug {
    /// The single schema this connector serves.
    fn schema_name(&self) -> &str;

    fn list_schemas(&self) -> Vec<String> {
        vec![self.schema_name().to_string()]
    }

    /// Tables of `schema`, or of every schema when `None`.
    fn list_tables(&self, schema: Option<&str>) -> Vec<SchemaTableName>;

    /// Ordered column schema of a table.
    fn get_table_metadata(&self, table: &SchemaTableName) -> RestResult<Vec<ColumnSchema>>;

    fn get_columns(&self, handle: &TableHandle) -> RestResult<Vec<ColumnHandle>>;

    /// An unconstrained handle, `None` when the table does not exist.
    fn get_table_handle(&self, table: &SchemaTableName) -> Option<TableHandle>;

    /// Lower the handle's limit. Partial pushdown: the engine still enforces it.
    fn apply_limit(&self, handle: &TableHandle, limit: u64) -> Option<TableHandle>;

    /// Push a sort + limit. Only the first sort item is considered.
    fn apply_top_n(
        &self,
        handle: &TableHandle,
        n: u64,
        sort_items: &[SortItem],
    ) -> RestResult<Option<TableHandle>>;

    fn apply_filter(
        &self,
        handle: &TableHandle,
        constraint: &Constraint,
    ) -> RestResult<Option<FilterApplication>>;

    /// Splits for `handle`, first narrowing it by `dynamic_filter` (waiting
    /// at most [`DYNAMIC_FILTER_TIMEOUT`] for it) when one is given.
    ///
    /// The DataFusion binding always passes `None`: DataFusion 44 hands a
    /// `TableProvider` no runtime filter at scan time, so the wait only
    /// happens for callers driving this trait directly.
    async fn get_splits(
        &self,
        handle: &TableHandle,
        dynamic_filter: Option<&DynamicFilter>,
    ) -> RestResult<Vec<Split>>;

    async fn get_rows(&self, split: &Split) -> RestResult<Vec<Row>>;

    /// Writes are not supported; always fails.
    fn create_row_sink(&self, table: &SchemaTableName) -> RestResult<Infallible> {
        Err(RestError::UnsupportedWrite {
            table: table.to_string(),
        })
    }
}

/// Registry-driven [`Rest`] implementation over a backend `B`.
pub struct RestAdapter<B> {
    schema_name: String,
    backend: B,
    tables: BTreeMap<&'static str, TableDefinition<B>>,
    config: RestConfig,
}

impl<B: Send + Sync + 'static> RestAdapter<B> {
    pub fn new(
        schema_name: impl Into<String>,
        backend: B,
        tables: Vec<TableDefinition<B>>,
        config: RestConfig,
    ) -> Self {
        let schema_name = schema_name.into();
        let tables: BTreeMap<&'static str, TableDefinition<B>> =
            tables.into_iter().map(|t| (t.name, t)).collect();
        info!(
            "Created REST adapter '{}' with {} tables",
            schema_name,
            tables.len()
        );
        Self {
            schema_name,
            backend,
            tables,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn table(&self, name: &str) -> RestResult<&TableDefinition<B>> {
        self.tables
            .get(name)
            .ok_or_else(|| RestError::UnknownTable(name.to_string()))
    }

    fn table_for(&self, table: &SchemaTableName) -> RestResult<&TableDefinition<B>> {
        if table.schema_name != self.schema_name {
            return Err(RestError::UnknownTable(table.to_string()));
        }
        self.table(&table.table_name)
    }

    /// Expand a handle into fully resolved split handles.
    fn split_handles(&self, handle: &TableHandle) -> RestResult<Vec<TableHandle>> {
        let table = self.table_for(handle.schema_table_name())?;
        let handles = match &table.filter_applier {
            Some(applier) => expand_equal_constraints(handle, applier.supported_filters()),
            None if handle.constraint().is_none() => vec![],
            None => vec![handle.clone()],
        };

        let windows = self.config.splits_for(table.name);
        if windows <= 1 {
            return Ok(handles);
        }
        Ok(handles
            .iter()
            .flat_map(|h| (0..windows).map(move |k| h.with_page_window(k, windows)))
            .collect())
    }
}

impl<B> fmt::Debug for RestAdapter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestAdapter")
            .field("schema_name", &self.schema_name)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: Send + Sync + 'static> Rest for RestAdapter<B> {
    fn schema_name(&self) -> &str {
        &self.schema_name
    }

    fn list_tables(&self, schema: Option<&str>) -> Vec<SchemaTableName> {
        if schema.is_some_and(|s| s != self.schema_name) {
            return vec![];
        }
        self.tables
            .keys()
            .map(|name| SchemaTableName::new(self.schema_name.clone(), *name))
            .collect()
    }

    fn get_table_metadata(&self, table: &SchemaTableName) -> RestResult<Vec<ColumnSchema>> {
        Ok(self.table_for(table)?.columns.clone())
    }

    fn get_columns(&self, handle: &TableHandle) -> RestResult<Vec<ColumnHandle>> {
        Ok(self.table_for(handle.schema_table_name())?.column_handles())
    }

    fn get_table_handle(&self, table: &SchemaTableName) -> Option<TableHandle> {
        self.table_for(table)
            .ok()
            .map(|_| TableHandle::new(table.clone()))
    }

    fn apply_limit(&self, handle: &TableHandle, limit: u64) -> Option<TableHandle> {
        if limit >= handle.limit() {
            return None;
        }
        debug!("pushed limit {} into {}", limit, handle.schema_table_name());
        Some(handle.with_limit(limit))
    }

    fn apply_top_n(
        &self,
        handle: &TableHandle,
        n: u64,
        sort_items: &[SortItem],
    ) -> RestResult<Option<TableHandle>> {
        let Some(first) = sort_items.first() else {
            return Ok(None);
        };
        let table = self.table_for(handle.schema_table_name())?;
        if table.remote_sort(first).is_none() {
            return Err(RestError::InvalidOrderBy {
                requested: first.to_string(),
                supported: table
                    .supported_sort
                    .iter()
                    .map(|s| s.item.to_string())
                    .collect(),
            });
        }

        let updated = handle
            .with_sort_order(vec![first.clone()])
            .with_limit(n.min(handle.limit()));
        if &updated == handle {
            return Ok(None);
        }
        debug!("pushed top-{} by {} into {}", n, first, handle.schema_table_name());
        Ok(Some(updated))
    }

    fn apply_filter(
        &self,
        handle: &TableHandle,
        constraint: &Constraint,
    ) -> RestResult<Option<FilterApplication>> {
        let table = self.table_for(handle.schema_table_name())?;
        let Some(applier) = &table.filter_applier else {
            return Ok(None);
        };
        Ok(applier.apply_filter(handle, &table.column_handles(), constraint))
    }

    async fn get_splits(
        &self,
        handle: &TableHandle,
        dynamic_filter: Option<&DynamicFilter>,
    ) -> RestResult<Vec<Split>> {
        let mut handle = handle.clone();
        if let Some(filter) = dynamic_filter {
            let discovered = filter.wait(DYNAMIC_FILTER_TIMEOUT).await;
            if let Some(applied) = self.apply_filter(&handle, &discovered)? {
                handle = applied.handle;
            }
        }

        let splits: Vec<Split> = self
            .split_handles(&handle)?
            .into_iter()
            .map(Split::new)
            .collect();
        info!("Generated {} splits for {}", splits.len(), handle);
        Ok(splits)
    }

    async fn get_rows(&self, split: &Split) -> RestResult<Vec<Row>> {
        let handle = &split.table_handle;
        let table = self.table_for(handle.schema_table_name())?;
        if handle.limit() == 0 || handle.constraint().is_none() {
            debug!("{} cannot produce rows, skipping fetch", handle);
            return Ok(vec![]);
        }

        let sort = handle
            .sort_order()
            .and_then(|items| items.first())
            .and_then(|item| table.remote_sort(item))
            .or_else(|| table.default_sort());
        let request = FetchRequest {
            handle: handle.clone(),
            sort,
            enforced: table.enforced_checks(handle.constraint())?,
        };
        let mut rows = (table.fetch)(&self.backend, &request).await?;
        let fetched = rows.len();
        rows.retain(|row| request.accepts(row));
        debug!("Fetched {} rows for {} ({} kept)", fetched, handle, rows.len());
        Ok(rows)
    }
}
