//! DataFusion catalog binding for REST connectors.
//!
//! A [`RestSchemaProvider`] exposes every table of one connector as a schema;
//! each table is a [`RestTable`] whose scan plans one [`RestScanExec`] per
//! split.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use async_trait::async_trait;
use datafusion::catalog::{SchemaProvider, Session};
use datafusion::datasource::TableProvider;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::logical_expr::dml::InsertOp;
use datafusion::logical_expr::{Expr, TableProviderFilterPushDown, TableType};
use datafusion::physical_plan::empty::EmptyExec;
use datafusion::physical_plan::union::UnionExec;
use datafusion::physical_plan::ExecutionPlan;
use datafusion::prelude::SessionContext;
use tracing::{debug, info};

use crate::adapter::Rest;
use crate::domain::Constraint;
use crate::expr::{expr_to_constraint, referenced_columns};
use crate::handle::{ColumnHandle, SchemaTableName, TableHandle};
use crate::scan_exec::RestScanExec;
use crate::value::ColumnSchema;

// ---------------------------------------------------------------------------
// RestSchemaProvider
// ---------------------------------------------------------------------------

pub struct RestSchemaProvider {
    rest: Arc<dyn Rest>,
}

impl RestSchemaProvider {
    pub fn new(rest: Arc<dyn Rest>) -> Self {
        Self { rest }
    }
}

impl fmt::Debug for RestSchemaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestSchemaProvider")
            .field("schema", &self.rest.schema_name())
            .finish()
    }
}

#[async_trait]
impl SchemaProvider for RestSchemaProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn table_names(&self) -> Vec<String> {
        self.rest
            .list_tables(Some(self.rest.schema_name()))
            .into_iter()
            .map(|t| t.table_name)
            .collect()
    }

    async fn table(&self, name: &str) -> DFResult<Option<Arc<dyn TableProvider>>> {
        let table = SchemaTableName::new(self.rest.schema_name(), name);
        match self.rest.get_table_handle(&table) {
            Some(handle) => Ok(Some(Arc::new(RestTable::try_new(
                Arc::clone(&self.rest),
                handle,
            )?))),
            None => Ok(None),
        }
    }

    fn table_exist(&self, name: &str) -> bool {
        let table = SchemaTableName::new(self.rest.schema_name(), name);
        self.rest.get_table_handle(&table).is_some()
    }
}

/// Register `rest` as a schema of the context's default catalog.
pub fn register_rest_schema(ctx: &SessionContext, rest: Arc<dyn Rest>) -> DFResult<()> {
    let catalog_name = ctx
        .state()
        .config()
        .options()
        .catalog
        .default_catalog
        .clone();
    let catalog = ctx.catalog(&catalog_name).ok_or_else(|| {
        DataFusionError::Plan(format!("default catalog '{}' not found", catalog_name))
    })?;
    let schema_name = rest.schema_name().to_string();
    catalog.register_schema(&schema_name, Arc::new(RestSchemaProvider::new(rest)))?;
    info!("Registered REST schema '{}' in catalog '{}'", schema_name, catalog_name);
    Ok(())
}

// ---------------------------------------------------------------------------
// RestTable
// ---------------------------------------------------------------------------

/// One REST table as a DataFusion [`TableProvider`].
///
/// Filters and limits reach the adapter through `scan`; splits are planned
/// without a dynamic filter (see [`Rest::get_splits`]).
pub struct RestTable {
    rest: Arc<dyn Rest>,
    handle: TableHandle,
    columns: Vec<ColumnHandle>,
    schema: SchemaRef,
}

impl fmt::Debug for RestTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTable")
            .field("handle", &self.handle)
            .finish()
    }
}

impl RestTable {
    pub fn try_new(rest: Arc<dyn Rest>, handle: TableHandle) -> DFResult<Self> {
        let metadata = rest.get_table_metadata(handle.schema_table_name())?;
        let columns = rest.get_columns(&handle)?;
        let schema = Arc::new(Schema::new(
            metadata.iter().map(ColumnSchema::to_field).collect::<Vec<Field>>(),
        ));
        Ok(Self {
            rest,
            handle,
            columns,
            schema,
        })
    }

    pub fn handle(&self) -> &TableHandle {
        &self.handle
    }

    fn classify(&self, filter: &Expr) -> DFResult<TableProviderFilterPushDown> {
        let Some(constraint) = expr_to_constraint(filter, &self.columns) else {
            return Ok(TableProviderFilterPushDown::Unsupported);
        };
        let Some(applied) = self.rest.apply_filter(&self.handle, &constraint)? else {
            return Ok(TableProviderFilterPushDown::Unsupported);
        };
        let exact = referenced_columns(filter)
            .iter()
            .all(|c| !applied.needs_recheck(c));
        Ok(if exact {
            TableProviderFilterPushDown::Exact
        } else {
            TableProviderFilterPushDown::Inexact
        })
    }

    /// Push filters and limit into the handle, in that order.
    pub fn plan_handle(&self, filters: &[Expr], limit: Option<usize>) -> DFResult<TableHandle> {
        let constraint = filters
            .iter()
            .filter_map(|f| expr_to_constraint(f, &self.columns))
            .fold(Constraint::all(), |acc, c| acc.intersect(&c));

        let mut handle = self.handle.clone();
        if let Some(applied) = self.rest.apply_filter(&handle, &constraint)? {
            handle = applied.handle;
        }
        if let Some(limit) = limit {
            if let Some(limited) = self.rest.apply_limit(&handle, limit as u64) {
                handle = limited;
            }
        }
        Ok(handle)
    }
}

#[async_trait]
impl TableProvider for RestTable {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DFResult<Vec<TableProviderFilterPushDown>> {
        filters.iter().map(|f| self.classify(f)).collect()
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        let handle = self.plan_handle(filters, limit)?;
        let splits = self.rest.get_splits(&handle, None).await?;
        debug!("Planning {} splits for {}", splits.len(), handle);

        let mut plans: Vec<Arc<dyn ExecutionPlan>> = Vec::with_capacity(splits.len());
        for split in splits {
            plans.push(Arc::new(RestScanExec::try_new(
                Arc::clone(&self.rest),
                split,
                projection.cloned(),
            )?));
        }

        match plans.len() {
            0 => {
                let schema = match projection {
                    Some(indices) => Arc::new(self.schema.project(indices)?),
                    None => Arc::clone(&self.schema),
                };
                Ok(Arc::new(EmptyExec::new(schema)))
            }
            1 => Ok(plans.remove(0)),
            _ => Ok(Arc::new(UnionExec::new(plans))),
        }
    }

    async fn insert_into(
        &self,
        _state: &dyn Session,
        _input: Arc<dyn ExecutionPlan>,
        _insert_op: InsertOp,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        match self.rest.create_row_sink(self.handle.schema_table_name()) {
            Ok(never) => match never {},
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
