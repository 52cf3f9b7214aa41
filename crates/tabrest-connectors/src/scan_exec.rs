//! Lazy execution node fetching one split.
//!
//! `RestScanExec` is a leaf `ExecutionPlan` with a single partition. The REST
//! calls for its split are deferred until the returned stream is polled, so
//! the node can be planned on one process and executed on another.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, RecordBatch, RecordBatchOptions,
    StringArray, TimestampMillisecondArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchStreamAdapter;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties,
    SendableRecordBatchStream,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::Rest;
use crate::handle::Split;
use crate::value::{ColumnSchema, ColumnType, Row, Value};

// ---------------------------------------------------------------------------
// RestScanExec
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RestScanExec {
    rest: Arc<dyn Rest>,
    split: Split,
    /// Full column list of the table, in row order.
    columns: Vec<ColumnSchema>,
    projection: Option<Vec<usize>>,
    schema: SchemaRef,
    properties: PlanProperties,
}

impl RestScanExec {
    pub fn try_new(
        rest: Arc<dyn Rest>,
        split: Split,
        projection: Option<Vec<usize>>,
    ) -> DFResult<Self> {
        let columns = rest.get_table_metadata(split.table_handle.schema_table_name())?;
        let full = Schema::new(columns.iter().map(ColumnSchema::to_field).collect::<Vec<Field>>());
        let schema = match &projection {
            Some(indices) => Arc::new(full.project(indices)?),
            None => Arc::new(full),
        };
        let properties = PlanProperties::new(
            EquivalenceProperties::new(Arc::clone(&schema)),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Final,
            Boundedness::Bounded,
        );
        Ok(Self {
            rest,
            split,
            columns,
            projection,
            schema,
            properties,
        })
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    pub fn projection(&self) -> Option<&[usize]> {
        self.projection.as_deref()
    }

    // -- Serialization -------------------------------------------------------

    /// Serialize the split and projection to JSON.
    pub fn serialize(&self) -> DFResult<Vec<u8>> {
        let dto = RestScanExecDto {
            split: self.split.clone(),
            projection: self.projection.clone(),
        };
        serde_json::to_vec(&dto).map_err(|e| DataFusionError::External(Box::new(e)))
    }

    /// Rebuild from JSON, resolving the connector by the split's schema name.
    pub fn deserialize(bytes: &[u8], connectors: &HashMap<String, Arc<dyn Rest>>) -> DFResult<Self> {
        let dto: RestScanExecDto =
            serde_json::from_slice(bytes).map_err(|e| DataFusionError::External(Box::new(e)))?;
        let schema_name = &dto.split.table_handle.schema_table_name().schema_name;
        let rest = connectors.get(schema_name).ok_or_else(|| {
            DataFusionError::Internal(format!("no REST connector registered for schema '{}'", schema_name))
        })?;
        Self::try_new(Arc::clone(rest), dto.split, dto.projection)
    }
}

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

impl ExecutionPlan for RestScanExec {
    fn name(&self) -> &str {
        "RestScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        if children.is_empty() {
            Ok(self)
        } else {
            Err(DataFusionError::Internal(
                "RestScanExec is a leaf node and cannot have children".to_string(),
            ))
        }
    }

    fn execute(
        &self,
        partition: usize,
        _context: Arc<TaskContext>,
    ) -> DFResult<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "RestScanExec only supports partition 0, got {}",
                partition
            )));
        }

        let rest = Arc::clone(&self.rest);
        let split = self.split.clone();
        let columns = self.columns.clone();
        let projection = self.projection.clone();
        let schema = Arc::clone(&self.schema);

        let stream = futures::stream::once(async move {
            let rows = rest.get_rows(&split).await?;
            debug!("RestScanExec: {} rows for {}", rows.len(), split.table_handle);
            let batch = rows_to_record_batch(&rows, &columns, projection.as_deref(), schema)?;
            Ok::<RecordBatch, DataFusionError>(batch)
        });

        Ok(Box::pin(RecordBatchStreamAdapter::new(
            Arc::clone(&self.schema),
            stream,
        )))
    }
}

// ---------------------------------------------------------------------------
// DisplayAs
// ---------------------------------------------------------------------------

impl DisplayAs for RestScanExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RestScanExec: {}", self.split.table_handle)
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

/// Convert rows into a batch of the projected columns.
///
/// `columns` describes the full row; `schema` must be its projection.
pub fn rows_to_record_batch(
    rows: &[Row],
    columns: &[ColumnSchema],
    projection: Option<&[usize]>,
    schema: SchemaRef,
) -> DFResult<RecordBatch> {
    let indices: Vec<usize> = match projection {
        Some(p) => p.to_vec(),
        None => (0..columns.len()).collect(),
    };

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(indices.len());
    for &i in &indices {
        let column = columns.get(i).ok_or_else(|| {
            DataFusionError::Internal(format!("projection index {} out of range", i))
        })?;
        let values = rows
            .iter()
            .map(|row| {
                row.get(i).ok_or_else(|| {
                    DataFusionError::Internal(format!(
                        "row has {} values, column '{}' is at {}",
                        row.len(),
                        column.name,
                        i
                    ))
                })
            })
            .collect::<DFResult<Vec<&Value>>>()?;
        arrays.push(build_array(&column.name, &column.column_type, &values)?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

fn mismatch(column: &str, expected: &ColumnType, got: &Value) -> DataFusionError {
    DataFusionError::Internal(format!(
        "column '{}' expects {:?}, got {:?}",
        column, expected, got
    ))
}

fn build_array(column: &str, column_type: &ColumnType, values: &[&Value]) -> DFResult<ArrayRef> {
    let array: ArrayRef = match column_type {
        ColumnType::Boolean => {
            let v = values
                .iter()
                .map(|v| match v {
                    Value::Boolean(b) => Ok(Some(*b)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(column, column_type, other)),
                })
                .collect::<DFResult<Vec<Option<bool>>>>()?;
            Arc::new(BooleanArray::from(v))
        }
        ColumnType::BigInt => {
            let v = values
                .iter()
                .map(|v| match v {
                    Value::BigInt(i) => Ok(Some(*i)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(column, column_type, other)),
                })
                .collect::<DFResult<Vec<Option<i64>>>>()?;
            Arc::new(Int64Array::from(v))
        }
        ColumnType::Double => {
            let v = values
                .iter()
                .map(|v| match v {
                    Value::Double(d) => Ok(Some(*d)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(column, column_type, other)),
                })
                .collect::<DFResult<Vec<Option<f64>>>>()?;
            Arc::new(Float64Array::from(v))
        }
        ColumnType::Varchar => {
            let v = values
                .iter()
                .map(|v| match v {
                    Value::Varchar(s) => Ok(Some(s.as_str())),
                    Value::Null => Ok(None),
                    other => Err(mismatch(column, column_type, other)),
                })
                .collect::<DFResult<Vec<Option<&str>>>>()?;
            Arc::new(StringArray::from(v))
        }
        ColumnType::Timestamp => {
            let v = values
                .iter()
                .map(|v| match v {
                    Value::Timestamp(t) => Ok(Some(*t)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(column, column_type, other)),
                })
                .collect::<DFResult<Vec<Option<i64>>>>()?;
            Arc::new(TimestampMillisecondArray::from(v).with_timezone("UTC"))
        }
        ColumnType::Array(element) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut valid = Vec::with_capacity(values.len());
            let mut items: Vec<&Value> = Vec::new();
            for v in values {
                match v {
                    Value::Array(elements) => {
                        lengths.push(elements.len());
                        valid.push(true);
                        items.extend(elements.iter());
                    }
                    Value::Null => {
                        lengths.push(0);
                        valid.push(false);
                    }
                    other => return Err(mismatch(column, column_type, other)),
                }
            }
            let child = build_array(column, element, &items)?;
            let field = Arc::new(Field::new("item", element.to_arrow(), true));
            Arc::new(ListArray::try_new(
                field,
                OffsetBuffer::from_lengths(lengths),
                child,
                Some(NullBuffer::from(valid)),
            )?)
        }
    };
    Ok(array)
}

// ---------------------------------------------------------------------------
// Serialization DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct RestScanExecDto {
    split: Split,
    projection: Option<Vec<usize>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{DataType, Int64Type, TimeUnit};

    fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::required("id", ColumnType::BigInt),
            ColumnSchema::nullable("title", ColumnType::Varchar),
            ColumnSchema::nullable("created_at", ColumnType::Timestamp),
            ColumnSchema::required("label_ids", ColumnType::array_of(ColumnType::BigInt)),
            ColumnSchema::nullable("draft", ColumnType::Boolean),
            ColumnSchema::nullable("score", ColumnType::Double),
        ]
    }

    fn full_schema() -> SchemaRef {
        Arc::new(Schema::new(
            columns().iter().map(ColumnSchema::to_field).collect::<Vec<_>>(),
        ))
    }

    fn rows() -> Vec<Row> {
        vec![
            vec![
                Value::BigInt(1),
                Value::from("first"),
                Value::Timestamp(1_700_000_000_000),
                Value::array([10i64, 11]),
                Value::Boolean(false),
                Value::Double(0.5),
            ],
            vec![
                Value::BigInt(2),
                Value::Null,
                Value::Null,
                Value::Array(vec![]),
                Value::Null,
                Value::Null,
            ],
        ]
    }

    #[test]
    fn test_rows_to_record_batch_all_types() {
        let batch = rows_to_record_batch(&rows(), &columns(), None, full_schema()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 6);

        let ids = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(ids.value(1), 2);
        let titles = batch.column(1).as_string::<i32>();
        assert_eq!(titles.value(0), "first");
        assert!(titles.is_null(1));
        assert_eq!(
            batch.column(2).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
        );

        let labels = batch.column(3).as_list::<i32>();
        assert_eq!(labels.value_length(0), 2);
        assert_eq!(labels.value_length(1), 0);
        assert!(!labels.is_null(1));
    }

    #[test]
    fn test_rows_to_record_batch_projection() {
        let schema = Arc::new(full_schema().project(&[3, 0]).unwrap());
        let batch = rows_to_record_batch(&rows(), &columns(), Some(&[3, 0]), schema).unwrap();
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(1).name(), "id");
    }

    #[test]
    fn test_rows_to_record_batch_empty_projection_keeps_row_count() {
        let schema = Arc::new(full_schema().project(&[]).unwrap());
        let batch = rows_to_record_batch(&rows(), &columns(), Some(&[]), schema).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn test_rows_to_record_batch_rejects_type_mismatch() {
        let mut bad = rows();
        bad[0][0] = Value::from("not a number");
        let err = rows_to_record_batch(&bad, &columns(), None, full_schema()).unwrap_err();
        assert!(err.to_string().contains("column 'id'"));
    }

    #[test]
    fn test_rows_to_record_batch_rejects_null_in_required_column() {
        let mut bad = rows();
        bad[1][0] = Value::Null;
        assert!(rows_to_record_batch(&bad, &columns(), None, full_schema()).is_err());
    }

    #[test]
    fn test_rows_to_record_batch_no_rows() {
        let batch = rows_to_record_batch(&[], &columns(), None, full_schema()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 6);
    }
}
