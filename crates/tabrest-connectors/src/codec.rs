//! Physical plan codec for shipping REST scans between processes.
//!
//! ## Wire format
//!
//! A serialized [`RestScanExec`] is a single tag byte ([`REST_SCAN_TAG`])
//! followed by the JSON `{split, projection}` payload. Decoding looks up the
//! connector by the split's schema name, so every process that decodes plans
//! must register the same connectors.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::FunctionRegistry;
use datafusion::physical_plan::ExecutionPlan;
use datafusion_proto::physical_plan::PhysicalExtensionCodec;

use crate::adapter::Rest;
use crate::scan_exec::RestScanExec;

/// Tag byte identifying a [`RestScanExec`] payload.
pub const REST_SCAN_TAG: u8 = 0x52;

// ---------------------------------------------------------------------------
// RestPhysicalCodec
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RestPhysicalCodec {
    connectors: HashMap<String, Arc<dyn Rest>>,
}

impl Debug for RestPhysicalCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemas: Vec<&String> = self.connectors.keys().collect();
        schemas.sort();
        f.debug_struct("RestPhysicalCodec")
            .field("schemas", &schemas)
            .finish()
    }
}

impl RestPhysicalCodec {
    pub fn new(connectors: impl IntoIterator<Item = Arc<dyn Rest>>) -> Self {
        Self {
            connectors: connectors
                .into_iter()
                .map(|c| (c.schema_name().to_string(), c))
                .collect(),
        }
    }
}

impl PhysicalExtensionCodec for RestPhysicalCodec {
    fn try_decode(
        &self,
        buf: &[u8],
        _inputs: &[Arc<dyn ExecutionPlan>],
        _registry: &dyn FunctionRegistry,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        match buf.split_first() {
            Some((&REST_SCAN_TAG, payload)) => {
                Ok(Arc::new(RestScanExec::deserialize(payload, &self.connectors)?))
            }
            Some((tag, _)) => Err(DataFusionError::Internal(format!(
                "RestPhysicalCodec: unknown tag 0x{tag:02x}"
            ))),
            None => Err(DataFusionError::Internal(
                "RestPhysicalCodec: empty buffer".to_string(),
            )),
        }
    }

    fn try_encode(&self, node: Arc<dyn ExecutionPlan>, buf: &mut Vec<u8>) -> DFResult<()> {
        let Some(scan) = node.as_any().downcast_ref::<RestScanExec>() else {
            return Err(DataFusionError::Internal(format!(
                "RestPhysicalCodec cannot encode {}",
                node.name()
            )));
        };
        buf.push(REST_SCAN_TAG);
        buf.extend_from_slice(&scan.serialize()?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FetchRequest, RestAdapter, TableDefinition};
    use crate::config::RestConfig;
    use crate::domain::{Constraint, Domain, Literal};
    use crate::error::RestResult;
    use crate::handle::{ColumnHandle, SchemaTableName, SortItem, Split, TableHandle};
    use crate::value::{ColumnSchema, ColumnType, Row};
    use datafusion::physical_plan::empty::EmptyExec;
    use datafusion::prelude::SessionContext;
    use futures::future::BoxFuture;

    struct Nothing;

    fn fetch_nothing<'a>(
        _backend: &'a Nothing,
        _request: &'a FetchRequest,
    ) -> BoxFuture<'a, RestResult<Vec<Row>>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn connector() -> Arc<dyn Rest> {
        Arc::new(RestAdapter::new(
            "github",
            Nothing,
            vec![TableDefinition::new(
                "issues",
                vec![
                    ColumnSchema::required("owner", ColumnType::Varchar),
                    ColumnSchema::required("number", ColumnType::BigInt),
                ],
                fetch_nothing,
            )],
            RestConfig::default(),
        ))
    }

    fn split() -> Split {
        let constraint = Constraint::from_domains(vec![(
            ColumnHandle::new("owner", ColumnType::Varchar),
            Domain::single(Literal::Varchar("octo".into())),
        )]);
        Split::new(
            TableHandle::new(SchemaTableName::new("github", "issues"))
                .with_constraint(constraint)
                .with_limit(10)
                .with_page_window(1, 2)
                .with_sort_order(vec![SortItem::desc("created_at")]),
        )
    }

    #[test]
    fn test_roundtrip() {
        let codec = RestPhysicalCodec::new([connector()]);
        let exec = RestScanExec::try_new(connector(), split(), Some(vec![1])).unwrap();

        let mut buf = Vec::new();
        codec.try_encode(Arc::new(exec), &mut buf).unwrap();
        assert_eq!(buf[0], REST_SCAN_TAG);

        let ctx = SessionContext::new();
        let decoded = codec.try_decode(&buf, &[], &ctx).unwrap();
        let scan = decoded.as_any().downcast_ref::<RestScanExec>().unwrap();
        assert_eq!(scan.split(), &split());
        assert_eq!(scan.projection(), Some(&[1usize][..]));
        assert_eq!(scan.schema().field(0).name(), "number");
    }

    #[test]
    fn test_decode_unknown_schema_fails() {
        let exec = RestScanExec::try_new(connector(), split(), None).unwrap();
        let mut buf = Vec::new();
        RestPhysicalCodec::new([connector()])
            .try_encode(Arc::new(exec), &mut buf)
            .unwrap();

        let ctx = SessionContext::new();
        let err = RestPhysicalCodec::default()
            .try_decode(&buf, &[], &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("no REST connector registered for schema 'github'"));
    }

    #[test]
    fn test_rejects_foreign_payloads() {
        let codec = RestPhysicalCodec::new([connector()]);
        let ctx = SessionContext::new();
        assert!(codec.try_decode(&[], &[], &ctx).is_err());
        assert!(codec.try_decode(&[0x01, b'{', b'}'], &[], &ctx).is_err());

        let other = Arc::new(EmptyExec::new(Arc::new(arrow::datatypes::Schema::empty())));
        assert!(codec.try_encode(other, &mut Vec::new()).is_err());
    }
}
