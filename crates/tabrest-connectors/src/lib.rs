//! Tabrest Connectors - REST APIs as SQL tables
//!
//! This crate provides the backend-independent connector core:
//! - column/value model and constraint domains
//! - immutable table handles and splits with a stable JSON wire form
//! - a paginated fetcher over an HTTP call abstraction
//! - per-table filter pushdown and split expansion
//! - the resource adapter registry (`Rest` / `RestAdapter`)
//! - DataFusion glue (schema provider, table provider, scan node, codec)

pub mod adapter;
pub mod codec;
pub mod config;
pub mod domain;
pub mod dynamic;
pub mod error;
pub mod expr;
pub mod filter;
pub mod handle;
pub mod http;
pub mod pagination;
pub mod provider;
pub mod scan_exec;
pub mod value;

pub use adapter::{FetchFn, FetchRequest, RemoteSort, Rest, RestAdapter, SupportedSort, TableDefinition};
pub use codec::RestPhysicalCodec;
pub use config::RestConfig;
pub use domain::{Bound, ColumnDomain, Constraint, Domain, Literal, Range};
pub use dynamic::{dynamic_filter, DynamicFilter, DynamicFilterSender};
pub use error::{RestError, RestResult};
pub use filter::{FilterApplication, FilterApplier, FilterKind};
pub use handle::{
    ColumnHandle, SchemaTableName, SortDirection, SortItem, Split, TableHandle, NO_LIMIT,
};
pub use http::{ApiResponse, HttpResponse, HttpTransport, ReqwestTransport, RestClient, RestRequest};
pub use pagination::{paginate, Envelope, PageWindow, PAGE_SIZE};
pub use provider::{register_rest_schema, RestSchemaProvider, RestTable};
pub use scan_exec::RestScanExec;
pub use value::{ColumnSchema, ColumnType, Row, ToRow, Value};
