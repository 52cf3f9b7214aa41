//! Typed errors for the connectors crate.

use datafusion::error::DataFusionError;
use thiserror::Error;

pub type RestResult<T> = std::result::Result<T, RestError>;

/// Errors raised while planning or fetching REST-backed tables.
///
/// None of these are retried inside the adapter; they propagate to the engine.
#[derive(Debug, Error)]
pub enum RestError {
    /// A column needed to build the request path has no bound value.
    #[error("Missing required constraint for {column}")]
    MissingConstraint { column: String },

    /// A top-N sort key is not on the table's supported list.
    #[error("Invalid order by {requested}, must be one of: {}", .supported.join(", "))]
    InvalidOrderBy {
        requested: String,
        supported: Vec<String>,
    },

    /// The backend answered with a non-success, non-404 status.
    #[error("Backend request to {url} failed with status {status}{}", .body.as_deref().map(|b| format!(": {b}")).unwrap_or_default())]
    Backend {
        status: u16,
        url: String,
        body: Option<String>,
    },

    /// Network-level failure talking to the backend.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend payload could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The connector is read-only.
    #[error("This connector does not support writes (table {table})")]
    UnsupportedWrite { table: String },

    /// A request path value that cannot be sent as a single segment.
    #[error("invalid path segment '{0}'")]
    InvalidPathSegment(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("config error: {0}")]
    Config(String),
}

impl RestError {
    pub fn missing_constraint(column: impl Into<String>) -> Self {
        RestError::MissingConstraint {
            column: column.into(),
        }
    }
}

impl From<RestError> for DataFusionError {
    fn from(e: RestError) -> Self {
        DataFusionError::External(Box::new(e))
    }
}
