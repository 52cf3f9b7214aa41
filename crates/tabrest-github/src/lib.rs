//! Tabrest GitHub - the GitHub REST API as SQL tables
//!
//! Repositories, issues, pull requests and Actions resources are served as
//! tables of the `github` schema. Every table needs `owner` (and all but
//! `repos` need `repo`) bound by an equality filter, since both are part of
//! the request path.

pub mod config;
pub mod filters;
pub mod model;
pub mod tables;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use tabrest_connectors::{
    HttpTransport, ReqwestTransport, RestAdapter, RestClient, RestConfig, RestError, RestResult,
};
use tracing::info;

pub use config::GithubConfig;
pub use tables::GithubBackend;

pub const SCHEMA_NAME: &str = "github";

pub type GithubRest = RestAdapter<GithubBackend>;

/// Build the adapter talking to the configured GitHub API.
pub fn github_rest(config: &GithubConfig) -> RestResult<GithubRest> {
    let transport = ReqwestTransport::new(
        &config.api_url,
        default_headers(&config.token)?,
        config.rest.connect_timeout,
        config.rest.read_timeout,
    )?;
    info!("Connecting GitHub tables to {}", config.api_url);
    Ok(github_rest_with_transport(
        Arc::new(transport),
        config.rest.clone(),
    ))
}

/// Build the adapter over any transport.
pub fn github_rest_with_transport(
    transport: Arc<dyn HttpTransport>,
    config: RestConfig,
) -> GithubRest {
    RestAdapter::new(
        SCHEMA_NAME,
        GithubBackend::new(RestClient::new(transport)),
        tables::tables(),
        config,
    )
}

fn default_headers(token: &str) -> RestResult<HeaderMap> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| RestError::Config("GitHub token is not a valid header value".to_string()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("tabrest/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_static("2022-11-28"),
    );
    Ok(headers)
}
