//! HTTP call abstraction used by the paginated fetcher.
//!
//! Backends describe a call as a [`RestRequest`] (path segments + query). The
//! [`HttpTransport`] executes it; [`RestClient`] adds status handling and
//! JSON decoding on top. Tests swap the transport for a canned one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{RestError, RestResult};

/// One GET request against a REST collection.
///
/// Path values are kept as separate segments so a value taken from a query
/// (an owner, a repository name) is encoded as one segment and can never
/// add path levels, query parameters or a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
}

impl RestRequest {
    pub fn get<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        Self {
            segments: segments.into_iter().map(|s| s.to_string()).collect(),
            query: vec![],
        }
    }

    /// Unencoded `/`-joined path, for logs and assertions.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn param_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw status + body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &RestRequest) -> RestResult<HttpResponse>;
}

/// Outcome of a call whose "not found" status means "no rows".
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    Found(T),
    NotFound,
}

/// [`HttpTransport`] backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Build a transport with default headers (auth, accept, user agent) and timeouts.
    pub fn new(
        base_url: &str,
        headers: HeaderMap,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> RestResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RestError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RestError::Config(format!(
                "base URL '{}' cannot carry a path",
                base_url
            )));
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url_for(&self, request: &RestRequest) -> RestResult<Url> {
        // the url crate silently drops dot segments, which would shift the path
        if let Some(segment) = request
            .segments
            .iter()
            .find(|s| matches!(s.as_str(), "" | "." | ".."))
        {
            return Err(RestError::InvalidPathSegment(segment.clone()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RestError::Config(format!("base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &RestRequest) -> RestResult<HttpResponse> {
        let url = self.url_for(request)?;
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            url: url.to_string(),
            body,
        })
    }
}

/// Typed JSON calls with the connector's status policy.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
}

impl RestClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// GET and decode. 404 becomes [`ApiResponse::NotFound`]; any other
    /// non-2xx status is a [`RestError::Backend`] carrying the body text.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: &RestRequest,
    ) -> RestResult<ApiResponse<T>> {
        let response = self.transport.get(request).await?;
        match response.status {
            200..=299 => Ok(ApiResponse::Found(serde_json::from_str(&response.body)?)),
            404 => {
                debug!("{} not found, treating as empty", response.url);
                Ok(ApiResponse::NotFound)
            }
            status => Err(RestError::Backend {
                status,
                url: response.url,
                body: if response.body.is_empty() {
                    None
                } else {
                    Some(response.body)
                },
            }),
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16, &'static str);

    #[async_trait]
    impl HttpTransport for Fixed {
        async fn get(&self, request: &RestRequest) -> RestResult<HttpResponse> {
            Ok(HttpResponse {
                status: self.0,
                url: format!("https://api.test{}", request.path()),
                body: self.1.to_string(),
            })
        }
    }

    fn client(status: u16, body: &'static str) -> RestClient {
        RestClient::new(Arc::new(Fixed(status, body)))
    }

    #[test]
    fn test_request_builder() {
        let r = RestRequest::get(["repos", "a", "b", "issues"])
            .param("per_page", 100)
            .param_opt("since", None::<String>)
            .param_opt("state", Some("open"));
        assert_eq!(r.query_value("per_page"), Some("100"));
        assert_eq!(r.query_value("since"), None);
        assert_eq!(r.query_value("state"), Some("open"));
    }

    #[test]
    fn test_reqwest_transport_url() {
        let t = ReqwestTransport::new(
            "https://api.github.com",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = t
            .url_for(
                &RestRequest::get(["repos", "o", "r", "issues"])
                    .param("page", 2)
                    .param("state", "all"),
            )
            .unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/o/r/issues?page=2&state=all");
    }

    #[test]
    fn test_reqwest_transport_keeps_base_path() {
        let t = ReqwestTransport::new(
            "https://ghe.example.com/api/v3",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = t.url_for(&RestRequest::get(["users", "o", "repos"])).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/users/o/repos");

        let t = ReqwestTransport::new(
            "https://ghe.example.com/api/v3/",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = t.url_for(&RestRequest::get(["users", "o", "repos"])).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/users/o/repos");
    }

    #[test]
    fn test_reqwest_transport_encodes_segments() {
        let t = ReqwestTransport::new(
            "https://ghe.example.com/api/v3",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let request = RestRequest::get(["repos", "../../../admin", "r?state=closed#", "issues"])
            .param("state", "all");
        let url = t.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/..%2F..%2F..%2Fadmin/r%3Fstate=closed%23/issues?state=all"
        );
        assert_eq!(url.query_pairs().count(), 1);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_reqwest_transport_rejects_dot_segments() {
        let t = ReqwestTransport::new(
            "https://ghe.example.com/api/v3",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        for owner in ["..", ".", ""] {
            let err = t
                .url_for(&RestRequest::get(["repos", owner, "r", "issues"]))
                .unwrap_err();
            assert!(matches!(err, RestError::InvalidPathSegment(ref s) if s == owner));
        }
    }

    #[test]
    fn test_reqwest_transport_rejects_bad_base_url() {
        let result = ReqwestTransport::new(
            "not a url",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RestError::Config(_))));
    }

    #[tokio::test]
    async fn test_success_decodes() {
        let r: ApiResponse<Vec<i64>> = client(200, "[1,2,3]")
            .get_json(&RestRequest::get(["x"]))
            .await
            .unwrap();
        assert_eq!(r, ApiResponse::Found(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let r: ApiResponse<Vec<i64>> = client(404, r#"{"message":"Not Found"}"#)
            .get_json(&RestRequest::get(["x"]))
            .await
            .unwrap();
        assert_eq!(r, ApiResponse::NotFound);
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let err = client(403, "rate limited")
            .get_json::<Vec<i64>>(&RestRequest::get(["x"]))
            .await
            .unwrap_err();
        match err {
            RestError::Backend { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body.as_deref(), Some("rate limited"));
            }
            other => panic!("Expected Backend, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_fatal() {
        let err = client(200, "{not json")
            .get_json::<Vec<i64>>(&RestRequest::get(["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Decode(_)));
    }
}
