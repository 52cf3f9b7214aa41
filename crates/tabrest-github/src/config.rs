//! GitHub connector configuration from environment variables.

use std::fmt;

use anyhow::{Context, Result};
use tabrest_connectors::RestConfig;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone)]
pub struct GithubConfig {
    pub token: String,
    /// API root, e.g. `https://ghe.example.com/api/v3` for GitHub Enterprise.
    pub api_url: String,
    pub rest: RestConfig,
}

impl GithubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            rest: RestConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;
        anyhow::ensure!(!token.trim().is_empty(), "GITHUB_TOKEN is empty");
        Ok(Self {
            token,
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            rest: RestConfig::from_env()?,
        })
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &"***")
            .field("api_url", &self.api_url)
            .field("rest", &self.rest)
            .finish()
    }
}
