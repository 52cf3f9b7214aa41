//! Connector configuration from environment variables.

use std::time::Duration;

use anyhow::{ensure, Context, Result};

/// Settings shared by every REST backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Number of page-window splits for tables listed in `min_split_tables`.
    pub min_splits: u32,
    /// Tables whose splits are fanned out into `min_splits` page windows.
    pub min_split_tables: Vec<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            min_splits: 1,
            min_split_tables: vec![],
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl RestConfig {
    pub fn from_env() -> Result<Self> {
        let min_splits: u32 = std::env::var("REST_MIN_SPLITS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("Invalid REST_MIN_SPLITS")?;
        ensure!(min_splits >= 1, "REST_MIN_SPLITS must be at least 1");

        let min_split_tables = std::env::var("REST_MIN_SPLIT_TABLES")
            .map(|v| parse_table_list(&v))
            .unwrap_or_default();

        let connect_timeout_secs: u64 = std::env::var("REST_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("Invalid REST_CONNECT_TIMEOUT_SECS")?;
        let read_timeout_secs: u64 = std::env::var("REST_READ_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("Invalid REST_READ_TIMEOUT_SECS")?;

        Ok(Self {
            min_splits,
            min_split_tables,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            read_timeout: Duration::from_secs(read_timeout_secs),
        })
    }

    /// Page-window splits to create for `table` (1 = no fan-out).
    pub fn splits_for(&self, table: &str) -> u32 {
        if self.min_split_tables.iter().any(|t| t == table) {
            self.min_splits.max(1)
        } else {
            1
        }
    }
}

fn parse_table_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
