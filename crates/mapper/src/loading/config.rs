use std::time::Duration;

use crate::error::{MapperError, MapperResult};

pub const SYNC_DEPTH_VAR: &str = "ELIF_MAPPER_SYNC_DEPTH";
pub const ASYNC_DEPTH_VAR: &str = "ELIF_MAPPER_ASYNC_DEPTH";
pub const FETCH_TIMEOUT_VAR: &str = "ELIF_MAPPER_FETCH_TIMEOUT_MS";

/// Configuration for graph loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Default depth budget for blocking materialization
    pub sync_depth: i32,
    /// Default depth budget for async materialization
    pub async_depth: i32,
    /// Upper bound on a single batch fetch
    pub fetch_timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sync_depth: 3,
            async_depth: 5,
            fetch_timeout: None,
        }
    }
}

impl LoaderConfig {
    pub fn with_sync_depth(mut self, depth: i32) -> Self {
        self.sync_depth = depth;
        self
    }

    pub fn with_async_depth(mut self, depth: i32) -> Self {
        self.async_depth = depth;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Defaults overridden by `ELIF_MAPPER_*` environment variables
    pub fn from_env() -> MapperResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> MapperResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(SYNC_DEPTH_VAR) {
            config.sync_depth = parse_var(SYNC_DEPTH_VAR, &raw)?;
        }
        if let Some(raw) = lookup(ASYNC_DEPTH_VAR) {
            config.async_depth = parse_var(ASYNC_DEPTH_VAR, &raw)?;
        }
        if let Some(raw) = lookup(FETCH_TIMEOUT_VAR) {
            let millis: u64 = parse_var(FETCH_TIMEOUT_VAR, &raw)?;
            // 0 disables the timeout
            config.fetch_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> MapperResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| MapperError::Configuration(format!("{} must be an integer, got '{}'", name, raw)))
}
