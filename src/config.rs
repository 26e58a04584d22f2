use crate::core::{FeedError, Result};
use std::env;
use std::time::Duration;

/// Largest page a client may request from the content API
pub const MAX_PAGE_SIZE: usize = 50;

/// Feed behaviour configuration
///
/// Shared by list controllers and mutation coordinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Quiet period after the last keystroke before a search term is committed
    pub debounce_window: Duration,

    /// Number of items requested per page
    pub page_size: usize,

    /// Upper bound for any single fetch or mutation request
    pub request_timeout: Duration,

    /// URL query parameter that mirrors the committed search term
    pub search_param: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(350),
            page_size: 9,
            request_timeout: Duration::from_secs(20),
            search_param: "q".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the URL search parameter name
    pub fn search_param(mut self, name: &str) -> Self {
        self.search_param = name.to_string();
        self
    }

    /// Load overrides from `FEED_*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = env_number("FEED_DEBOUNCE_MS")? {
            config.debounce_window = Duration::from_millis(ms);
        }
        if let Some(size) = env_number("FEED_PAGE_SIZE")? {
            config.page_size = size as usize;
        }
        if let Some(ms) = env_number("FEED_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Ok(param) = env::var("FEED_SEARCH_PARAM") {
            config.search_param = param;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FeedError::Config("page_size must be > 0".into()));
        }

        if self.page_size > MAX_PAGE_SIZE {
            return Err(FeedError::Config(format!(
                "page_size must be <= {MAX_PAGE_SIZE}"
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(FeedError::Config("request_timeout must be > 0".into()));
        }

        if self.debounce_window > Duration::from_secs(5) {
            return Err(FeedError::Config(
                "debounce_window must not exceed 5 seconds".into(),
            ));
        }

        if self.search_param.trim().is_empty() {
            return Err(FeedError::Config("search_param must not be empty".into()));
        }

        Ok(())
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| FeedError::Config(format!("{key} must be a non-negative integer"))),
        Err(_) => Ok(None),
    }
}

/// Listener configuration for the content API binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub feed: FeedConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        dotenvy::dotenv().ok();

        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let feed = FeedConfig::from_env().context("invalid FEED_* configuration")?;

        Ok(Self { host, port, feed })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
