use std::fmt;
use std::time::Duration;

use triage_core::CoreError;

pub const DEFAULT_LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const DEFAULT_LINEAR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LISTING_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_DETAIL_CACHE_TTL_SECS: u64 = 600;

#[derive(Clone, PartialEq, Eq)]
pub struct LinearConfig {
    pub api_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
    /// Freshness window for the project and team listings.
    pub listing_cache_ttl: Duration,
    /// Freshness window for project details and workflow states.
    pub detail_cache_ttl: Duration,
}

impl fmt::Debug for LinearConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LinearConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("listing_cache_ttl", &self.listing_cache_ttl)
            .field("detail_cache_ttl", &self.detail_cache_ttl)
            .finish()
    }
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LINEAR_API_URL.to_owned(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(DEFAULT_LINEAR_TIMEOUT_SECS),
            listing_cache_ttl: Duration::from_secs(DEFAULT_LISTING_CACHE_TTL_SECS),
            detail_cache_ttl: Duration::from_secs(DEFAULT_DETAIL_CACHE_TTL_SECS),
        }
    }
}

impl LinearConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoreError> {
        let api_key = api_key.into();
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CoreError::Configuration(
                "LINEAR_API_KEY is empty. Provide a non-empty API key.".to_owned(),
            ));
        }

        Ok(Self {
            api_key: api_key.to_owned(),
            ..Self::default()
        })
    }
}
