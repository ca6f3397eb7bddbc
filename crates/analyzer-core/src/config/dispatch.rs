//! Job submission and polling policy.

use serde::{Deserialize, Serialize};

/// Settings applied by the job dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum accepted query length, in characters.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Query substituted when the caller omits one.
    #[serde(default = "default_query")]
    pub default_query: String,
    /// Fixed-window rate limit applied to reads and submissions.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_query_chars: default_max_query_chars(),
            default_query: default_query(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Fixed-window counters, one window per identity and route class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enforced.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window length in seconds.
    #[serde(default = "default_window")]
    pub window_seconds: u64,
    /// Maximum submissions per window.
    #[serde(default = "default_submit_max")]
    pub submit_max_requests: u64,
    /// Maximum status polls per window.
    #[serde(default = "default_status_max")]
    pub status_max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            window_seconds: default_window(),
            submit_max_requests: default_submit_max(),
            status_max_requests: default_status_max(),
        }
    }
}

fn default_max_query_chars() -> usize {
    2000
}

fn default_query() -> String {
    "Analyze this financial document for investment insights".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window() -> u64 {
    60
}

fn default_submit_max() -> u64 {
    30
}

fn default_status_max() -> u64 {
    120
}
