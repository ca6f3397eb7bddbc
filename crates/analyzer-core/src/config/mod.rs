//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod cache;
pub mod database;
pub mod dispatch;
pub mod logging;
pub mod queue;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::cache::{CacheConfig, MemoryCacheConfig, RedisCacheConfig};
pub use self::database::DatabaseConfig;
pub use self::dispatch::{DispatchConfig, RateLimitConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::queue::QueueConfig;
pub use self::storage::StorageConfig;
pub use self::worker::{HttpStepConfig, WorkerConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Job record store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Work queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Analysis worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Submission policy.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Blob storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ANALYZER__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ANALYZER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the pipeline unsafe to run.
    pub fn validate(&self) -> Result<(), AppError> {
        check_provider("database.provider", &self.database.provider, &["postgres", "memory"])?;
        check_provider("cache.provider", &self.cache.provider, &["redis", "memory"])?;
        check_provider("queue.provider", &self.queue.provider, &["redis", "memory"])?;
        check_provider("storage.provider", &self.storage.provider, &["local", "memory"])?;

        let worker = &self.worker;
        if worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        if worker.steps.is_empty() {
            return Err(AppError::configuration("worker.steps must name at least one step"));
        }
        if worker.lease_ttl_seconds < 3 {
            return Err(AppError::configuration(
                "worker.lease_ttl_seconds must be at least 3",
            ));
        }
        if worker.step_timeout_seconds == 0
            || worker.step_timeout_seconds > worker.max_wall_clock_seconds
        {
            return Err(AppError::configuration(
                "worker.step_timeout_seconds must be positive and within max_wall_clock_seconds",
            ));
        }
        if worker.max_attempts < 1 {
            return Err(AppError::configuration("worker.max_attempts must be at least 1"));
        }
        if self.dispatch.max_query_chars == 0 {
            return Err(AppError::configuration(
                "dispatch.max_query_chars must be positive",
            ));
        }
        if self.cache.listing_ttl_seconds == 0 || self.cache.detail_ttl_seconds == 0 {
            return Err(AppError::configuration("cache TTLs must be positive"));
        }
        Ok(())
    }
}

fn check_provider(field: &str, value: &str, allowed: &[&str]) -> Result<(), AppError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AppError::configuration(format!(
            "Unknown {field} '{value}', expected one of {allowed:?}"
        )))
    }
}
