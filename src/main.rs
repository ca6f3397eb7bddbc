//! Document analyzer server.
//!
//! Loads configuration, sets up logging and hands off to the API crate,
//! which wires the stores, cache, queue, worker and HTTP server together.

use tracing_subscriber::{EnvFilter, fmt};

use analyzer_core::config::{AppConfig, LogFormat};
use analyzer_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = analyzer_api::run_server(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the environment overlay and `ANALYZER__*`
/// variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let dir = std::env::var("ANALYZER_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("ANALYZER_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(&dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
