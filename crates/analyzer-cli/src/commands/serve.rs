//! Server command.

use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;

/// Run the API server until a shutdown signal.
pub async fn execute(config: AppConfig) -> Result<(), AppError> {
    analyzer_api::run_server(config).await
}
