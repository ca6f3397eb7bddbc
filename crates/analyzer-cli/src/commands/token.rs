//! Token minting for local development and scripting.

use clap::Args;
use serde::Serialize;

use analyzer_auth::JwtEncoder;
use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;
use analyzer_core::types::UserId;

use crate::output::{self, OutputFormat};

/// Token arguments
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// User id to issue the token for (random when omitted)
    #[arg(long)]
    pub user_id: Option<String>,

    /// Display name carried in the token
    #[arg(long, default_value = "analyst")]
    pub username: String,
}

/// A freshly minted token.
#[derive(Debug, Serialize)]
struct IssuedToken {
    user_id: UserId,
    username: String,
    token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// Execute token command
pub fn execute(args: &TokenArgs, config: AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let user_id = match &args.user_id {
        Some(raw) => raw
            .parse::<UserId>()
            .map_err(|_| AppError::validation(format!("Invalid user id: {}", raw)))?,
        None => UserId::new(),
    };

    let encoder = JwtEncoder::new(&config.auth);
    let (token, expires_at) = encoder.generate_access_token(user_id, &args.username)?;

    let issued = IssuedToken {
        user_id,
        username: args.username.clone(),
        token,
        expires_at,
    };
    match format {
        OutputFormat::Json => output::print_item(&issued, format),
        OutputFormat::Table => {
            output::print_kv("User", &issued.user_id.to_string());
            output::print_kv("Username", &issued.username);
            output::print_kv("Expires", &issued.expires_at.to_rfc3339());
            println!("{}", issued.token);
        }
    }
    Ok(())
}
