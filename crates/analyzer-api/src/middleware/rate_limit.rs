//! Fixed-window rate limiting keyed by user and route class.
//!
//! Counters live in the cache provider (`INCR`, then `EXPIRE` on the first
//! hit of a window). If the cache cannot be reached the request is let
//! through.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::{debug, warn};

use analyzer_cache::keys;
use analyzer_core::config::RateLimitConfig;
use analyzer_core::error::AppError;
use analyzer_core::traits::CacheProvider;
use analyzer_core::types::UserId;

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// Route classes with separate budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Job submission.
    Submit,
    /// Job status polling.
    Status,
}

impl RouteClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Status => "status",
        }
    }

    fn limit(self, config: &RateLimitConfig) -> u64 {
        match self {
            Self::Submit => config.submit_max_requests,
            Self::Status => config.status_max_requests,
        }
    }
}

/// Fixed-window counter over a cache provider.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheProvider>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub fn new(cache: Arc<dyn CacheProvider>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    /// Count one request. Returns `RateLimit` once the window is full.
    pub async fn check(&self, class: RouteClass, user: UserId) -> Result<(), AppError> {
        if !self.config.enabled {
            return Ok(());
        }
        let window_len = self.config.window_seconds.max(1);
        let window = Utc::now().timestamp().max(0) as u64 / window_len;
        let key = keys::rate_limit(class.as_str(), &user.to_string(), window);

        let count = match self.cache.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Rate limit counter unavailable, allowing request");
                return Ok(());
            }
        };
        if count == 1 {
            if let Err(e) = self.cache.expire(&key, Duration::from_secs(window_len)).await {
                warn!(key = %key, error = %e, "Failed to set rate limit window expiry");
            }
        }

        let limit = class.limit(&self.config);
        if count as u64 > limit {
            debug!(user_id = %user, class = class.as_str(), count, limit, "Rate limited");
            return Err(AppError::rate_limit(format!(
                "Too many requests; at most {limit} per {window_len}s"
            )));
        }
        Ok(())
    }
}

async fn limit(state: &AppState, class: RouteClass, user: UserId) -> Result<(), ApiError> {
    RateLimiter::new(state.cache.clone(), state.config.dispatch.rate_limit.clone())
        .check(class, user)
        .await
        .map_err(ApiError::from)
}

/// Applied to `POST /api/jobs`.
pub async fn limit_submissions(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit(&state, RouteClass::Submit, auth.user_id).await?;
    Ok(next.run(request).await)
}

/// Applied to `GET /api/jobs/{id}`.
pub async fn limit_status_polls(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit(&state, RouteClass::Status, auth.user_id).await?;
    Ok(next.run(request).await)
}
