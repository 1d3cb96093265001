//! Host-owned authentication state.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::{Clock, RateLimiter, SystemClock, TokenService};
use crate::config::Settings;
use crate::error::AuthResult;

/// The token service and rate limiter a request-handling host owns for its
/// lifetime. Handlers borrow these; the two never call each other.
pub struct AuthContext {
    pub tokens: TokenService,
    pub limiter: RateLimiter,
}

impl AuthContext {
    /// Build the context from settings, resolving the signing secret.
    pub fn from_settings(settings: &Settings) -> AuthResult<Self> {
        let secret = settings.resolve_secret()?;
        Ok(Self::with_secret(settings, &secret, Arc::new(SystemClock)))
    }

    /// Build the context from settings and an already-resolved secret.
    pub fn with_secret(settings: &Settings, secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let tokens = TokenService::with_clock(secret, Arc::clone(&clock))
            .with_default_ttl(settings.token.ttl_seconds);
        let limiter = RateLimiter::with_clock(
            settings.rate_limit.max_requests,
            Duration::from_millis(settings.rate_limit.window_ms),
            clock,
        );

        info!(
            token_ttl_seconds = settings.token.ttl_seconds,
            max_requests = settings.rate_limit.max_requests,
            window_ms = settings.rate_limit.window_ms,
            "Auth context ready"
        );

        Self { tokens, limiter }
    }
}
