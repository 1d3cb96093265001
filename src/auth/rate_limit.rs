//! Per-key rate limiting.
//!
//! Provides a fixed window rate limiter keyed by an arbitrary string,
//! typically the client address. Each key may make at most `max_requests`
//! within one window; the window starts on the key's first request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AuthError, AuthErrorKind, AuthResult};

use super::clock::{Clock, SystemClock};

/// The table is swept for elapsed windows once it grows past this size.
pub const SWEEP_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at: u64,
}

/// Outcome of recording one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Admitted,
    Rejected { retry_after_ms: u64 },
}

/// A fixed window rate limiter that tracks requests per key.
///
/// The limiter is owned by the host and shared by reference; the table
/// lives as long as the limiter does.
pub struct RateLimiter {
    /// Window state per key
    entries: Mutex<HashMap<String, Entry>>,
    /// Maximum requests admitted per window
    max_requests: u32,
    /// Window length in milliseconds
    window_ms: u64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Maximum requests admitted per window
    /// * `window` - Length of the fixed window
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    /// Create a new rate limiter with an explicit clock.
    pub fn with_clock(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_requests,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            clock,
        }
    }

    /// Record a request for `key` and report whether it is admitted.
    ///
    /// Rejected requests still count, so a key that keeps hammering stays
    /// rejected until its window elapses.
    pub fn check(&self, key: &str) -> bool {
        match self.record(key) {
            Decision::Admitted => true,
            Decision::Rejected { retry_after_ms } => {
                warn!(key, retry_after_ms, "Rate limit exceeded");
                false
            }
        }
    }

    /// Like [`RateLimiter::check`], but a rejection is a typed
    /// `LimitExceeded` error carrying the time until the window resets.
    pub fn try_acquire(&self, key: &str) -> AuthResult<()> {
        match self.record(key) {
            Decision::Admitted => Ok(()),
            Decision::Rejected { retry_after_ms } => Err(AuthError::Auth {
                kind: AuthErrorKind::LimitExceeded {
                    key: key.to_string(),
                    retry_after: Duration::from_millis(retry_after_ms),
                },
            }),
        }
    }

    /// Forget `key`, so its next request starts a fresh window.
    pub fn reset(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            debug!(key, "Rate limit entry reset");
        }
    }

    /// Get the number of keys being tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn record(&self, key: &str) -> Decision {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now_millis();

        if entries.len() > SWEEP_THRESHOLD {
            let before = entries.len();
            entries.retain(|_, entry| now < entry.reset_at);
            debug!(removed = before - entries.len(), "Swept elapsed rate limit windows");
        }

        if let Some(entry) = entries.get_mut(key) {
            if now < entry.reset_at {
                entry.count = entry.count.saturating_add(1);
                if entry.count <= self.max_requests {
                    return Decision::Admitted;
                }
                return Decision::Rejected {
                    retry_after_ms: entry.reset_at - now,
                };
            }
        }

        // New key, or its window has elapsed
        entries.insert(
            key.to_string(),
            Entry {
                count: 1,
                reset_at: now.saturating_add(self.window_ms),
            },
        );
        Decision::Admitted
    }

    #[cfg(test)]
    fn count(&self, key: &str) -> Option<u32> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|entry| entry.count)
    }
}
