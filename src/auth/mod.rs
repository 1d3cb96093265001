//! Authentication primitives.
//!
//! Handles password credential hashing, signed session tokens,
//! and per-key rate limiting.

pub mod claims;
pub mod clock;
pub mod password;
pub mod rate_limit;
pub mod token;

pub use claims::{Role, SessionClaims, TokenClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use password::{hash_password, hash_password_async, verify_password, verify_password_async};
pub use rate_limit::RateLimiter;
pub use token::{bearer_token, sign_token, verify_token, TokenService, DEFAULT_TTL_SECONDS};
