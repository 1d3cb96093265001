//! estate-auth
//!
//! Authentication and abuse-control primitives for a resident portal:
//! PBKDF2 password credentials, HMAC-signed session tokens and a per-key
//! fixed window rate limiter. The crate never touches user storage; it
//! takes and returns plain strings and claim structs.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;

pub use context::AuthContext;
