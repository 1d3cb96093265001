//! Error types for estate-auth.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
