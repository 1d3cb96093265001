//! Error types for estate-auth.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Signing secret could not be resolved or loaded.
    #[error("Secret error: {message}")]
    Secret { message: String },

    /// Authentication and admission failures.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// The underlying cryptographic provider failed.
    #[error("Cryptographic provider failure: {message}")]
    Crypto { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a credential, token or request is rejected.
///
/// The public boolean/option operations collapse all of these into a plain
/// negative result; the kinds exist for logging and for hosts that ask for
/// the typed variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },

    #[error("Rate limit exceeded for '{key}', retry in {}ms", retry_after.as_millis())]
    LimitExceeded { key: String, retry_after: Duration },
}

impl AuthError {
    /// Shorthand for a `MalformedInput` authentication error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        AuthError::Auth {
            kind: AuthErrorKind::MalformedInput {
                reason: reason.into(),
            },
        }
    }

    /// Error for a secret file that failed a check.
    pub(crate) fn secret_file(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        AuthError::Secret {
            message: format!("{}: {}", path.display(), message),
        }
    }

    /// The authentication kind, if this is an authentication failure.
    pub fn auth_kind(&self) -> Option<&AuthErrorKind> {
        match self {
            AuthError::Auth { kind } => Some(kind),
            _ => None,
        }
    }
}

impl From<ring::error::Unspecified> for AuthError {
    fn from(_: ring::error::Unspecified) -> Self {
        AuthError::Crypto {
            message: "ring reported an unspecified failure".to_string(),
        }
    }
}

/// Result type alias for estate-auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
