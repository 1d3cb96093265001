//! Session token claims.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of the authenticated user within a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Resident,
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Resident => write!(f, "resident"),
            Role::Manager => write!(f, "manager"),
        }
    }
}

/// Identity claims supplied by the caller when a session is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Subject (user) identifier.
    pub user_id: String,
    pub email: String,
    /// Display name.
    pub name: String,
    /// Opaque apartment/unit identifier.
    pub apartment_id: String,
    pub role: Role,
}

/// The full signed payload: caller claims plus server-assigned timestamps.
///
/// Field order on the wire is the caller claims followed by `iat` and `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub claims: SessionClaims,
    /// Issued-at, seconds since the UNIX epoch.
    pub iat: i64,
    /// Expiry, seconds since the UNIX epoch.
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_manager(&self) -> bool {
        self.claims.role == Role::Manager
    }
}
