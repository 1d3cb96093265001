//! PBKDF2-HMAC-SHA256 password credentials.
//!
//! A stored credential is `hex(salt):hex(derived_key)` with a 16-byte salt
//! and a 32-byte key. The iteration count is fixed for every credential so
//! it cannot be negotiated down by whoever supplies the stored value.

use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use tracing::{debug, error};

use crate::error::{AuthError, AuthResult};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes.
pub const HASH_LEN: usize = 32;

/// PBKDF2 iteration count shared by all credentials.
pub const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Hash a password into a stored credential.
///
/// When `salt_hex` is `None` a fresh 16-byte salt is drawn from the system
/// CSPRNG. A supplied salt must be hex that decodes to exactly 16 bytes.
/// The output is deterministic for a fixed password and salt.
pub fn hash_password(password: &str, salt_hex: Option<&str>) -> AuthResult<String> {
    let salt = match salt_hex {
        Some(hex_salt) => decode_salt(hex_salt)?,
        None => random_salt()?,
    };

    let derived = derive(password, &salt);
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(derived)))
}

/// Check a password against a stored credential.
///
/// Never fails: anything that is not a well-formed `salt:hash` pair, or a
/// hash that does not match, yields `false`.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split(':');
    let (salt_hex, expected_hex) = match (parts.next(), parts.next(), parts.next()) {
        (Some(salt), Some(hash), None) if !salt.is_empty() && !hash.is_empty() => (salt, hash),
        _ => {
            debug!("Stored credential is not a salt:hash pair");
            return false;
        }
    };

    let salt = match decode_salt(salt_hex) {
        Ok(salt) => salt,
        Err(e) => {
            debug!(error = %e, "Stored credential has an unusable salt");
            return false;
        }
    };

    let actual_hex = hex::encode(derive(password, &salt));
    constant_time_eq(actual_hex.as_bytes(), expected_hex.as_bytes())
}

/// Run [`hash_password`] on the blocking thread pool.
pub async fn hash_password_async(password: String, salt_hex: Option<String>) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, salt_hex.as_deref()))
        .await
        .map_err(|e| AuthError::Crypto {
            message: format!("Password hashing task failed: {}", e),
        })?
}

/// Run [`verify_password`] on the blocking thread pool.
pub async fn verify_password_async(password: String, stored: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await {
        Ok(matched) => matched,
        Err(e) => {
            error!(error = %e, "Password verification task failed");
            false
        }
    }
}

fn derive(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        salt,
        password.as_bytes(),
        &mut out,
    );
    out
}

fn random_salt() -> AuthResult<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new().fill(&mut salt)?;
    Ok(salt)
}

fn decode_salt(salt_hex: &str) -> AuthResult<[u8; SALT_LEN]> {
    let bytes = hex::decode(salt_hex).map_err(|e| AuthError::malformed(format!("salt: {}", e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        AuthError::malformed(format!(
            "salt must be {} bytes, got {}",
            SALT_LEN,
            bytes.len()
        ))
    })
}

/// Length check first, then a constant-time comparison of the contents.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
