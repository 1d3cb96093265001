//! HMAC-SHA256 session tokens.
//!
//! Tokens are three URL-safe base64 (unpadded) segments joined by dots:
//! the fixed header, the JSON claims, and the HMAC over `header.payload`.
//! This is the compact JWT layout with `alg = HS256`.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ring::hmac;
use tracing::debug;

use crate::error::{AuthError, AuthErrorKind, AuthResult};

use super::claims::{SessionClaims, TokenClaims};
use super::clock::{Clock, SystemClock};

/// Lifetime of a token when the caller does not choose one: 24 hours.
pub const DEFAULT_TTL_SECONDS: i64 = 86_400;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Issues and verifies signed session tokens for one secret.
pub struct TokenService {
    key: hmac::Key,
    /// Encoded header, identical for every token this service issues.
    header: String,
    default_ttl: i64,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service reading time from the system clock.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Create a token service with an explicit clock.
    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            header: URL_SAFE_NO_PAD.encode(HEADER_JSON),
            default_ttl: DEFAULT_TTL_SECONDS,
            clock,
        }
    }

    /// Override the TTL used by [`TokenService::sign`].
    pub fn with_default_ttl(mut self, ttl_seconds: i64) -> Self {
        self.default_ttl = ttl_seconds;
        self
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Load a signing secret from a file.
    ///
    /// The file must be readable only by its owner. A single trailing
    /// newline is stripped; an empty secret is rejected.
    pub fn load_secret(path: &Path) -> AuthResult<Vec<u8>> {
        let metadata =
            std::fs::metadata(path).map_err(|e| AuthError::secret_file(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(AuthError::secret_file(
                    path,
                    format!(
                        "insecure permissions {:04o}, expected 0600 or 0400",
                        mode & 0o777
                    ),
                ));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        let mut secret = std::fs::read(path).map_err(|e| AuthError::secret_file(path, e))?;
        if secret.last() == Some(&b'\n') {
            secret.pop();
            if secret.last() == Some(&b'\r') {
                secret.pop();
            }
        }

        if secret.is_empty() {
            return Err(AuthError::secret_file(path, "secret is empty"));
        }

        Ok(secret)
    }

    /// Issue a token with the service's default TTL.
    pub fn sign(&self, claims: &SessionClaims) -> AuthResult<String> {
        self.sign_with_ttl(claims, self.default_ttl)
    }

    /// Issue a token valid for `ttl_seconds`.
    ///
    /// A negative TTL yields a token that is already expired.
    pub fn sign_with_ttl(&self, claims: &SessionClaims, ttl_seconds: i64) -> AuthResult<String> {
        let iat = self.clock.now_secs();
        let payload = TokenClaims {
            claims: claims.clone(),
            iat,
            exp: iat.saturating_add(ttl_seconds),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
        let signing_input = format!("{}.{}", self.header, payload);
        let tag = hmac::sign(&self.key, signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        ))
    }

    /// Verify a token and return its claims, reporting why it was rejected.
    ///
    /// The payload is only decoded after the signature has been verified.
    pub fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        let (header, payload, signature) = match segments.as_slice() {
            [h, p, s] if !h.is_empty() && !p.is_empty() && !s.is_empty() => (*h, *p, *s),
            _ => {
                return Err(AuthError::malformed(format!(
                    "expected 3 non-empty segments, got {}",
                    segments.len()
                )))
            }
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::malformed(format!("signature encoding: {}", e)))?;

        let signed_len = header.len() + 1 + payload.len();
        hmac::verify(&self.key, token[..signed_len].as_bytes(), &signature).map_err(|_| {
            AuthError::Auth {
                kind: AuthErrorKind::SignatureMismatch,
            }
        })?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::malformed(format!("payload encoding: {}", e)))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| AuthError::malformed(format!("payload: {}", e)))?;

        let now = self.clock.now_secs();
        if claims.exp <= now {
            return Err(AuthError::Auth {
                kind: AuthErrorKind::Expired {
                    exp: claims.exp,
                    now,
                },
            });
        }

        Ok(claims)
    }

    /// Verify a token, returning `None` for any invalid token.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        match self.decode(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

/// Issue a token for `claims` signed with `secret`.
///
/// `ttl_seconds` defaults to [`DEFAULT_TTL_SECONDS`].
pub fn sign_token(
    claims: &SessionClaims,
    secret: &str,
    ttl_seconds: Option<i64>,
) -> AuthResult<String> {
    TokenService::new(secret.as_bytes())
        .sign_with_ttl(claims, ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS))
}

/// Verify a token signed with `secret`.
pub fn verify_token(token: &str, secret: &str) -> Option<TokenClaims> {
    TokenService::new(secret.as_bytes()).verify(token)
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use crate::auth::clock::ManualClock;

    const SECRET: &[u8] = b"test-secret-key-32-bytes-long!!";
    const START_MS: u64 = 1_700_000_000_000;

    fn claims() -> SessionClaims {
        SessionClaims {
            user_id: "42".to_string(),
            email: "manager@example.com".to_string(),
            name: "Marta".to_string(),
            apartment_id: "A-1".to_string(),
            role: Role::Manager,
        }
    }

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START_MS));
        (TokenService::with_clock(SECRET, clock.clone()), clock)
    }

    fn kind(err: AuthError) -> AuthErrorKind {
        match err {
            AuthError::Auth { kind } => kind,
            other => panic!("expected an auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();

        let decoded = service.verify(&token).unwrap();
        assert_eq!(decoded.claims, claims());
        assert_eq!(decoded.iat, 1_700_000_000);
        assert_eq!(decoded.exp - decoded.iat, DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn test_token_layout() {
        let (service, _) = service();
        let token = service.sign_with_ttl(&claims(), 60).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(payload["role"], "manager");
        assert_eq!(payload["apartmentId"], "A-1");
        assert_eq!(payload["exp"], 1_700_000_060);
    }

    #[test]
    fn test_token_known_answer() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();
        assert_eq!(
            token,
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
             eyJ1c2VySWQiOiI0MiIsImVtYWlsIjoibWFuYWdlckBleGFtcGxlLmNvbSIsIm5hbWUiOiJNYXJ0YSIsImFw\
             YXJ0bWVudElkIjoiQS0xIiwicm9sZSI6Im1hbmFnZXIiLCJpYXQiOjE3MDAwMDAwMDAsImV4cCI6MTcwMDA4NjQwMH0.\
             WjFkQC3nUw2mcd-OCEpZ3VGgguLcjuIAcJAJzBWDFe4"
        );
    }

    #[test]
    fn test_signature_matches_reference_hmac() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();
        let (signing_input, signature) = token.rsplit_once('.').unwrap();

        let key = hmac::Key::new(hmac::HMAC_SHA256, SECRET);
        let expected = hmac::sign(&key, signing_input.as_bytes());
        assert_eq!(signature, URL_SAFE_NO_PAD.encode(expected.as_ref()));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (service, clock) = service();
        let token = service.sign(&claims()).unwrap();

        let other = TokenService::with_clock(b"another-secret", clock);
        assert_eq!(
            kind(other.decode(&token).unwrap_err()),
            AuthErrorKind::SignatureMismatch
        );
    }

    #[test]
    fn test_altered_signature_rejected() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(service.verify(&tampered).is_none(), "position {i}");
        }
    }

    #[test]
    fn test_altered_payload_rejected() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();

        let mut forged = claims();
        forged.apartment_id = "PENTHOUSE".to_string();
        let forged_payload = TokenClaims {
            claims: forged,
            iat: 1_700_000_000,
            exp: 1_700_086_400,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_payload).unwrap());
        let forged_token = format!("{}.{}.{}", segments[0], forged_payload, segments[2]);

        assert_eq!(
            kind(service.decode(&forged_token).unwrap_err()),
            AuthErrorKind::SignatureMismatch
        );
    }

    #[test]
    fn test_segment_count_rejected() {
        let (service, _) = service();
        let token = service.sign(&claims()).unwrap();

        let two: String = token.rsplitn(2, '.').nth(1).unwrap().to_string();
        let four = format!("{}.extra", token);

        for bad in [
            "",
            "abc",
            two.as_str(),
            four.as_str(),
            "..",
            "a..c",
            "a.b.",
        ] {
            assert!(
                matches!(
                    kind(service.decode(bad).unwrap_err()),
                    AuthErrorKind::MalformedInput { .. }
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed() {
        let (service, _) = service();
        let header = URL_SAFE_NO_PAD.encode(HEADER_JSON);
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let signing_input = format!("{}.{}", header, payload);
        let tag = hmac::sign(&service.key, signing_input.as_bytes());
        let token = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag.as_ref()));

        assert!(matches!(
            kind(service.decode(&token).unwrap_err()),
            AuthErrorKind::MalformedInput { .. }
        ));
    }

    #[test]
    fn test_expiry_is_strict() {
        let (service, clock) = service();
        let token = service.sign_with_ttl(&claims(), 10).unwrap();

        clock.advance(9_999);
        assert!(service.verify(&token).is_some());

        // exp == now is no longer valid.
        clock.advance(1);
        assert_eq!(
            kind(service.decode(&token).unwrap_err()),
            AuthErrorKind::Expired {
                exp: 1_700_000_010,
                now: 1_700_000_010
            }
        );
    }

    #[test]
    fn test_negative_ttl_is_already_expired() {
        let (service, _) = service();
        let token = service.sign_with_ttl(&claims(), -1).unwrap();
        assert!(matches!(
            kind(service.decode(&token).unwrap_err()),
            AuthErrorKind::Expired { .. }
        ));
    }

    #[test]
    fn test_zero_ttl_is_invalid() {
        let (service, _) = service();
        let token = service.sign_with_ttl(&claims(), 0).unwrap();
        assert!(service.verify(&token).is_none());
    }

    #[test]
    fn test_configured_default_ttl() {
        let (service, _) = service();
        let service = service.with_default_ttl(300);
        assert_eq!(service.default_ttl(), 300);

        let decoded = service.verify(&service.sign(&claims()).unwrap()).unwrap();
        assert_eq!(decoded.exp - decoded.iat, 300);
    }

    #[test]
    fn test_free_functions() {
        let token = sign_token(&claims(), "shared", None).unwrap();
        let decoded = verify_token(&token, "shared").unwrap();
        assert_eq!(decoded.claims, claims());
        assert_eq!(decoded.exp - decoded.iat, DEFAULT_TTL_SECONDS);

        assert!(verify_token(&token, "not-shared").is_none());

        let expired = sign_token(&claims(), "shared", Some(-60)).unwrap();
        assert!(verify_token(&expired, "shared").is_none());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
    }

    #[test]
    fn test_load_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.key");
        std::fs::write(&path, "file-secret\n").unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
            assert!(matches!(
                TokenService::load_secret(&path),
                Err(AuthError::Secret { .. })
            ));
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        assert_eq!(TokenService::load_secret(&path).unwrap(), b"file-secret");
    }

    #[test]
    fn test_load_secret_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.key");
        assert!(matches!(
            TokenService::load_secret(&missing),
            Err(AuthError::Secret { .. })
        ));

        let empty = dir.path().join("empty.key");
        std::fs::write(&empty, "\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&empty, std::fs::Permissions::from_mode(0o600)).unwrap();
        }
        assert!(matches!(
            TokenService::load_secret(&empty),
            Err(AuthError::Secret { .. })
        ));
    }
}
