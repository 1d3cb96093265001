//! Configuration settings for estate-auth.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::TokenService;
use crate::error::AuthError;

/// Environment variable holding the token signing secret.
pub const SECRET_ENV_VAR: &str = "ESTATE_AUTH_TOKEN_SECRET";

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Path to the signing secret file. The environment variable wins.
    pub secret_path: Option<PathBuf>,
    /// Lifetime of issued tokens in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
}

/// Rate limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per key per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_ttl_seconds() -> i64 {
    crate::auth::DEFAULT_TTL_SECONDS
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret_path: None,
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            AuthError::Config { message } => AuthError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AuthError> {
        let settings: Settings = toml::from_str(content).map_err(|e| AuthError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), AuthError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(AuthError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(AuthError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.token.ttl_seconds <= 0 {
            return Err(AuthError::Config {
                message: format!(
                    "token.ttl_seconds must be positive, got {}",
                    self.token.ttl_seconds
                ),
            });
        }

        if self.rate_limit.max_requests == 0 {
            return Err(AuthError::Config {
                message: "rate_limit.max_requests must be at least 1".to_string(),
            });
        }

        if self.rate_limit.window_ms == 0 {
            return Err(AuthError::Config {
                message: "rate_limit.window_ms must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Resolve the token signing secret.
    ///
    /// `ESTATE_AUTH_TOKEN_SECRET` takes precedence over `token.secret_path`.
    pub fn resolve_secret(&self) -> Result<Vec<u8>, AuthError> {
        self.resolve_secret_with(std::env::var(SECRET_ENV_VAR).ok())
    }

    fn resolve_secret_with(&self, env_secret: Option<String>) -> Result<Vec<u8>, AuthError> {
        if let Some(secret) = env_secret.filter(|s| !s.is_empty()) {
            return Ok(secret.into_bytes());
        }

        match &self.token.secret_path {
            Some(path) => TokenService::load_secret(path),
            None => Err(AuthError::Secret {
                message: format!(
                    "No signing secret: set {} or token.secret_path",
                    SECRET_ENV_VAR
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.token.ttl_seconds, 86_400);
        assert!(settings.token.secret_path.is_none());
        assert_eq!(settings.rate_limit.max_requests, 100);
        assert_eq!(settings.rate_limit.window_ms, 60_000);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, "pretty");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.rate_limit.max_requests, 100);
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [rate_limit]
            max_requests = 5

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.rate_limit.max_requests, 5);
        assert_eq!(settings.rate_limit.window_ms, 60_000);
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_validation_errors() {
        for toml in [
            "[logging]\nlevel = \"loud\"",
            "[logging]\nformat = \"xml\"",
            "[token]\nttl_seconds = 0",
            "[token]\nttl_seconds = -5",
            "[rate_limit]\nmax_requests = 0",
            "[rate_limit]\nwindow_ms = 0",
        ] {
            assert!(
                matches!(Settings::from_toml(toml), Err(AuthError::Config { .. })),
                "{toml}"
            );
        }
    }

    #[test]
    fn test_parse_error_is_config_error() {
        assert!(matches!(
            Settings::from_toml("[rate_limit\n"),
            Err(AuthError::Config { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/estate-auth.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/estate-auth.toml"));
    }

    #[test]
    fn test_secret_from_env_wins() {
        let settings = Settings {
            token: TokenConfig {
                secret_path: Some(PathBuf::from("/nonexistent/token.key")),
                ttl_seconds: 60,
            },
            ..Settings::default()
        };

        let secret = settings
            .resolve_secret_with(Some("from-env".to_string()))
            .unwrap();
        assert_eq!(secret, b"from-env");

        // Empty env value falls through to the (missing) file
        assert!(matches!(
            settings.resolve_secret_with(Some(String::new())),
            Err(AuthError::Secret { .. })
        ));
    }

    #[test]
    fn test_no_secret_configured() {
        let err = Settings::default().resolve_secret_with(None).unwrap_err();
        assert!(err.to_string().contains(SECRET_ENV_VAR));
    }
}
