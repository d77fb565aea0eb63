//! Configuration management for WalletGate
//!
//! This module handles loading and validating configuration from environment
//! variables, with support for different environments (development, staging,
//! production).

use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// JWT secret for access token signing.
    /// Required; a missing secret is a fatal startup error.
    pub jwt_secret: String,

    /// Access token TTL expression (e.g. "1h", "30m", "3600").
    /// Parsed on every issuance, see [`crate::auth::expiry`].
    pub jwt_expiry: String,

    /// Refresh token lifetime in days (default: 30)
    pub refresh_token_ttl_days: i64,

    /// Maximum live refresh tokens per identity (default: 5)
    pub max_refresh_tokens: usize,

    /// Bound on any single storage operation, in milliseconds (default: 5000)
    pub store_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        // The signing secret has no default: tokens minted with a guessable
        // secret are forgeable, so startup must fail instead.
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        let jwt_expiry = env::var("JWT_EXPIRY").unwrap_or_else(|_| "1h".to_string());

        let refresh_token_ttl_days = env::var("REFRESH_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .unwrap_or(30);

        let max_refresh_tokens = env::var("MAX_REFRESH_TOKENS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .unwrap_or(5);

        let store_timeout_ms = env::var("STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .unwrap_or(5000);

        Ok(Config {
            environment,
            port,
            log_level,
            cors_allowed_origins,
            jwt_secret,
            jwt_expiry,
            refresh_token_ttl_days,
            max_refresh_tokens,
            store_timeout_ms,
        })
    }
}
