//! JWT access token generation and validation
//!
//! Access tokens are stateless: validity is determined purely by signature
//! and expiry at the edge. Refresh tokens are opaque secrets and never pass
//! through here.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Signing secret is unavailable")]
    MissingSecret,

    #[error("Subject address is required")]
    MissingSubject,

    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject: the authenticated identity's lowercase address
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Always "access"; refresh credentials are opaque, not JWTs
    pub token_type: String,
}

/// Generate a signed access token for an identity address.
///
/// Returns the encoded token; the caller supplies the TTL already resolved
/// through the expiry parser.
pub fn generate_access_token(
    address: &str,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }
    if address.is_empty() {
        return Err(JwtError::MissingSubject);
    }

    let now = Utc::now();
    let claims = AccessClaims {
        sub: address.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        token_type: "access".to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Verify and decode an access token.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        _ => JwtError::DecodingFailed(e.to_string()),
    })?;

    Ok(token_data.claims)
}
