//! Authentication models for WalletGate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted refresh token. The opaque secret itself is never stored;
/// only its SHA-256 hash is, which is also the lookup key.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    /// Owning identity address (back-reference, lowercase).
    pub address: String,
    pub secret_hash: String,
    /// Monotonic creation sequence, tie-breaker for FIFO eviction.
    pub seq: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Once true the token is dead regardless of `expires_at`.
    pub revoked: bool,
}

impl RefreshTokenRecord {
    /// A token is live when it is neither revoked nor expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request for an authentication nonce (find-or-create path)
#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    pub address: String,
}

/// Response containing the challenge nonce to sign
#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub address: String,
    pub nonce: String,
}

/// Request to authenticate with a signed challenge
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub address: String,
    /// Hex-encoded 65-byte signature: `0x` + 130 hex characters
    pub signature: String,
}

/// Auth tokens response
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub identity: IdentityResponse,
}

/// Public identity fields (sanitized for API; never carries the nonce)
#[derive(Debug, Serialize, Clone)]
pub struct IdentityResponse {
    pub address: String,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response for a successful access token refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Logout response; logout is idempotent and always succeeds
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
}
