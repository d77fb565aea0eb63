//! Data models for the WalletGate backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// An authenticated principal, keyed by its Ethereum address.
///
/// Invariant: an identity is never constructed or stored without a live
/// nonce, and the stored address is always lowercase.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Identity {
    pub id: Uuid,
    /// Canonical lowercase `0x` + 40 hex address, unique key.
    pub address: String,
    /// Current single-use challenge value. Rotated after every
    /// authentication attempt against this identity.
    pub nonce: String,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with a freshly generated nonce.
    pub fn new(address: String, nonce: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            nonce,
            last_login: None,
            login_count: 0,
            created_at: now,
        }
    }
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            address: identity.address,
            last_login: identity.last_login,
            login_count: identity.login_count,
            created_at: identity.created_at,
        }
    }
}
