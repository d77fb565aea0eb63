//! Storage abstraction for identities and refresh tokens
//!
//! The auth core treats persistence as an abstract keyed store. The traits
//! here are the seam: the bundled [`MemoryStore`] backs the binary and the
//! test suite, and a database-backed implementation can be swapped in
//! without touching the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Identity, RefreshTokenRecord};

pub mod memory;
pub use memory::MemoryStore;

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Fields for a refresh token about to be persisted. The store assigns the
/// record id and the monotonic creation sequence.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub address: String,
    pub secret_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Keyed store of identities by lowercase address.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_address(&self, address: &str) -> Result<Option<Identity>, StoreError>;

    /// Insert or replace the identity keyed by its address.
    async fn upsert(&self, identity: Identity) -> Result<(), StoreError>;
}

/// Keyed store of refresh tokens by secret hash.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a new token; the store assigns `id` and `seq`.
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError>;

    /// Look up a live (non-revoked, non-expired) token by secret hash.
    async fn find_live_by_hash(
        &self,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Whether any token (live or dead) exists for this secret hash.
    /// Used for the uniqueness check before insertion.
    async fn contains_hash(&self, secret_hash: &str) -> Result<bool, StoreError>;

    /// Drop expired and revoked tokens for one identity; returns the count.
    async fn sweep_dead_for(&self, address: &str, now: DateTime<Utc>)
        -> Result<u64, StoreError>;

    /// All live tokens for one identity.
    async fn live_for(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Remove a single token by record id (cap eviction).
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Flag the token for this secret hash as revoked. Idempotent: returns
    /// the number of tokens newly revoked (0 for unknown or already dead).
    async fn revoke_by_hash(&self, secret_hash: &str) -> Result<u64, StoreError>;
}
