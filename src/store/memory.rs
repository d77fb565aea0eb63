//! In-memory reference store
//!
//! Backs the server binary and the test suite. Both maps live behind async
//! RwLocks; cross-record atomicity (sweep, count, evict, insert) is the
//! orchestrator's responsibility via its per-identity lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Identity, RefreshTokenRecord};

use super::{IdentityStore, NewRefreshToken, RefreshTokenStore, StoreError};

/// In-memory implementation of both store traits.
#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<String, Identity>>,
    /// Keyed by secret hash.
    tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_address(&self, address: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.read().await.get(address).cloned())
    }

    async fn upsert(&self, identity: Identity) -> Result<(), StoreError> {
        self.identities
            .write()
            .await
            .insert(identity.address.clone(), identity);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            address: token.address,
            secret_hash: token.secret_hash,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            revoked: false,
        };
        self.tokens
            .write()
            .await
            .insert(record.secret_hash.clone(), record.clone());
        Ok(record)
    }

    async fn find_live_by_hash(
        &self,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .tokens
            .read()
            .await
            .get(secret_hash)
            .filter(|t| t.is_live(now))
            .cloned())
    }

    async fn contains_hash(&self, secret_hash: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.read().await.contains_key(secret_hash))
    }

    async fn sweep_dead_for(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.address != address || t.is_live(now));
        Ok((before - tokens.len()) as u64)
    }

    async fn live_for(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.address == address && t.is_live(now))
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.write().await;
        let key = tokens
            .values()
            .find(|t| t.id == id)
            .map(|t| t.secret_hash.clone());
        match key {
            Some(key) => Ok(tokens.remove(&key).is_some()),
            None => Ok(false),
        }
    }

    async fn revoke_by_hash(&self, secret_hash: &str) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(secret_hash) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
