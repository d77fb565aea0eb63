//! Authentication service
//!
//! Core business logic for wallet-based authentication: nonce issuance,
//! challenge-signature verification, and the access/refresh token lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::models::{
    AuthTokensResponse, Identity, LogoutResponse, NonceResponse, RefreshResponse,
};
use crate::store::{IdentityStore, NewRefreshToken, RefreshTokenStore, StoreError};

use super::crypto;
use super::expiry;
use super::jwt::{self, JwtError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Signature verification failed")]
    SignatureRejected,

    #[error("Invalid or expired refresh token")]
    RefreshRejected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage operation timed out")]
    StoreTimeout,
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::MissingSecret => AuthError::Config("signing secret unavailable".to_string()),
            JwtError::MissingSubject => AuthError::InvalidInput("address is required".to_string()),
            other => AuthError::Config(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            AuthError::IdentityNotFound => ApiError::NotFound(
                "Identity not found. Request a nonce first.".to_string(),
            ),
            AuthError::SignatureRejected => {
                ApiError::Unauthorized("Invalid signature. Authentication failed.".to_string())
            }
            AuthError::RefreshRejected => {
                ApiError::Unauthorized("Invalid or expired refresh token".to_string())
            }
            AuthError::Config(detail) => ApiError::Config(detail),
            // Backend failure and timeout are both retryable by the caller.
            AuthError::Storage(detail) => ApiError::ServiceUnavailable(detail),
            AuthError::StoreTimeout => {
                ApiError::ServiceUnavailable("Storage operation timed out".to_string())
            }
        }
    }
}

/// Per-identity lock map. Serializes nonce rotation and refresh token
/// issuance for one identity while leaving other identities in parallel.
#[derive(Clone, Default)]
struct IdentityLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IdentityLocks {
    fn for_address(&self, address: &str) -> Arc<Mutex<()>> {
        // The critical section is a plain map insert; a poisoned lock still
        // holds a usable map, so recover it instead of cascading the panic.
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Authentication service
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    locks: IdentityLocks,
    jwt_secret: String,
    /// Raw TTL expression, resolved through the expiry parser per issuance.
    jwt_expiry: String,
    refresh_token_ttl_days: i64,
    max_tokens_per_identity: usize,
    store_timeout: StdDuration,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        jwt_secret: String,
        jwt_expiry: String,
        refresh_token_ttl_days: i64,
        max_tokens_per_identity: usize,
        store_timeout: StdDuration,
    ) -> Self {
        Self {
            identities,
            tokens,
            locks: IdentityLocks::default(),
            jwt_secret,
            jwt_expiry,
            refresh_token_ttl_days,
            max_tokens_per_identity,
            store_timeout,
        }
    }

    /// Bound a store operation; elapsing surfaces as a retryable error
    /// instead of a hang.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::StoreTimeout),
        }
    }

    /// Find or create an identity and return the current challenge nonce.
    ///
    /// This is the only path that creates identities; `authenticate` never
    /// does. Idempotent: an existing identity keeps its live nonce.
    pub async fn find_or_create_identity(
        &self,
        address: &str,
    ) -> Result<NonceResponse, AuthError> {
        if !crypto::is_valid_address(address) {
            return Err(AuthError::InvalidInput(
                "Invalid Ethereum address format".to_string(),
            ));
        }
        let address = crypto::normalize_address(address);

        let lock = self.locks.for_address(&address);
        let _guard = lock.lock().await;

        if let Some(identity) = self.bounded(self.identities.find_by_address(&address)).await? {
            return Ok(NonceResponse {
                address: identity.address,
                nonce: identity.nonce,
            });
        }

        let identity = Identity::new(address.clone(), crypto::generate_nonce(), Utc::now());
        self.bounded(self.identities.upsert(identity.clone())).await?;

        tracing::info!(address = %identity.address, "Identity created");

        Ok(NonceResponse {
            address: identity.address,
            nonce: identity.nonce,
        })
    }

    /// Authenticate a signed challenge and issue a token pair.
    ///
    /// The nonce is rotated after every attempt, success or failure, so a
    /// captured signature can never be replayed. The whole sequence runs
    /// under the identity's lock: the signature is checked against the nonce
    /// that was live at verification time, and the refresh token cap holds
    /// under concurrent attempts.
    pub async fn authenticate(
        &self,
        address: &str,
        signature: &str,
    ) -> Result<AuthTokensResponse, AuthError> {
        if !crypto::is_valid_address(address) {
            return Err(AuthError::InvalidInput(
                "Invalid Ethereum address format".to_string(),
            ));
        }
        if !crypto::is_valid_signature(signature) {
            return Err(AuthError::InvalidInput(
                "Signature must be 0x followed by 130 hex characters".to_string(),
            ));
        }
        let address = crypto::normalize_address(address);

        let lock = self.locks.for_address(&address);
        let _guard = lock.lock().await;

        let mut identity = self
            .bounded(self.identities.find_by_address(&address))
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        let verified = crypto::verify_signature(&address, &identity.nonce, signature);

        // Rotate unconditionally. A failed guess burns the nonce too, so an
        // attacker cannot retry a captured challenge.
        identity.nonce = crypto::generate_nonce();

        if !verified {
            self.bounded(self.identities.upsert(identity)).await?;
            tracing::warn!(address = %address, "Authentication failed: signature rejected");
            return Err(AuthError::SignatureRejected);
        }

        let now = Utc::now();
        identity.last_login = Some(now);
        identity.login_count += 1;
        self.bounded(self.identities.upsert(identity.clone())).await?;

        let (access_token, expires_in) = self.issue_access_token(&address)?;
        let refresh_token = self.issue_refresh_token(&address).await?;

        tracing::info!(address = %address, "Authentication succeeded");

        Ok(AuthTokensResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            identity: identity.into(),
        })
    }

    /// Mint a new access token against a live refresh token.
    ///
    /// The refresh token itself is not rotated: it stays valid until its own
    /// expiry or an explicit logout.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidInput(
                "Refresh token is required".to_string(),
            ));
        }

        let hash = crypto::hash_secret(refresh_token);
        let record = self
            .bounded(self.tokens.find_live_by_hash(&hash, Utc::now()))
            .await?
            .ok_or(AuthError::RefreshRejected)?;

        let (access_token, expires_in) = self.issue_access_token(&record.address)?;

        tracing::debug!(address = %record.address, "Access token refreshed");

        Ok(RefreshResponse {
            access_token,
            expires_in,
        })
    }

    /// Revoke a refresh token. Idempotent: revoking an unknown or already
    /// dead token still reports success.
    pub async fn logout(&self, refresh_token: &str) -> Result<LogoutResponse, AuthError> {
        let hash = crypto::hash_secret(refresh_token);
        let revoked = self.bounded(self.tokens.revoke_by_hash(&hash)).await?;

        tracing::info!(tokens_revoked = revoked, "Logout processed");

        Ok(LogoutResponse { ok: true })
    }

    /// Count of live refresh tokens for an identity.
    pub async fn active_session_count(&self, address: &str) -> Result<usize, AuthError> {
        let address = crypto::normalize_address(address);
        let live = self
            .bounded(self.tokens.live_for(&address, Utc::now()))
            .await?;
        Ok(live.len())
    }

    fn issue_access_token(&self, address: &str) -> Result<(String, i64), AuthError> {
        let ttl = expiry::parse_expiry(&self.jwt_expiry);
        let token = jwt::generate_access_token(address, &self.jwt_secret, ttl)?;
        Ok((token, ttl))
    }

    /// Sweep, enforce the cap, insert. Callers must hold the identity lock.
    async fn issue_refresh_token(&self, address: &str) -> Result<String, AuthError> {
        let now = Utc::now();

        let swept = self.bounded(self.tokens.sweep_dead_for(address, now)).await?;
        if swept > 0 {
            tracing::debug!(address = %address, swept = swept, "Swept dead refresh tokens");
        }

        let live = self.bounded(self.tokens.live_for(address, now)).await?;
        if live.len() >= self.max_tokens_per_identity {
            // FIFO eviction: oldest issued_at, creation sequence breaks ties.
            if let Some(oldest) = live.iter().min_by_key(|t| (t.issued_at, t.seq)) {
                self.bounded(self.tokens.delete_by_id(oldest.id)).await?;
                tracing::info!(
                    address = %address,
                    evicted_seq = oldest.seq,
                    "Evicted oldest refresh token at cap"
                );
            }
        }

        let mut secret = crypto::generate_refresh_secret();
        while self
            .bounded(self.tokens.contains_hash(&crypto::hash_secret(&secret)))
            .await?
        {
            secret = crypto::generate_refresh_secret();
        }

        self.bounded(self.tokens.insert(NewRefreshToken {
            address: address.to_string(),
            secret_hash: crypto::hash_secret(&secret),
            issued_at: now,
            expires_at: now + Duration::days(self.refresh_token_ttl_days),
        }))
        .await?;

        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use chrono::DateTime;
    use uuid::Uuid;

    use crate::models::RefreshTokenRecord;

    /// Store stub whose every operation reports a backend failure.
    struct FailingStore;

    fn backend_error() -> StoreError {
        StoreError::Backend("connection refused".to_string())
    }

    #[async_trait]
    impl IdentityStore for FailingStore {
        async fn find_by_address(&self, _address: &str) -> Result<Option<Identity>, StoreError> {
            Err(backend_error())
        }

        async fn upsert(&self, _identity: Identity) -> Result<(), StoreError> {
            Err(backend_error())
        }
    }

    #[async_trait]
    impl RefreshTokenStore for FailingStore {
        async fn insert(&self, _token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
            Err(backend_error())
        }

        async fn find_live_by_hash(
            &self,
            _secret_hash: &str,
            _now: DateTime<Utc>,
        ) -> Result<Option<RefreshTokenRecord>, StoreError> {
            Err(backend_error())
        }

        async fn contains_hash(&self, _secret_hash: &str) -> Result<bool, StoreError> {
            Err(backend_error())
        }

        async fn sweep_dead_for(
            &self,
            _address: &str,
            _now: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            Err(backend_error())
        }

        async fn live_for(
            &self,
            _address: &str,
            _now: DateTime<Utc>,
        ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
            Err(backend_error())
        }

        async fn delete_by_id(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(backend_error())
        }

        async fn revoke_by_hash(&self, _secret_hash: &str) -> Result<u64, StoreError> {
            Err(backend_error())
        }
    }

    fn service_over_failing_store() -> AuthService {
        let store = Arc::new(FailingStore);
        let identities: Arc<dyn IdentityStore> = store.clone();
        let tokens: Arc<dyn RefreshTokenStore> = store;

        AuthService::new(
            identities,
            tokens,
            "test-secret-key".to_string(),
            "1h".to_string(),
            30,
            5,
            StdDuration::from_secs(5),
        )
    }

    const ADDRESS: &str = "0x71c7656ec7ab88b098defb751b7401b5f6d8976f";

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_storage_error() {
        let service = service_over_failing_store();

        let result = service.find_or_create_identity(ADDRESS).await;
        assert!(matches!(result, Err(AuthError::Storage(_))));

        let result = service.refresh("some-secret").await;
        assert!(matches!(result, Err(AuthError::Storage(_))));

        let result = service.logout("some-secret").await;
        assert!(matches!(result, Err(AuthError::Storage(_))));
    }

    #[test]
    fn test_storage_failures_are_retryable() {
        // Backend failure and timeout both map to 503 so the caller can
        // retry either.
        let backend = ApiError::from(AuthError::Storage("connection refused".to_string()));
        assert_eq!(backend.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(backend.error_code(), "SERVICE_UNAVAILABLE");

        let timeout = ApiError::from(AuthError::StoreTimeout);
        assert_eq!(timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.error_code(), "SERVICE_UNAVAILABLE");
    }
}
