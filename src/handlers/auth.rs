//! Authentication HTTP handlers
//!
//! Endpoints for wallet-based authentication.

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::{
    AuthTokensResponse, AuthenticateRequest, LogoutRequest, LogoutResponse, NonceRequest,
    NonceResponse, RefreshRequest, RefreshResponse,
};
use crate::state::AppState;

/// POST /auth/nonce - Find or create an identity and return its nonce
pub async fn request_nonce(
    State(state): State<AppState>,
    Json(req): Json<NonceRequest>,
) -> Result<Json<NonceResponse>, ApiError> {
    let response = state
        .auth_service
        .find_or_create_identity(&req.address)
        .await?;

    Ok(Json(response))
}

/// POST /auth/authenticate - Verify a signed challenge and issue tokens
pub async fn authenticate(
    State(state): State<AppState>,
    Json(req): Json<AuthenticateRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state
        .auth_service
        .authenticate(&req.address, &req.signature)
        .await?;

    Ok(Json(tokens))
}

/// POST /auth/refresh - Mint a new access token from a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let response = state.auth_service.refresh(&req.refresh_token).await?;

    Ok(Json(response))
}

/// POST /auth/logout - Revoke a refresh token (idempotent)
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let response = state.auth_service.logout(&req.refresh_token).await?;

    Ok(Json(response))
}
