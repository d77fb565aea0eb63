//! HTTP-level tests for the auth routes

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use tower::util::ServiceExt;

    use walletgate_server::auth::AuthService;
    use walletgate_server::routes;
    use walletgate_server::state::AppState;
    use walletgate_server::store::{IdentityStore, MemoryStore, RefreshTokenStore};

    fn test_app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let identities: Arc<dyn IdentityStore> = store.clone();
        let tokens: Arc<dyn RefreshTokenStore> = store;

        let auth_service = Arc::new(AuthService::new(
            identities,
            tokens,
            "test-secret-key".to_string(),
            "1h".to_string(),
            30,
            5,
            Duration::from_secs(5),
        ));

        Router::new()
            .merge(routes::auth_routes())
            .with_state(AppState::new(auth_service))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const ADDRESS: &str = "0x71c7656ec7ab88b098defb751b7401b5f6d8976f";

    #[tokio::test]
    async fn test_nonce_endpoint_creates_identity() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/nonce",
                serde_json::json!({ "address": ADDRESS }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["address"], ADDRESS);
        assert_eq!(body["nonce"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_nonce_endpoint_rejects_bad_address() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/nonce",
                serde_json::json!({ "address": "not-an-address" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_authenticate_unknown_identity_is_404() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/authenticate",
                serde_json::json!({
                    "address": ADDRESS,
                    "signature": format!("0x{}", "ab".repeat(65)),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_authenticate_garbage_signature_is_401() {
        let app = test_app();

        // Register the identity first, then present a well-formed but
        // meaningless signature.
        let _ = app
            .clone()
            .oneshot(post_json(
                "/auth/nonce",
                serde_json::json!({ "address": ADDRESS }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/auth/authenticate",
                serde_json::json!({
                    "address": ADDRESS,
                    "signature": format!("0x{}1b", "11".repeat(64)),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticate_malformed_signature_is_400() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/authenticate",
                serde_json::json!({ "address": ADDRESS, "signature": "0x1234" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_with_unknown_token_is_401() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/refresh",
                serde_json::json!({ "refresh_token": "never-issued" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_is_always_ok() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/auth/logout",
                serde_json::json!({ "refresh_token": "never-issued" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
    }
}
