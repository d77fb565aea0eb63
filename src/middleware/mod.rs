//! Middleware for the WalletGate API
//!
//! Request tracing and security headers. Rate limiting and admission
//! control live in front of this service, not inside it.

mod security;
mod tracing;

pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
