//! Wallet-based authentication
//!
//! Challenge-signature authentication for Ethereum wallets: nonce issuance,
//! EIP-191 signature recovery, JWT access tokens, and refresh token rotation.

pub mod crypto;
pub mod expiry;
pub mod jwt;
pub mod service;

pub use service::{AuthError, AuthService};
