//! WalletGate Backend Library
//!
//! This library exports the core modules for the WalletGate authentication
//! server: Ethereum challenge-signature authentication and session token
//! lifecycle management.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
