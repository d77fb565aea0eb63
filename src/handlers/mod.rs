//! HTTP handlers for the WalletGate API

pub mod auth;
