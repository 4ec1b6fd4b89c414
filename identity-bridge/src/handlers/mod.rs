//! HTTP handlers for identity-bridge.

pub mod auth;
pub mod metrics;
pub mod user;
