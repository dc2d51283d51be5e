//! Library crate for courtroom-back, exposing modules for binaries and integration tests.

/// Startup configuration.
pub mod config;
/// Statistics persistence.
pub mod dao;
/// Wire types for REST and WebSocket clients.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
pub mod oracle;
/// HTTP routers.
pub mod routes;
/// Room runtime and supporting services.
pub mod services;
/// Shared state, rooms and timers.
pub mod state;
