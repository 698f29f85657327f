//! Roster Server Library
//!
//! Demo web service that serves a seeded user roster with request-scoped
//! trace reporting: the store is seeded on the first read that finds the
//! table missing, and every request's spans are collected and reported by
//! the telemetry middleware.
//!
//! This library exposes the core components for testing purposes.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use services::{loader::ProfileLoader, presenter::ProfilesView};
pub use state::AppState;
