//! Error types for heartbeat-log
//!
//! This module defines all error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for heartbeat-log operations.
#[derive(Error, Debug)]
pub enum HeartbeatError {
    /// The storage backend could not read or persist the bundle.
    #[error("Storage unavailable: {0}")]
    Storage(String),

    /// A header value could not be decoded back into a payload.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration-related errors (invalid config file, bad env overrides, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The asynchronous logger's worker task is no longer running
    #[error("Heartbeat logger closed")]
    LoggerClosed,
}

/// A specialized `Result` type for heartbeat-log operations.
pub type Result<T> = std::result::Result<T, HeartbeatError>;
