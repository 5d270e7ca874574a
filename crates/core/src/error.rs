//! Error types for the mindloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all mindloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory store errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Persistence errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the text-generation contract.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the long-term memory store contract.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Memory not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures raised by a capability while it runs.
///
/// The executor converts every variant into an `{error}` outcome; none of
/// them abort the rest of an action queue.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("Action {0} not found")]
    NotFound(String),

    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("Failed to execute {action}: {reason}")]
    ExecutionFailed { action: String, reason: String },
}

impl ActionError {
    pub fn invalid(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// Failures while saving or loading a per-user state record.
///
/// These are logged and swallowed by the stores: in-memory state stays
/// authoritative until the next successful save.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Malformed state record at {path}: {reason}")]
    Serialization { path: String, reason: String },
}
