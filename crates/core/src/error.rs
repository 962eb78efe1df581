//! Error types for the SolverBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all SolverBot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Persistence ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Reasoning endpoint ---
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Formula rendering ---
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    // --- Messaging transport ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Persistence is unavailable or rejected the operation.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Write rejected: {0}")]
    Write(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid limit {0}: must be a positive integer")]
    InvalidLimit(usize),
}

/// The reasoning endpoint failed to produce a reply.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("API request failed: {message} (status: {status_code})")]
    Status { status_code: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// The formula-rendering endpoint could not produce an image.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Renderer unreachable: {0}")]
    Unreachable(String),

    #[error("Renderer returned status {0}")]
    Status(u16),

    #[error("Renderer returned a non-image body ({0})")]
    NotAnImage(String),

    #[error("Rendering timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Download failed for {file_id}: {reason}")]
    DownloadFailed { file_id: String, reason: String },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
