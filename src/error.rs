//! Error types for the hub's fallible edges (frame decoding, server I/O).
//!
//! The registry, directory and router themselves never fail: unknown ids
//! resolve to empty or absent results.

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Invalid message format: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
