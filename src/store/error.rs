//! Store Error Types

/// Errors raised by a document store backend
///
/// Components in this crate never retry these; they propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file I/O failed
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
