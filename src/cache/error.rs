//! Cache Error Types

use crate::store::StoreError;

/// Errors raised by the expiring cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backing store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored payload did not match the requested type
    #[error("Cached value for '{key}' could not be decoded: {source}")]
    Decode {
        /// Cache key
        key: String,
        /// Underlying decode failure
        source: serde_json::Error,
    },

    /// A payload could not be encoded for storage
    #[error("Value for '{key}' could not be encoded: {source}")]
    Encode {
        /// Cache key
        key: String,
        /// Underlying encode failure
        source: serde_json::Error,
    },
}
