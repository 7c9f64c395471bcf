//! Store error types.

use thiserror::Error;
use wick_commerce::CommerceError;

/// Errors that can occur when using the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to serialize or deserialize a document.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to perform store operation.
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// A conditional write lost against a newer version.
    #[error("Concurrent modification of {key}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// A unique index already holds this value.
    #[error("Duplicate {index}: {value}")]
    Duplicate { index: &'static str, value: String },

    /// Not enough units to cover a decrement.
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(String),

    /// Document to update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl StoreError {
    /// Whether retrying the read-modify-write may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification { .. })
    }
}

impl From<StoreError> for CommerceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrentModification { .. } | StoreError::Duplicate { .. } => {
                CommerceError::Conflict(e.to_string())
            }
            StoreError::InsufficientStock(product) => CommerceError::OutOfStock(product),
            StoreError::NotFound { entity, id } => CommerceError::NotFound { entity, id },
            StoreError::Serialize(_) | StoreError::Backend(_) => {
                CommerceError::Storage(e.to_string())
            }
        }
    }
}
