/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert or update violated the `_id` or a unique index.
    #[error("duplicate key in {collection} on index {index}: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    /// The index specification is unusable (e.g. no key fields).
    #[error("invalid index specification: {0}")]
    InvalidIndex(String),

    /// Serialization or deserialization failure of a snapshot.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from snapshot persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
