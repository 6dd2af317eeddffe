use tessera_store::StoreError;
use tessera_types::{BlobKey, TypeError};

/// Errors from blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The backing store does not acknowledge writes, so a finalized
    /// checksum could describe chunks that were never stored.
    #[error("collection {collection} must use an acknowledged write concern")]
    DurabilityConfig { collection: String },

    /// A metadata or chunk record with this key already exists.
    #[error("blob with key {0} already exists")]
    AlreadyExists(BlobKey),

    /// Lookup miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing, truncated, extra, or malformed records detected at read time.
    #[error("corrupt blob {key}: {reason}")]
    Corruption { key: BlobKey, reason: String },

    /// The operation is not valid in the current state (e.g. write after close).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A seek resolved to a negative position.
    #[error("invalid seek position {0}: must not be negative")]
    Range(i128),

    /// The cursor does not support this operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Configuration or writer options are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from a caller-supplied source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the backing store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A record field had an unexpected type.
    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

impl GridError {
    pub(crate) fn corruption(key: &BlobKey, reason: impl Into<String>) -> Self {
        Self::Corruption {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

/// Result alias for blob storage operations.
pub type GridResult<T> = Result<T, GridError>;
