use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Default chunk size (255 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 255 * 1024;

/// Configuration of a [`Catalog`](crate::Catalog).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Prefix of the catalog's two collections (`<bucket>.files`,
    /// `<bucket>.chunks`).
    pub bucket: String,
    /// Chunk size used by writers that do not choose their own.
    pub default_chunk_size: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bucket: "blobs".into(),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CatalogConfig {
    /// Configuration for a named bucket with default chunking.
    pub fn bucket(name: impl Into<String>) -> Self {
        Self {
            bucket: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.bucket.is_empty() {
            return Err(GridError::InvalidConfig("bucket name must not be empty".into()));
        }
        if self.default_chunk_size == 0 {
            return Err(GridError::InvalidConfig("chunk size must be positive".into()));
        }
        Ok(())
    }

    /// Name of the metadata collection.
    pub fn files_collection(&self) -> String {
        format!("{}.files", self.bucket)
    }

    /// Name of the chunk collection.
    pub fn chunks_collection(&self) -> String {
        format!("{}.chunks", self.bucket)
    }
}
