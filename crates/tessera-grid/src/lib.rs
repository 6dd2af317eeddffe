//! Chunked blob storage over a document store.
//!
//! Blobs of any size are split into fixed-size chunk records kept in one
//! collection, with a single metadata record per blob in another. The
//! [`Catalog`] is the entry point: it stores blobs through a [`BlobWriter`],
//! hands out random-access [`BlobReader`]s, resolves versions by filename,
//! and enumerates, finds and deletes blobs.
//!
//! # Record Layout
//!
//! - `<bucket>.files` -- one [`BlobMetadata`] record per blob, keyed by `_id`
//! - `<bucket>.chunks` -- [`ChunkRecord`]s `{blob_id, n, data}`, `n` counting
//!   from zero
//!
//! # Invariants
//!
//! 1. Every chunk holds exactly `chunk_size` bytes except the last, which is
//!    shorter but never empty. An empty blob has no chunks.
//! 2. `(blob_id, n)` is unique.
//! 3. The metadata record is stored only once all chunks are, and carries
//!    the blob's length and the BLAKE3 checksum of its content.
//! 4. Readers detect missing, truncated and extra chunks and report them as
//!    [`GridError::Corruption`].
//! 5. Writes require a store that acknowledges them.

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod cursor;
pub mod digest;
pub mod error;
pub mod metadata;
pub mod reader;
pub mod writer;

pub use catalog::{Catalog, Selector, Verification, WriteFuture};
pub use chunk::ChunkRecord;
pub use config::{CatalogConfig, DEFAULT_CHUNK_SIZE};
pub use cursor::{CursorOption, VersionCursor};
pub use digest::{digest_hex, ContentDigest};
pub use error::{GridError, GridResult};
pub use metadata::BlobMetadata;
pub use reader::{BlobReader, ChunkIter};
pub use writer::{BlobWriter, WriterOptions};
