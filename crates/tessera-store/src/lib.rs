//! Document store interface for Tessera.
//!
//! The blob layer never talks to a concrete database. It consumes the
//! [`Database`] and [`Collection`] traits defined here, which capture the
//! handful of capabilities it needs from a document-oriented store:
//! single-document insert, filtered find with sort/skip/limit, field update,
//! delete, distinct values, and index management.
//!
//! # Backends
//!
//! - [`InMemoryDatabase`] -- collections held in memory, optionally
//!   snapshotted to disk with [`InMemoryDatabase::save_to`]
//!
//! # Contract
//!
//! 1. Every document has a unique `_id`; the store assigns one if absent.
//! 2. Unique indexes are enforced on insert and reported as
//!    [`StoreError::DuplicateKey`].
//! 3. `create_index` is idempotent: creating an index that already exists
//!    succeeds without change.
//! 4. Writes are only durable when the [`WriteConcern`] is acknowledged.

pub mod error;
pub mod filter;
pub mod memory;
pub mod options;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filter::{Condition, Filter};
pub use memory::{InMemoryCollection, InMemoryDatabase};
pub use options::{FindOptions, IndexSpec, Sort, SortOrder, WriteConcern};
pub use traits::{Collection, Database, DocumentCursor};
