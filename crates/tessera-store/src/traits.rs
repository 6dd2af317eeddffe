use std::sync::Arc;

use async_trait::async_trait;
use tessera_types::{Document, Value};

use crate::error::StoreResult;
use crate::filter::Filter;
use crate::options::{FindOptions, IndexSpec, WriteConcern};

/// Forward-only cursor over the results of a find.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Fetch the next document, or `None` once the result set is exhausted.
    async fn next_document(&mut self) -> StoreResult<Option<Document>>;
}

/// A named collection of documents.
///
/// All implementations must satisfy these invariants:
/// - `_id` is unique within a collection; a missing `_id` is assigned on insert.
/// - Unique indexes are enforced on insert and update.
/// - `create_index` is idempotent and tolerates concurrent creators.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// The write acknowledgment setting applied to writes on this collection.
    fn write_concern(&self) -> WriteConcern;

    /// Insert a single document.
    ///
    /// Returns [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey)
    /// if `_id` or a unique index collides with an existing document.
    async fn insert_one(&self, doc: Document) -> StoreResult<()>;

    /// Run a query and return a cursor over the matching documents.
    async fn find(&self, filter: &Filter, options: FindOptions)
        -> StoreResult<Box<dyn DocumentCursor>>;

    /// Return the first matching document in natural order.
    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        let mut cursor = self
            .find(filter, FindOptions::default().with_limit(1))
            .await?;
        cursor.next_document().await
    }

    /// Set the given fields on the first matching document.
    ///
    /// Returns the number of documents modified (0 or 1).
    async fn update_one(&self, filter: &Filter, set: Document) -> StoreResult<u64>;

    /// Delete the first matching document. Returns the number deleted.
    async fn delete_one(&self, filter: &Filter) -> StoreResult<u64>;

    /// Delete every matching document. Returns the number deleted.
    async fn delete_many(&self, filter: &Filter) -> StoreResult<u64>;

    /// Distinct values of `field` across matching documents.
    ///
    /// Documents without the field are skipped; an explicit `Null` is kept.
    async fn distinct(&self, field: &str, filter: &Filter) -> StoreResult<Vec<Value>>;

    /// Create an index and return its name. No-op if it already exists.
    async fn create_index(&self, spec: IndexSpec) -> StoreResult<String>;

    /// List the secondary indexes of this collection.
    async fn list_indexes(&self) -> StoreResult<Vec<IndexSpec>>;
}

/// A database: a namespace of collections sharing a write concern.
pub trait Database: Send + Sync {
    /// Get (or lazily create) the collection with the given name.
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// The database-wide write acknowledgment setting.
    fn write_concern(&self) -> WriteConcern;
}
