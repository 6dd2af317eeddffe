use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_types::{Document, Value, ID_FIELD};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::options::{FindOptions, IndexSpec, SortOrder, WriteConcern};
use crate::traits::{Collection, Database, DocumentCursor};

static NULL: Value = Value::Null;

/// Documents and indexes of one collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct CollectionState {
    /// Documents in insertion (natural) order.
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl CollectionState {
    fn position_of_id(&self, id: &Value, skip: Option<usize>) -> Option<usize> {
        self.documents
            .iter()
            .enumerate()
            .find(|(i, d)| Some(*i) != skip && d.id() == Some(id))
            .map(|(i, _)| i)
    }

    /// Check `candidate` against every unique index, ignoring the document
    /// at position `skip` (the one being replaced, for updates).
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> StoreResult<()> {
        if let Some(id) = candidate.id() {
            if self.position_of_id(id, skip).is_some() {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: "_id_".into(),
                    key: id.to_string(),
                });
            }
        }
        for spec in self.indexes.iter().filter(|s| s.unique) {
            let key = index_key(spec, candidate);
            let collides = self
                .documents
                .iter()
                .enumerate()
                .any(|(i, d)| Some(i) != skip && index_key(spec, d) == key);
            if collides {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: spec.name(),
                    key: format_key(&key),
                });
            }
        }
        Ok(())
    }
}

fn index_key(spec: &IndexSpec, doc: &Document) -> Vec<Value> {
    spec.keys
        .iter()
        .map(|(field, _)| doc.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

fn format_key(key: &[Value]) -> String {
    key.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cursor over a materialized result set.
struct MemoryCursor {
    documents: VecDeque<Document>,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_document(&mut self) -> StoreResult<Option<Document>> {
        Ok(self.documents.pop_front())
    }
}

/// In-memory collection.
///
/// Documents are held behind a `RwLock`; every read clones out of the lock
/// so no lock is ever held across an await point. Sorted queries fall back
/// to insertion order for ties, in the direction of the first sort key, so
/// "newest first" stays well-defined when timestamps collide.
pub struct InMemoryCollection {
    name: String,
    write_concern: WriteConcern,
    state: RwLock<CollectionState>,
}

impl InMemoryCollection {
    /// Create an empty collection.
    pub fn new(name: impl Into<String>, write_concern: WriteConcern) -> Self {
        Self {
            name: name.into(),
            write_concern,
            state: RwLock::new(CollectionState::default()),
        }
    }

    fn from_state(name: String, write_concern: WriteConcern, state: CollectionState) -> Self {
        Self {
            name,
            write_concern,
            state: RwLock::new(state),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").documents.len()
    }

    /// Returns `true` if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every document in natural order.
    pub fn documents(&self) -> Vec<Document> {
        self.state.read().expect("lock poisoned").documents.clone()
    }

    fn snapshot(&self) -> CollectionState {
        self.state.read().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_concern(&self) -> WriteConcern {
        self.write_concern
    }

    async fn insert_one(&self, mut doc: Document) -> StoreResult<()> {
        if doc.id().is_none() {
            doc.insert(ID_FIELD, Uuid::now_v7().simple().to_string());
        }
        let mut state = self.state.write().expect("lock poisoned");
        state.check_unique(&self.name, &doc, None)?;
        state.documents.push(doc);
        Ok(())
    }

    async fn find(
        &self,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Box<dyn DocumentCursor>> {
        let state = self.state.read().expect("lock poisoned");
        let mut matched: Vec<(usize, &Document)> = state
            .documents
            .iter()
            .enumerate()
            .filter(|(_, d)| filter.matches(d))
            .collect();

        if let Some(sort) = options.sort.as_ref().filter(|s| !s.is_empty()) {
            let newest_first = sort.keys[0].1 == SortOrder::Descending;
            matched.sort_by(|(ia, a), (ib, b)| {
                for (field, order) in &sort.keys {
                    let lhs = a.get(field).unwrap_or(&NULL);
                    let rhs = b.get(field).unwrap_or(&NULL);
                    let ord = match order {
                        SortOrder::Ascending => lhs.canonical_cmp(rhs),
                        SortOrder::Descending => rhs.canonical_cmp(lhs),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                if newest_first {
                    ib.cmp(ia)
                } else {
                    ia.cmp(ib)
                }
            });
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = match options.limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let documents = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(_, d)| d.clone())
            .collect();
        Ok(Box::new(MemoryCursor { documents }))
    }

    async fn update_one(&self, filter: &Filter, set: Document) -> StoreResult<u64> {
        let mut state = self.state.write().expect("lock poisoned");
        let Some(pos) = state.documents.iter().position(|d| filter.matches(d)) else {
            return Ok(0);
        };
        let mut updated = state.documents[pos].clone();
        for (field, value) in set {
            updated.insert(field, value);
        }
        state.check_unique(&self.name, &updated, Some(pos))?;
        state.documents[pos] = updated;
        Ok(1)
    }

    async fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        let mut state = self.state.write().expect("lock poisoned");
        match state.documents.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                state.documents.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: &Filter) -> StoreResult<u64> {
        let mut state = self.state.write().expect("lock poisoned");
        let before = state.documents.len();
        state.documents.retain(|d| !filter.matches(d));
        Ok((before - state.documents.len()) as u64)
    }

    async fn distinct(&self, field: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let state = self.state.read().expect("lock poisoned");
        let mut values: Vec<Value> = Vec::new();
        for value in state
            .documents
            .iter()
            .filter(|d| filter.matches(d))
            .filter_map(|d| d.get(field))
        {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        Ok(values)
    }

    async fn create_index(&self, spec: IndexSpec) -> StoreResult<String> {
        if spec.keys.is_empty() {
            return Err(StoreError::InvalidIndex("index has no key fields".into()));
        }
        let name = spec.name();
        let mut state = self.state.write().expect("lock poisoned");
        if state.indexes.iter().any(|existing| existing.same_keys(&spec)) {
            return Ok(name);
        }
        if spec.unique {
            let mut seen: Vec<Vec<Value>> = Vec::with_capacity(state.documents.len());
            for doc in &state.documents {
                let key = index_key(&spec, doc);
                if seen.contains(&key) {
                    return Err(StoreError::DuplicateKey {
                        collection: self.name.clone(),
                        index: name,
                        key: format_key(&key),
                    });
                }
                seen.push(key);
            }
        }
        debug!(collection = %self.name, index = %name, unique = spec.unique, "index created");
        state.indexes.push(spec);
        Ok(name)
    }

    async fn list_indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.state.read().expect("lock poisoned").indexes.clone())
    }
}

impl std::fmt::Debug for InMemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("name", &self.name)
            .field("document_count", &self.len())
            .finish()
    }
}

/// On-disk snapshot of a whole database.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, CollectionState>,
}

/// In-memory document database.
///
/// Intended for tests, embedding, and the command-line tool. Collections are
/// created on first access. The whole database can be persisted as a
/// `bincode` snapshot so binary payloads stay raw bytes on disk.
pub struct InMemoryDatabase {
    collections: RwLock<BTreeMap<String, Arc<InMemoryCollection>>>,
    write_concern: WriteConcern,
}

impl InMemoryDatabase {
    /// Create an empty database that acknowledges writes.
    pub fn new() -> Self {
        Self::with_write_concern(WriteConcern::ACKNOWLEDGED)
    }

    /// Create an empty database with the given write concern.
    pub fn with_write_concern(write_concern: WriteConcern) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            write_concern,
        }
    }

    /// The concrete collection with the given name, created if absent.
    pub fn memory_collection(&self, name: &str) -> Arc<InMemoryCollection> {
        if let Some(existing) = self.collections.read().expect("lock poisoned").get(name) {
            return Arc::clone(existing);
        }
        let mut map = self.collections.write().expect("lock poisoned");
        let collection = map.entry(name.to_string()).or_insert_with(|| {
            Arc::new(InMemoryCollection::new(name, self.write_concern))
        });
        Arc::clone(collection)
    }

    /// Sorted names of all collections created so far.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Write a snapshot of every collection to `path`.
    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        let collections = self
            .collections
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(name, c)| (name.clone(), c.snapshot()))
            .collect();
        let bytes = bincode::serialize(&Snapshot { collections })
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Load a database from a snapshot written by [`save_to`](Self::save_to).
    ///
    /// Loaded databases acknowledge writes.
    pub fn load_from(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let write_concern = WriteConcern::ACKNOWLEDGED;
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, state)| {
                let collection = InMemoryCollection::from_state(name.clone(), write_concern, state);
                (name, Arc::new(collection))
            })
            .collect();
        debug!(path = %path.display(), "snapshot loaded");
        Ok(Self {
            collections: RwLock::new(collections),
            write_concern,
        })
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for InMemoryDatabase {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.memory_collection(name)
    }

    fn write_concern(&self) -> WriteConcern {
        self.write_concern
    }
}

impl std::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.collections.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryDatabase")
            .field("collection_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Condition;
    use crate::options::Sort;

    fn chunk_index() -> IndexSpec {
        IndexSpec::new(vec![
            ("blob_id".into(), SortOrder::Ascending),
            ("n".into(), SortOrder::Ascending),
        ])
        .unique()
    }

    fn chunk(blob: &str, n: i64) -> Document {
        Document::new()
            .with("blob_id", blob)
            .with("n", n)
            .with("data", vec![n as u8])
    }

    async fn drain(mut cursor: Box<dyn DocumentCursor>) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(doc) = cursor.next_document().await.unwrap() {
            out.push(doc);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Insert / find
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_assigns_missing_id() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(Document::new().with("x", 1i64)).await.unwrap();
        let doc = coll.find_one(&Filter::all()).await.unwrap().unwrap();
        assert!(doc.id().is_some());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(Document::new().with(ID_FIELD, "a")).await.unwrap();
        let err = coll
            .insert_one(Document::new().with(ID_FIELD, "a"))
            .await
            .unwrap_err();
        match err {
            StoreError::DuplicateKey { index, key, .. } => {
                assert_eq!(index, "_id_");
                assert_eq!(key, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(coll.len(), 1);
    }

    #[tokio::test]
    async fn unique_index_is_enforced() {
        let coll = InMemoryCollection::new("chunks", WriteConcern::ACKNOWLEDGED);
        coll.create_index(chunk_index()).await.unwrap();
        coll.insert_one(chunk("k", 0)).await.unwrap();
        coll.insert_one(chunk("k", 1)).await.unwrap();
        coll.insert_one(chunk("other", 0)).await.unwrap();
        let err = coll.insert_one(chunk("k", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref index, .. } if index == "blob_id_1_n_1"));
    }

    #[tokio::test]
    async fn find_with_sort_skip_limit() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        for n in [3i64, 1, 2, 0] {
            coll.insert_one(chunk("k", n)).await.unwrap();
        }
        let opts = FindOptions::default()
            .with_sort(Sort::ascending("n"))
            .with_skip(1)
            .with_limit(2);
        let docs = drain(coll.find(&Filter::all(), opts).await.unwrap()).await;
        let ns: Vec<i64> = docs.iter().map(|d| d.get("n").unwrap().as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2]);
    }

    #[tokio::test]
    async fn descending_ties_prefer_latest_insert() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        for i in 0..3i64 {
            let doc = Document::new()
                .with(ID_FIELD, format!("d{i}"))
                .with("filename", "same")
                .with("rank", 1i64);
            coll.insert_one(doc).await.unwrap();
        }
        let newest = drain(
            coll.find(
                &Filter::all(),
                FindOptions::default().with_sort(Sort::descending("rank")),
            )
            .await
            .unwrap(),
        )
        .await;
        let ids: Vec<String> = newest.iter().map(|d| d.id().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["d2", "d1", "d0"]);

        let oldest = drain(
            coll.find(
                &Filter::all(),
                FindOptions::default().with_sort(Sort::ascending("rank")),
            )
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(oldest[0].id().unwrap().to_string(), "d0");
    }

    #[tokio::test]
    async fn range_filter_on_find_one() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        for n in 0..4i64 {
            coll.insert_one(chunk("k", n)).await.unwrap();
        }
        let filter = Filter::eq("blob_id", "k").and("n", Condition::Gte(Value::Int(3)));
        let doc = coll.find_one(&filter).await.unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(&Value::Int(3)));
        let none = Filter::eq("blob_id", "k").and("n", Condition::Gte(Value::Int(4)));
        assert!(coll.find_one(&none).await.unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Update / delete / distinct
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_sets_fields_on_first_match() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(Document::new().with(ID_FIELD, "a")).await.unwrap();
        let n = coll
            .update_one(&Filter::eq(ID_FIELD, "a"), Document::new().with("tag", "x"))
            .await
            .unwrap();
        assert_eq!(n, 1);
        let doc = coll.find_one(&Filter::eq(ID_FIELD, "a")).await.unwrap().unwrap();
        assert_eq!(doc.get_str("tag").unwrap(), Some("x"));

        let missing = coll
            .update_one(&Filter::eq(ID_FIELD, "zz"), Document::new().with("tag", "y"))
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn update_cannot_steal_an_id() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(Document::new().with(ID_FIELD, "a")).await.unwrap();
        coll.insert_one(Document::new().with(ID_FIELD, "b")).await.unwrap();
        let err = coll
            .update_one(&Filter::eq(ID_FIELD, "b"), Document::new().with(ID_FIELD, "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn delete_one_and_many() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        for n in 0..3i64 {
            coll.insert_one(chunk("k", n)).await.unwrap();
        }
        coll.insert_one(chunk("other", 0)).await.unwrap();

        assert_eq!(coll.delete_one(&Filter::eq("blob_id", "k")).await.unwrap(), 1);
        assert_eq!(coll.delete_many(&Filter::eq("blob_id", "k")).await.unwrap(), 2);
        assert_eq!(coll.delete_many(&Filter::eq("blob_id", "k")).await.unwrap(), 0);
        assert_eq!(coll.len(), 1);
    }

    #[tokio::test]
    async fn distinct_skips_missing_but_keeps_null() {
        let coll = InMemoryCollection::new("files", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(Document::new().with("filename", "a")).await.unwrap();
        coll.insert_one(Document::new().with("filename", "a")).await.unwrap();
        coll.insert_one(Document::new().with("filename", "b")).await.unwrap();
        coll.insert_one(Document::new().with("filename", Value::Null)).await.unwrap();
        coll.insert_one(Document::new()).await.unwrap();
        let values = coll.distinct("filename", &Filter::all()).await.unwrap();
        assert_eq!(values, vec![Value::from("a"), Value::from("b"), Value::Null]);
    }

    // -----------------------------------------------------------------------
    // Indexes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_index_is_idempotent() {
        let coll = InMemoryCollection::new("chunks", WriteConcern::ACKNOWLEDGED);
        let first = coll.create_index(chunk_index()).await.unwrap();
        let second = coll.create_index(chunk_index()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(coll.list_indexes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_index_creation_converges() {
        let coll = Arc::new(InMemoryCollection::new("chunks", WriteConcern::ACKNOWLEDGED));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coll = Arc::clone(&coll);
                tokio::spawn(async move { coll.create_index(chunk_index()).await })
            })
            .collect();
        for h in handles {
            h.await.expect("task should not panic").unwrap();
        }
        assert_eq!(coll.list_indexes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unique_index_over_duplicates_fails() {
        let coll = InMemoryCollection::new("chunks", WriteConcern::ACKNOWLEDGED);
        coll.insert_one(chunk("k", 0)).await.unwrap();
        coll.insert_one(chunk("k", 0)).await.unwrap();
        let err = coll.create_index(chunk_index()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn empty_index_is_invalid() {
        let coll = InMemoryCollection::new("c", WriteConcern::ACKNOWLEDGED);
        let err = coll.create_index(IndexSpec::new(vec![])).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidIndex(_)));
    }

    // -----------------------------------------------------------------------
    // Database
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn collections_are_shared_by_name() {
        let db = InMemoryDatabase::new();
        db.collection("a").insert_one(Document::new()).await.unwrap();
        assert_eq!(db.memory_collection("a").len(), 1);
        assert!(db.memory_collection("b").is_empty());
        assert_eq!(db.collection_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn write_concern_propagates_to_collections() {
        let db = InMemoryDatabase::with_write_concern(WriteConcern::UNACKNOWLEDGED);
        assert!(!db.write_concern().acknowledged);
        assert!(!db.collection("x").write_concern().acknowledged);
    }

    #[tokio::test]
    async fn snapshot_roundtrip_keeps_binary_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.bin");

        let db = InMemoryDatabase::new();
        let chunks = db.collection("blobs.chunks");
        chunks.create_index(chunk_index()).await.unwrap();
        chunks.insert_one(chunk("k", 0)).await.unwrap();
        db.save_to(&path).unwrap();

        let loaded = InMemoryDatabase::load_from(&path).unwrap();
        let chunks = loaded.collection("blobs.chunks");
        let doc = chunks.find_one(&Filter::eq("blob_id", "k")).await.unwrap().unwrap();
        assert_eq!(doc.get_binary("data").unwrap(), &[0u8]);
        assert_eq!(chunks.list_indexes().await.unwrap().len(), 1);
        let err = chunks.insert_one(chunk("k", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[test]
    fn load_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InMemoryDatabase::load_from(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn debug_format() {
        let db = InMemoryDatabase::new();
        let _ = db.collection("x");
        let debug = format!("{db:?}");
        assert!(debug.contains("InMemoryDatabase"));
        assert!(debug.contains("collection_count"));
    }
}
