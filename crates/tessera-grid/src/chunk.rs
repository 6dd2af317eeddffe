use bytes::Bytes;
use tessera_store::{Condition, Filter, IndexSpec, SortOrder};
use tessera_types::{BlobKey, Document, TypeError, Value};

use crate::error::GridResult;

pub const BLOB_ID: &str = "blob_id";
pub const SEQUENCE: &str = "n";
pub const DATA: &str = "data";

/// One stored segment of a blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    pub blob_key: BlobKey,
    pub n: u64,
    pub data: Bytes,
}

impl ChunkRecord {
    pub fn new(blob_key: BlobKey, n: u64, data: Bytes) -> Self {
        Self { blob_key, n, data }
    }

    pub fn to_document(&self) -> Document {
        Document::new()
            .with(BLOB_ID, &self.blob_key)
            .with(SEQUENCE, self.n)
            .with(DATA, self.data.to_vec())
    }

    pub fn from_document(doc: Document) -> GridResult<Self> {
        let blob_key = doc
            .get(BLOB_ID)
            .ok_or_else(|| TypeError::MissingField(BLOB_ID.into()))
            .and_then(BlobKey::from_value)?;
        let n = doc
            .get_u64(SEQUENCE)?
            .ok_or_else(|| TypeError::MissingField(SEQUENCE.into()))?;
        let data = Bytes::from(doc.take_binary(DATA)?);
        Ok(Self { blob_key, n, data })
    }
}

/// Every chunk of a blob.
pub fn chunks_of(key: &BlobKey) -> Filter {
    Filter::eq(BLOB_ID, key)
}

/// The chunk of a blob with sequence number `n`.
pub fn chunk_at(key: &BlobKey, n: u64) -> Filter {
    chunks_of(key).and_eq(SEQUENCE, n)
}

/// Chunks of a blob with sequence number at or beyond `n`.
pub fn chunks_from(key: &BlobKey, n: u64) -> Filter {
    chunks_of(key).and(SEQUENCE, Condition::Gte(Value::from(n)))
}

/// `_id` of chunk `n` stored by the writer session `session`.
pub fn session_chunk_id(session: &str, n: u64) -> String {
    format!("{session}-{n}")
}

/// Unique `(blob_id, n)` index on the chunk collection.
pub fn chunk_index() -> IndexSpec {
    IndexSpec::new(vec![
        (BLOB_ID.into(), SortOrder::Ascending),
        (SEQUENCE.into(), SortOrder::Ascending),
    ])
    .unique()
}
