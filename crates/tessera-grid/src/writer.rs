use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tessera_store::{Collection, Filter, IndexSpec, StoreError};
use tessera_types::{BlobKey, Document, Value, ID_FIELD};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chunk::{chunk_index, session_chunk_id, ChunkRecord};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::digest::ContentDigest;
use crate::error::{GridError, GridResult};
use crate::metadata::{fields, files_index, BlobMetadata};

/// Options for opening a [`BlobWriter`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriterOptions {
    /// Caller-chosen key; a fresh one is generated when `None`.
    pub key: Option<BlobKey>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Chunk size in bytes; the catalog default applies when `None`.
    pub chunk_size: Option<u64>,
    /// Additional metadata fields stored alongside the known ones.
    pub extra: BTreeMap<String, Value>,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: BlobKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// An in-progress blob upload.
///
/// Bytes are buffered until a whole chunk is available, then stored as a
/// chunk record. The content digest advances over exactly the bytes that
/// are flushed, so it does not depend on how the caller splits its writes.
/// [`close`](Self::close) stores the final short chunk and the metadata
/// record; [`abort`](Self::abort) removes what this session stored.
///
/// Each chunk record gets an `_id` derived from a per-session marker, so
/// abort never touches records another session stored under the same key.
///
/// A writer that is dropped without either leaves orphaned chunk records.
pub struct BlobWriter {
    files: Arc<dyn Collection>,
    chunks: Arc<dyn Collection>,
    meta: BlobMetadata,
    session: String,
    digest: ContentDigest,
    buffer: BytesMut,
    chunk_len: usize,
    next_chunk: u64,
    closed: bool,
    aborted: bool,
    metadata_inserted: bool,
    indexes_ensured: bool,
}

impl BlobWriter {
    /// Open a writer over the metadata and chunk collections.
    pub fn open(
        files: Arc<dyn Collection>,
        chunks: Arc<dyn Collection>,
        options: WriterOptions,
    ) -> GridResult<Self> {
        for collection in [&files, &chunks] {
            if !collection.write_concern().acknowledged {
                return Err(GridError::DurabilityConfig {
                    collection: collection.name().to_string(),
                });
            }
        }

        let chunk_size = options.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(GridError::InvalidConfig("chunk size must be positive".into()));
        }
        if i64::try_from(chunk_size).is_err() {
            return Err(GridError::InvalidConfig(format!(
                "chunk size {chunk_size} does not fit in a stored integer"
            )));
        }
        let chunk_len = usize::try_from(chunk_size)
            .map_err(|_| GridError::InvalidConfig(format!("chunk size {chunk_size} is too large")))?;

        let key = options.key.unwrap_or_else(BlobKey::generate);
        let mut meta = BlobMetadata::new(key, chunk_size);
        meta.filename = options.filename;
        meta.content_type = options.content_type;
        for (name, value) in options.extra {
            if fields::is_known(&name) {
                return Err(GridError::InvalidConfig(format!(
                    "extra field `{name}` shadows a reserved field"
                )));
            }
            meta.extra.insert(name, value);
        }

        Ok(Self {
            files,
            chunks,
            meta,
            session: Uuid::now_v7().simple().to_string(),
            digest: ContentDigest::new(),
            buffer: BytesMut::with_capacity(chunk_len.min(64 * 1024)),
            chunk_len,
            next_chunk: 0,
            closed: false,
            aborted: false,
            metadata_inserted: false,
            indexes_ensured: false,
        })
    }

    pub fn key(&self) -> &BlobKey {
        &self.meta.key
    }

    /// Pending (or, after close, finalized) metadata.
    pub fn metadata(&self) -> &BlobMetadata {
        &self.meta
    }

    pub fn chunk_size(&self) -> u64 {
        self.meta.chunk_size
    }

    /// Total bytes accepted so far, flushed or buffered.
    pub fn position(&self) -> u64 {
        self.digest.bytes_hashed() + self.buffer.len() as u64
    }

    /// Number of chunk records stored so far.
    pub fn chunks_written(&self) -> u64 {
        self.next_chunk
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append bytes to the blob.
    pub async fn write(&mut self, data: &[u8]) -> GridResult<()> {
        self.ensure_open()?;
        let mut data = data;

        if !self.buffer.is_empty() {
            let take = (self.chunk_len - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() < self.chunk_len {
                return Ok(());
            }
            let full = self.buffer.split().freeze();
            self.flush_data(full).await?;
        }

        while data.len() >= self.chunk_len {
            let (head, rest) = data.split_at(self.chunk_len);
            self.flush_data(Bytes::copy_from_slice(head)).await?;
            data = rest;
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Append each span in order.
    pub async fn write_sequence<I, B>(&mut self, spans: I) -> GridResult<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for span in spans {
            self.write(span.as_ref()).await?;
        }
        Ok(())
    }

    /// Copy a source to the blob until it reports end of stream.
    ///
    /// A read error from the source aborts the session before it is
    /// returned. Returns the number of bytes copied.
    pub async fn write_from<R>(&mut self, mut source: R) -> GridResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ensure_open()?;
        let mut buf = vec![0u8; self.chunk_len];
        let mut copied = 0u64;
        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(key = %self.meta.key, copied, error = %e, "source read failed");
                    if let Err(abort_err) = self.abort().await {
                        warn!(key = %self.meta.key, error = %abort_err, "abort after source failure failed");
                    }
                    return Err(e.into());
                }
            };
            self.write(&buf[..n]).await?;
            copied += n as u64;
        }
        Ok(copied)
    }

    /// Set a metadata field.
    ///
    /// Before close the value is recorded in the pending metadata; after
    /// close the stored metadata record is updated.
    pub async fn set_field(&mut self, name: &str, value: impl Into<Value>) -> GridResult<()> {
        if self.aborted {
            return Err(GridError::InvalidState("writer was aborted".into()));
        }
        let value = value.into();
        self.meta.set_field(name, value.clone())?;
        if self.metadata_inserted {
            self.files
                .update_one(
                    &Filter::eq(ID_FIELD, &self.meta.key),
                    Document::new().with(name, value),
                )
                .await?;
        }
        Ok(())
    }

    /// Store the buffered remainder and the finalized metadata record.
    ///
    /// A second call is a no-op.
    pub async fn close(&mut self) -> GridResult<()> {
        if self.closed {
            return Ok(());
        }
        let rest = self.buffer.split().freeze();
        self.flush_data(rest).await?;

        self.meta.length = Some(self.digest.bytes_hashed());
        self.meta.checksum = Some(self.digest.finalize_hex());
        self.meta.upload_date = Some(Utc::now());
        let doc = self.meta.to_document();
        let key = self.meta.key.clone();
        self.files
            .insert_one(doc)
            .await
            .map_err(|e| already_exists(e, &key))?;
        self.metadata_inserted = true;
        self.closed = true;

        debug!(
            key = %key,
            length = self.digest.bytes_hashed(),
            chunks = self.next_chunk,
            "blob finalized"
        );
        Ok(())
    }

    /// Remove every record this session stored and mark the writer closed.
    ///
    /// A second call is a no-op.
    pub async fn abort(&mut self) -> GridResult<()> {
        if self.aborted {
            return Ok(());
        }
        let key = self.meta.key.clone();
        let mut removed = 0;
        for n in 0..self.next_chunk {
            removed += self
                .chunks
                .delete_one(&Filter::eq(ID_FIELD, session_chunk_id(&self.session, n)))
                .await?;
        }
        if self.metadata_inserted {
            self.files.delete_one(&Filter::eq(ID_FIELD, &key)).await?;
            self.metadata_inserted = false;
        }
        self.buffer.clear();
        self.closed = true;
        self.aborted = true;
        warn!(key = %key, chunks = removed, "blob write aborted");
        Ok(())
    }

    fn ensure_open(&self) -> GridResult<()> {
        if self.closed {
            return Err(GridError::InvalidState(format!(
                "blob {} is already closed",
                self.meta.key
            )));
        }
        Ok(())
    }

    /// Store `data` as the next chunk. Empty data stores nothing but still
    /// runs the index check.
    async fn flush_data(&mut self, data: Bytes) -> GridResult<()> {
        self.ensure_indexes().await?;
        if data.is_empty() {
            return Ok(());
        }
        let record = ChunkRecord::new(self.meta.key.clone(), self.next_chunk, data);
        let mut doc = record.to_document();
        doc.insert(ID_FIELD, session_chunk_id(&self.session, record.n));
        self.chunks
            .insert_one(doc)
            .await
            .map_err(|e| already_exists(e, &record.blob_key))?;
        self.digest.update(&record.data);
        debug!(
            key = %record.blob_key.short(),
            n = record.n,
            len = record.data.len(),
            "chunk flushed"
        );
        self.next_chunk += 1;
        Ok(())
    }

    async fn ensure_indexes(&mut self) -> GridResult<()> {
        if self.indexes_ensured {
            return Ok(());
        }
        ensure_index(self.files.as_ref(), files_index()).await?;
        ensure_index(self.chunks.as_ref(), chunk_index()).await?;
        self.indexes_ensured = true;
        Ok(())
    }
}

/// Create `spec` unless an index on the same keys is already listed.
/// Concurrent creators may both get here; `create_index` tolerates that.
async fn ensure_index(collection: &dyn Collection, spec: IndexSpec) -> GridResult<()> {
    let existing = collection.list_indexes().await?;
    if existing.iter().any(|index| index.same_keys(&spec)) {
        return Ok(());
    }
    let name = collection.create_index(spec).await?;
    debug!(collection = collection.name(), index = %name, "index created");
    Ok(())
}

fn already_exists(err: StoreError, key: &BlobKey) -> GridError {
    match err {
        StoreError::DuplicateKey { .. } => GridError::AlreadyExists(key.clone()),
        other => GridError::Store(other),
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        if !self.closed && (self.next_chunk > 0 || !self.buffer.is_empty()) {
            warn!(
                key = %self.meta.key,
                chunks = self.next_chunk,
                buffered = self.buffer.len(),
                "blob writer dropped without close or abort"
            );
        }
    }
}

impl std::fmt::Debug for BlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobWriter")
            .field("key", &self.meta.key)
            .field("chunk_size", &self.meta.chunk_size)
            .field("position", &self.position())
            .field("chunks_written", &self.next_chunk)
            .field("closed", &self.closed)
            .finish()
    }
}
