use std::io::SeekFrom;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tessera_store::{Collection, Filter, FindOptions};
use tessera_types::{BlobKey, Value, ID_FIELD};
use tracing::debug;

use crate::chunk::{chunk_at, chunks_from, ChunkRecord};
use crate::error::{GridError, GridResult};
use crate::metadata::BlobMetadata;

/// Random-access reader over a stored blob.
///
/// Bytes are reconstructed on demand from chunk records. Whatever part of a
/// fetched chunk the caller did not consume is kept as a lookahead buffer
/// and served first by the next read. Seeking discards it.
///
/// A reader built with [`new`](Self::new) looks up its metadata on first
/// use; until then the field accessors return `None`.
pub struct BlobReader {
    files: Arc<dyn Collection>,
    chunks: Arc<dyn Collection>,
    key: BlobKey,
    meta: Option<BlobMetadata>,
    position: u64,
    buffer: Bytes,
}

impl BlobReader {
    /// A reader for `key` whose metadata is resolved on first use.
    pub fn new(files: Arc<dyn Collection>, chunks: Arc<dyn Collection>, key: BlobKey) -> Self {
        Self {
            files,
            chunks,
            key,
            meta: None,
            position: 0,
            buffer: Bytes::new(),
        }
    }

    /// A reader over an already fetched metadata record.
    pub fn from_metadata(
        files: Arc<dyn Collection>,
        chunks: Arc<dyn Collection>,
        meta: BlobMetadata,
    ) -> GridResult<Self> {
        if meta.length.is_none() {
            return Err(GridError::corruption(&meta.key, "metadata has no length"));
        }
        Ok(Self {
            files,
            chunks,
            key: meta.key.clone(),
            meta: Some(meta),
            position: 0,
            buffer: Bytes::new(),
        })
    }

    /// Load the metadata record if it has not been loaded yet.
    pub async fn resolve(&mut self) -> GridResult<&BlobMetadata> {
        if self.meta.is_none() {
            let doc = self
                .files
                .find_one(&Filter::eq(ID_FIELD, &self.key))
                .await?
                .ok_or_else(|| GridError::NotFound(format!("no blob with key {}", self.key)))?;
            let meta = BlobMetadata::from_document(doc)?;
            if meta.length.is_none() {
                return Err(GridError::corruption(&self.key, "metadata has no length"));
            }
            self.meta = Some(meta);
        }
        match &self.meta {
            Some(meta) => Ok(meta),
            None => Err(GridError::NotFound(format!("no blob with key {}", self.key))),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.meta.is_some()
    }

    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    pub fn metadata(&self) -> Option<&BlobMetadata> {
        self.meta.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.meta.as_ref()?.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.meta.as_ref()?.content_type.as_deref()
    }

    pub fn length(&self) -> Option<u64> {
        self.meta.as_ref()?.length
    }

    pub fn chunk_size(&self) -> Option<u64> {
        self.meta.as_ref().map(|m| m.chunk_size)
    }

    pub fn upload_date(&self) -> Option<DateTime<Utc>> {
        self.meta.as_ref()?.upload_date
    }

    pub fn checksum(&self) -> Option<&str> {
        self.meta.as_ref()?.checksum.as_deref()
    }

    /// Any metadata field by name, including caller-supplied extras.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.meta.as_ref()?.field(name)
    }

    /// Current logical position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Move the logical position and discard the lookahead buffer.
    ///
    /// `SeekFrom::End` is relative to the blob's length. Positions past the
    /// end are allowed; reads from there return nothing.
    pub async fn seek(&mut self, pos: SeekFrom) -> GridResult<u64> {
        let target: i128 = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => {
                let (length, _) = self.dimensions().await?;
                i128::from(length) + i128::from(delta)
            }
        };
        let position = u64::try_from(target).map_err(|_| GridError::Range(target))?;
        self.position = position;
        self.buffer = Bytes::new();
        Ok(position)
    }

    /// Read up to `size` bytes, or everything that remains when `None`.
    ///
    /// After the request is satisfied, chunks numbered at or past the
    /// expected chunk count are checked; a non-empty one is corruption.
    pub async fn read(&mut self, size: Option<usize>) -> GridResult<Bytes> {
        if size == Some(0) {
            return Ok(Bytes::new());
        }
        let (length, chunk_size) = self.dimensions().await?;
        let want = self.bounded(size, length);
        let data = self.fill(want, false).await?;
        self.check_trailing(length, chunk_size).await?;
        Ok(data)
    }

    pub async fn read_to_end(&mut self) -> GridResult<Bytes> {
        self.read(None).await
    }

    /// Read through the next `\n`, or up to `size` bytes, whichever comes
    /// first.
    pub async fn read_line(&mut self, size: Option<usize>) -> GridResult<Bytes> {
        if size == Some(0) {
            return Ok(Bytes::new());
        }
        let (length, _) = self.dimensions().await?;
        let want = self.bounded(size, length);
        self.fill(want, true).await
    }

    /// Return the lookahead buffer if non-empty, else the rest of the chunk
    /// under the current position. Empty at end of blob.
    pub async fn read_chunk(&mut self) -> GridResult<Bytes> {
        let (length, chunk_size) = self.dimensions().await?;
        let data = if !self.buffer.is_empty() {
            std::mem::take(&mut self.buffer)
        } else if self.position < length {
            let n = self.position / chunk_size;
            let record = self
                .chunks
                .find_one(&chunk_at(&self.key, n))
                .await?
                .ok_or_else(|| GridError::corruption(&self.key, format!("no chunk #{n}")))?;
            let record = ChunkRecord::from_document(record)?;
            let offset = (self.position % chunk_size) as usize;
            if offset >= record.data.len() {
                return Err(GridError::corruption(
                    &self.key,
                    format!("truncated chunk #{n}"),
                ));
            }
            record.data.slice(offset..)
        } else {
            Bytes::new()
        };
        self.position += data.len() as u64;
        Ok(data)
    }

    /// Iterator over the raw chunk payloads, from the first chunk, regardless
    /// of the current position.
    pub async fn chunks(&mut self) -> GridResult<ChunkIter> {
        let expected = self.resolve().await?.expected_chunks();
        Ok(ChunkIter {
            chunks: Arc::clone(&self.chunks),
            key: self.key.clone(),
            next: 0,
            expected,
        })
    }

    /// Fail with [`GridError::Corruption`] if a non-empty chunk is stored at
    /// or past the expected chunk count. [`read`](Self::read) runs this
    /// after every call; chunk-at-a-time consumers run it themselves.
    pub async fn check_extra_chunks(&mut self) -> GridResult<()> {
        let (length, chunk_size) = self.dimensions().await?;
        self.check_trailing(length, chunk_size).await
    }

    /// Readers hold no resources beyond their metadata.
    pub fn close(&mut self) {}

    async fn dimensions(&mut self) -> GridResult<(u64, u64)> {
        let meta = self.resolve().await?;
        Ok((meta.length.unwrap_or(0), meta.chunk_size))
    }

    fn bounded(&self, size: Option<usize>, length: u64) -> usize {
        let remaining = length.saturating_sub(self.position);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        size.map_or(remaining, |n| n.min(remaining))
    }

    /// Collect `want` bytes (or through the first newline) from successive
    /// chunks, leaving any surplus in the lookahead buffer.
    async fn fill(&mut self, want: usize, stop_at_newline: bool) -> GridResult<Bytes> {
        let mut out = BytesMut::with_capacity(want);
        while out.len() < want {
            let piece = self.read_chunk().await?;
            if piece.is_empty() {
                break;
            }
            let mut take = piece.len().min(want - out.len());
            let mut done = false;
            if stop_at_newline {
                if let Some(pos) = piece[..take].iter().position(|&b| b == b'\n') {
                    take = pos + 1;
                    done = true;
                }
            }
            out.extend_from_slice(&piece[..take]);
            if take < piece.len() {
                self.position -= (piece.len() - take) as u64;
                self.buffer = piece.slice(take..);
            }
            if done {
                break;
            }
        }
        Ok(out.freeze())
    }

    async fn check_trailing(&self, length: u64, chunk_size: u64) -> GridResult<()> {
        let expected = length.div_ceil(chunk_size);
        let mut cursor = self
            .chunks
            .find(&chunks_from(&self.key, expected), FindOptions::default())
            .await?;
        while let Some(doc) = cursor.next_document().await? {
            let extra = ChunkRecord::from_document(doc)?;
            if !extra.data.is_empty() {
                return Err(GridError::corruption(
                    &self.key,
                    format!(
                        "extra chunk: expected {expected} chunks but found chunk #{}",
                        extra.n
                    ),
                ));
            }
            debug!(key = %self.key.short(), n = extra.n, "ignoring empty extra chunk");
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("key", &self.key)
            .field("resolved", &self.meta.is_some())
            .field("position", &self.position)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Pull iterator over a blob's chunk payloads in sequence order.
///
/// Finite and not restartable; obtain a new one from
/// [`BlobReader::chunks`] to start over.
pub struct ChunkIter {
    chunks: Arc<dyn Collection>,
    key: BlobKey,
    next: u64,
    expected: u64,
}

impl ChunkIter {
    /// The next payload, or `None` once every expected chunk was returned.
    pub async fn next_chunk(&mut self) -> GridResult<Option<Bytes>> {
        if self.next >= self.expected {
            return Ok(None);
        }
        let n = self.next;
        let doc = self
            .chunks
            .find_one(&chunk_at(&self.key, n))
            .await?
            .ok_or_else(|| GridError::corruption(&self.key, format!("no chunk #{n}")))?;
        self.next += 1;
        Ok(Some(ChunkRecord::from_document(doc)?.data))
    }

    /// Chunks not yet returned.
    pub fn remaining(&self) -> u64 {
        self.expected - self.next
    }
}

impl std::fmt::Debug for ChunkIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIter")
            .field("key", &self.key)
            .field("next", &self.next)
            .field("expected", &self.expected)
            .finish()
    }
}
