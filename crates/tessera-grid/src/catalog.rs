use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tessera_store::{Collection, Database, Filter, FindOptions, Sort};
use tessera_types::{BlobKey, ID_FIELD};
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::chunk::chunks_of;
use crate::config::CatalogConfig;
use crate::cursor::VersionCursor;
use crate::digest::ContentDigest;
use crate::error::{GridError, GridResult};
use crate::metadata::{fields, BlobMetadata};
use crate::reader::BlobReader;
use crate::writer::{BlobWriter, WriterOptions};

/// Future returned by the closure passed to [`Catalog::write_with`].
pub type WriteFuture<'w, T> = Pin<Box<dyn Future<Output = GridResult<T>> + Send + 'w>>;

/// Selects metadata records: a single key or an arbitrary filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    Key(BlobKey),
    Filter(Filter),
}

impl Selector {
    pub fn into_filter(self) -> Filter {
        match self {
            Self::Key(key) => Filter::eq(ID_FIELD, key),
            Self::Filter(filter) => filter,
        }
    }
}

impl From<BlobKey> for Selector {
    fn from(key: BlobKey) -> Self {
        Self::Key(key)
    }
}

impl From<&BlobKey> for Selector {
    fn from(key: &BlobKey) -> Self {
        Self::Key(key.clone())
    }
}

impl From<Filter> for Selector {
    fn from(filter: Filter) -> Self {
        Self::Filter(filter)
    }
}

/// Outcome of recomputing a blob's checksum from its chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub key: BlobKey,
    /// Checksum recorded at finalize, if any.
    pub expected: Option<String>,
    /// Checksum of the bytes actually stored.
    pub actual: String,
    /// Number of bytes read back.
    pub length: u64,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.expected.as_deref() == Some(self.actual.as_str())
    }
}

/// A named set of blobs stored in `<bucket>.files` and `<bucket>.chunks`.
///
/// # Example
///
/// ```ignore
/// let db = InMemoryDatabase::new();
/// let catalog = Catalog::new(&db, CatalogConfig::default())?;
/// let key = catalog.put(b"hello world", WriterOptions::new().with_filename("hello.txt")).await?;
/// let mut reader = catalog.get(&key).await?;
/// assert_eq!(&reader.read_to_end().await?[..], b"hello world");
/// ```
pub struct Catalog {
    config: CatalogConfig,
    files: Arc<dyn Collection>,
    chunks: Arc<dyn Collection>,
}

impl Catalog {
    /// Open the catalog's collections on `db`.
    pub fn new(db: &dyn Database, config: CatalogConfig) -> GridResult<Self> {
        config.validate()?;
        if !db.write_concern().acknowledged {
            return Err(GridError::DurabilityConfig {
                collection: config.bucket.clone(),
            });
        }
        let files = db.collection(&config.files_collection());
        let chunks = db.collection(&config.chunks_collection());
        Ok(Self {
            config,
            files,
            chunks,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Open a writer. The configured chunk size applies unless the options
    /// choose one.
    pub fn new_writer(&self, mut options: WriterOptions) -> GridResult<BlobWriter> {
        options
            .chunk_size
            .get_or_insert(self.config.default_chunk_size);
        BlobWriter::open(Arc::clone(&self.files), Arc::clone(&self.chunks), options)
    }

    /// Store `data` as a new blob and return its key.
    pub async fn put(&self, data: &[u8], options: WriterOptions) -> GridResult<BlobKey> {
        let mut writer = self.new_writer(options)?;
        let written = writer.write(data).await;
        settle(&mut writer, written).await?;
        Ok(writer.key().clone())
    }

    /// Store everything `source` yields as a new blob.
    pub async fn put_reader<R>(&self, source: R, options: WriterOptions) -> GridResult<BlobKey>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut writer = self.new_writer(options)?;
        let written = writer.write_from(source).await;
        settle(&mut writer, written).await?;
        Ok(writer.key().clone())
    }

    /// Run `body` against a fresh writer, closing it when `body` succeeds and
    /// aborting it when `body` or the close fails.
    pub async fn write_with<T, F>(&self, options: WriterOptions, body: F) -> GridResult<(BlobKey, T)>
    where
        F: for<'w> FnOnce(&'w mut BlobWriter) -> WriteFuture<'w, T>,
    {
        let mut writer = self.new_writer(options)?;
        let outcome = body(&mut writer).await;
        let value = settle(&mut writer, outcome).await?;
        Ok((writer.key().clone(), value))
    }

    /// A reader over the blob stored under `key`.
    pub async fn get(&self, key: &BlobKey) -> GridResult<BlobReader> {
        let mut reader = BlobReader::new(
            Arc::clone(&self.files),
            Arc::clone(&self.chunks),
            key.clone(),
        );
        reader.resolve().await?;
        Ok(reader)
    }

    /// A reader over one version of the blobs matching `filename` and the
    /// extra-field filter `matching`, ordered by upload date.
    ///
    /// `-1` is the most recent, `-2` the one before it, and so on; `0` is
    /// the oldest, `1` the second oldest.
    pub async fn get_version(
        &self,
        filename: Option<&str>,
        version: i64,
        matching: Filter,
    ) -> GridResult<BlobReader> {
        let mut filter = matching;
        if let Some(name) = filename {
            filter = filter.and_eq(fields::FILENAME, name);
        }
        let (sort, skip) = if version < 0 {
            (
                Sort::descending(fields::UPLOAD_DATE),
                version.unsigned_abs() - 1,
            )
        } else {
            (Sort::ascending(fields::UPLOAD_DATE), version.unsigned_abs())
        };
        let options = FindOptions::default()
            .with_sort(sort)
            .with_skip(skip)
            .with_limit(1);

        let mut cursor = self.files.find(&filter, options).await?;
        let doc = cursor.next_document().await?.ok_or_else(|| {
            GridError::NotFound(format!(
                "no version {version} of {}",
                filename.unwrap_or("<any>")
            ))
        })?;
        let meta = BlobMetadata::from_document(doc)?;
        BlobReader::from_metadata(Arc::clone(&self.files), Arc::clone(&self.chunks), meta)
    }

    /// The most recent version; same as `get_version(filename, -1, matching)`.
    pub async fn get_latest_version(
        &self,
        filename: Option<&str>,
        matching: Filter,
    ) -> GridResult<BlobReader> {
        self.get_version(filename, -1, matching).await
    }

    /// Remove a blob's metadata record and then its chunks.
    ///
    /// Deleting an absent key succeeds. Readers racing a delete may see
    /// [`GridError::NotFound`] or [`GridError::Corruption`].
    pub async fn delete(&self, key: &BlobKey) -> GridResult<()> {
        let files = self.files.delete_one(&Filter::eq(ID_FIELD, key)).await?;
        let chunks = self.chunks.delete_many(&chunks_of(key)).await?;
        debug!(key = %key, files, chunks, "blob deleted");
        Ok(())
    }

    /// Sorted distinct filenames. Blobs without a filename are skipped.
    pub async fn list(&self) -> GridResult<Vec<String>> {
        let mut names: Vec<String> = self
            .files
            .distinct(fields::FILENAME, &Filter::all())
            .await?
            .into_iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Cursor over the blobs whose metadata matches `filter`.
    pub fn find(&self, filter: Filter, options: FindOptions) -> VersionCursor {
        VersionCursor::new(
            Arc::clone(&self.files),
            Arc::clone(&self.chunks),
            filter,
            options,
        )
    }

    /// The first blob matching `selector`, if any.
    pub async fn find_one(&self, selector: impl Into<Selector>) -> GridResult<Option<BlobReader>> {
        let mut cursor = self.find(
            selector.into().into_filter(),
            FindOptions::default().with_limit(1),
        );
        cursor.next_blob().await
    }

    /// Whether any metadata record matches `selector`. Chunks are not read.
    pub async fn exists(&self, selector: impl Into<Selector>) -> GridResult<bool> {
        let found = self
            .files
            .find_one(&selector.into().into_filter())
            .await?;
        Ok(found.is_some())
    }

    /// Stream every chunk of a blob and compare the digest of the stored
    /// bytes with the recorded checksum.
    pub async fn verify(&self, key: &BlobKey) -> GridResult<Verification> {
        let mut reader = self.get(key).await?;
        let mut chunks = reader.chunks().await?;
        let mut digest = ContentDigest::new();
        while let Some(chunk) = chunks.next_chunk().await? {
            digest.update(&chunk);
        }
        let verification = Verification {
            key: key.clone(),
            expected: reader.checksum().map(str::to_string),
            actual: digest.finalize_hex(),
            length: digest.bytes_hashed(),
        };
        if !verification.is_valid() {
            warn!(key = %key, expected = ?verification.expected, actual = %verification.actual, "checksum mismatch");
        }
        Ok(verification)
    }
}

/// Close the writer after a successful session, abort it after a failed one
/// or a failed close.
async fn settle<T>(writer: &mut BlobWriter, outcome: GridResult<T>) -> GridResult<T> {
    let outcome = match outcome {
        Ok(value) => writer.close().await.map(|()| value),
        Err(e) => Err(e),
    };
    if outcome.is_err() {
        if let Err(abort_err) = writer.abort().await {
            warn!(key = %writer.key(), error = %abort_err, "abort after failed write failed");
        }
    }
    outcome
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("bucket", &self.config.bucket)
            .field("default_chunk_size", &self.config.default_chunk_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_at, ChunkRecord, BLOB_ID, DATA, SEQUENCE};
    use crate::digest::digest_hex;
    use proptest::prelude::*;
    use std::io::SeekFrom;
    use tessera_store::{InMemoryDatabase, WriteConcern};
    use tessera_types::{Document, Value};

    fn catalog(db: &InMemoryDatabase) -> Catalog {
        Catalog::new(db, CatalogConfig::default()).unwrap()
    }

    fn named(name: &str) -> WriterOptions {
        WriterOptions::new().with_filename(name)
    }

    // =========================================================================
    // Put / get
    // =========================================================================

    #[tokio::test]
    async fn hello_world_round_trip() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = catalog
            .put(b"hello world", named("hello.txt").with_chunk_size(5))
            .await
            .unwrap();

        let chunks: Vec<Vec<u8>> = {
            let mut out = Vec::new();
            for n in 0..3 {
                let doc = db
                    .collection("blobs.chunks")
                    .find_one(&chunk_at(&key, n))
                    .await
                    .unwrap()
                    .unwrap();
                out.push(ChunkRecord::from_document(doc).unwrap().data.to_vec());
            }
            out
        };
        assert_eq!(chunks, vec![b"hello".to_vec(), b" worl".to_vec(), b"d".to_vec()]);

        let mut reader = catalog.get(&key).await.unwrap();
        assert_eq!(reader.length(), Some(11));
        assert_eq!(reader.chunk_size(), Some(5));
        assert_eq!(reader.filename(), Some("hello.txt"));
        assert_eq!(reader.checksum(), Some(digest_hex(b"hello world").as_str()));
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"hello world");
    }

    #[tokio::test]
    async fn config_chunk_size_applies() {
        let db = InMemoryDatabase::new();
        let config = CatalogConfig {
            bucket: "media".into(),
            default_chunk_size: 3,
        };
        let catalog = Catalog::new(&db, config).unwrap();
        let key = catalog.put(b"abcdefg", WriterOptions::new()).await.unwrap();
        assert_eq!(db.memory_collection("media.chunks").len(), 3);
        assert_eq!(db.memory_collection("media.files").len(), 1);
        let reader = catalog.get(&key).await.unwrap();
        assert_eq!(reader.chunk_size(), Some(3));
    }

    #[tokio::test]
    async fn put_reader_streams_source() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = catalog
            .put_reader(&b"from a reader"[..], named("r.bin").with_chunk_size(4))
            .await
            .unwrap();
        let mut reader = catalog.get(&key).await.unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"from a reader");
    }

    #[tokio::test]
    async fn extra_fields_are_stored() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = catalog
            .put(
                b"x",
                named("x").with_content_type("text/plain").with_field("owner", "alice"),
            )
            .await
            .unwrap();
        let reader = catalog.get(&key).await.unwrap();
        assert_eq!(reader.content_type(), Some("text/plain"));
        assert_eq!(reader.field("owner"), Some(Value::from("alice")));
        assert!(reader.upload_date().is_some());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let db = InMemoryDatabase::new();
        let err = catalog(&db)
            .get(&BlobKey::new("nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::NotFound(_)));
    }

    #[tokio::test]
    async fn reused_key_fails_put() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = BlobKey::new("fixed").unwrap();
        catalog
            .put(b"first", WriterOptions::new().with_key(key.clone()))
            .await
            .unwrap();
        let err = catalog
            .put(b"second", WriterOptions::new().with_key(key.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::AlreadyExists(k) if k == key));

        let mut reader = catalog.get(&key).await.unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"first");
    }

    #[tokio::test]
    async fn reused_key_on_populated_store_keeps_original() {
        let db = InMemoryDatabase::new();
        db.collection("blobs.chunks")
            .insert_one(
                Document::new()
                    .with(BLOB_ID, "unrelated")
                    .with(SEQUENCE, 0i64)
                    .with(DATA, b"zz".to_vec()),
            )
            .await
            .unwrap();
        let catalog = catalog(&db);
        let key = BlobKey::new("fixed").unwrap();
        let options = WriterOptions::new().with_key(key.clone()).with_chunk_size(4);

        catalog.put(b"original!", options.clone()).await.unwrap();
        let err = catalog.put(b"intruder!", options).await.unwrap_err();
        assert!(matches!(err, GridError::AlreadyExists(k) if k == key));

        let mut reader = catalog.get(&key).await.unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"original!");
        assert!(catalog.verify(&key).await.unwrap().is_valid());
        assert_eq!(db.memory_collection("blobs.chunks").len(), 4);
    }

    #[test]
    fn unacknowledged_database_is_rejected() {
        let db = InMemoryDatabase::with_write_concern(WriteConcern::UNACKNOWLEDGED);
        let err = Catalog::new(&db, CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, GridError::DurabilityConfig { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let db = InMemoryDatabase::new();
        let err = Catalog::new(&db, CatalogConfig::bucket("")).unwrap_err();
        assert!(matches!(err, GridError::InvalidConfig(_)));
    }

    // =========================================================================
    // Scoped sessions
    // =========================================================================

    #[tokio::test]
    async fn write_with_closes_on_success() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let (key, written) = catalog
            .write_with(named("scoped").with_chunk_size(2), |w| {
                Box::pin(async move {
                    w.write(b"abc").await?;
                    w.write_sequence([b"de".as_slice(), b"f".as_slice()]).await?;
                    Ok::<_, GridError>(w.position())
                })
            })
            .await
            .unwrap();
        assert_eq!(written, 6);
        let mut reader = catalog.get(&key).await.unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"abcdef");
    }

    #[tokio::test]
    async fn write_with_aborts_on_failure() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let err = catalog
            .write_with(named("doomed").with_chunk_size(2), |w| {
                Box::pin(async move {
                    w.write(b"partial").await?;
                    Err::<(), _>(GridError::InvalidState("caller gave up".into()))
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidState(_)));
        assert!(db.memory_collection("blobs.chunks").is_empty());
        assert!(db.memory_collection("blobs.files").is_empty());
        assert!(!catalog
            .exists(Filter::eq(fields::FILENAME, "doomed"))
            .await
            .unwrap());
    }

    // =========================================================================
    // Versions
    // =========================================================================

    #[tokio::test]
    async fn versions_by_upload_order() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        for body in [b"v1", b"v2", b"v3"] {
            catalog.put(body, named("report.txt")).await.unwrap();
        }
        catalog.put(b"other", named("other.txt")).await.unwrap();

        async fn body_of(catalog: &Catalog, version: i64) -> Vec<u8> {
            let mut reader = catalog
                .get_version(Some("report.txt"), version, Filter::all())
                .await
                .unwrap();
            reader.read_to_end().await.unwrap().to_vec()
        }

        assert_eq!(body_of(&catalog, -1).await, b"v3");
        assert_eq!(body_of(&catalog, -2).await, b"v2");
        assert_eq!(body_of(&catalog, -3).await, b"v1");
        assert_eq!(body_of(&catalog, 0).await, b"v1");
        assert_eq!(body_of(&catalog, 2).await, b"v3");

        let mut latest = catalog
            .get_latest_version(Some("report.txt"), Filter::all())
            .await
            .unwrap();
        assert_eq!(&latest.read_to_end().await.unwrap()[..], b"v3");

        for version in [3, -4] {
            let err = catalog
                .get_version(Some("report.txt"), version, Filter::all())
                .await
                .unwrap_err();
            assert!(matches!(err, GridError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn versions_filtered_by_extra_fields() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        catalog
            .put(b"alice 1", named("notes").with_field("owner", "alice"))
            .await
            .unwrap();
        catalog
            .put(b"bob 1", named("notes").with_field("owner", "bob"))
            .await
            .unwrap();
        catalog
            .put(b"alice 2", named("notes").with_field("owner", "alice"))
            .await
            .unwrap();

        let mut reader = catalog
            .get_version(Some("notes"), 0, Filter::eq("owner", "bob"))
            .await
            .unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"bob 1");

        let mut reader = catalog
            .get_latest_version(None, Filter::eq("owner", "alice"))
            .await
            .unwrap();
        assert_eq!(&reader.read_to_end().await.unwrap()[..], b"alice 2");
    }

    // =========================================================================
    // Delete / list / find / exists
    // =========================================================================

    #[tokio::test]
    async fn delete_is_idempotent() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = catalog
            .put(b"short lived", named("tmp").with_chunk_size(4))
            .await
            .unwrap();
        assert!(catalog.exists(&key).await.unwrap());

        catalog.delete(&key).await.unwrap();
        catalog.delete(&key).await.unwrap();

        assert!(!catalog.exists(&key).await.unwrap());
        assert!(matches!(
            catalog.get(&key).await,
            Err(GridError::NotFound(_))
        ));
        assert!(db.memory_collection("blobs.chunks").is_empty());
    }

    #[tokio::test]
    async fn list_skips_unnamed_blobs() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        catalog.put(b"1", named("b.txt")).await.unwrap();
        catalog.put(b"2", named("a.txt")).await.unwrap();
        catalog.put(b"3", named("b.txt")).await.unwrap();
        catalog.put(b"4", WriterOptions::new()).await.unwrap();
        assert_eq!(catalog.list().await.unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn find_and_find_one() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let first = catalog.put(b"1", named("a")).await.unwrap();
        catalog.put(b"2", named("b")).await.unwrap();
        catalog.put(b"3", named("a")).await.unwrap();

        let options = FindOptions::default().with_sort(Sort::descending(fields::UPLOAD_DATE));
        let readers = catalog
            .find(Filter::eq(fields::FILENAME, "a"), options)
            .collect()
            .await
            .unwrap();
        assert_eq!(readers.len(), 2);
        assert_eq!(readers[1].key(), &first);

        let by_key = catalog.find_one(&first).await.unwrap().unwrap();
        assert_eq!(by_key.key(), &first);
        let by_filter = catalog
            .find_one(Filter::eq(fields::FILENAME, "b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_filter.filename(), Some("b"));
        assert!(catalog
            .find_one(Filter::eq(fields::FILENAME, "zzz"))
            .await
            .unwrap()
            .is_none());
    }

    // =========================================================================
    // Verification
    // =========================================================================

    #[tokio::test]
    async fn verify_detects_tampering() {
        let db = InMemoryDatabase::new();
        let catalog = catalog(&db);
        let key = catalog
            .put(b"trust me", WriterOptions::new().with_chunk_size(4))
            .await
            .unwrap();
        let report = catalog.verify(&key).await.unwrap();
        assert!(report.is_valid());
        assert_eq!(report.length, 8);

        let chunks = db.collection("blobs.chunks");
        chunks.delete_one(&chunk_at(&key, 1)).await.unwrap();
        chunks
            .insert_one(
                ChunkRecord::new(key.clone(), 1, bytes::Bytes::from_static(b" you")).to_document(),
            )
            .await
            .unwrap();
        let report = catalog.verify(&key).await.unwrap();
        assert!(!report.is_valid());
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_round_trip(
            data in proptest::collection::vec(any::<u8>(), 0..600),
            chunk_size in 1u64..97,
            split in 1usize..50,
        ) {
            runtime().block_on(async {
                let db = InMemoryDatabase::new();
                let catalog = catalog(&db);
                let (key, ()) = catalog
                    .write_with(WriterOptions::new().with_chunk_size(chunk_size), |w| {
                        let data = data.clone();
                        Box::pin(async move {
                            for span in data.chunks(split) {
                                w.write(span).await?;
                            }
                            Ok::<(), GridError>(())
                        })
                    })
                    .await
                    .unwrap();

                let mut reader = catalog.get(&key).await.unwrap();
                prop_assert_eq!(reader.length(), Some(data.len() as u64));
                let expected_checksum = digest_hex(&data);
                prop_assert_eq!(reader.checksum(), Some(expected_checksum.as_str()));
                prop_assert_eq!(&reader.read_to_end().await.unwrap()[..], &data[..]);
                prop_assert_eq!(
                    db.memory_collection("blobs.chunks").len() as u64,
                    (data.len() as u64).div_ceil(chunk_size)
                );
                Ok::<(), TestCaseError>(())
            })?;
        }

        #[test]
        fn seek_then_read_matches_slice(
            data in proptest::collection::vec(any::<u8>(), 1..400),
            chunk_size in 1u64..64,
            offset in 0usize..450,
            size in 0usize..450,
        ) {
            runtime().block_on(async {
                let db = InMemoryDatabase::new();
                let catalog = catalog(&db);
                let key = catalog
                    .put(&data, WriterOptions::new().with_chunk_size(chunk_size))
                    .await
                    .unwrap();
                let mut reader = catalog.get(&key).await.unwrap();

                let pos = reader.seek(SeekFrom::Start(offset as u64)).await.unwrap();
                prop_assert_eq!(pos, offset as u64);
                let got = reader.read(Some(size)).await.unwrap();

                let start = offset.min(data.len());
                let end = (offset + size).min(data.len());
                prop_assert_eq!(&got[..], &data[start..end]);
                prop_assert_eq!(reader.tell(), offset as u64 + (end - start) as u64);

                let rest = reader.read(None).await.unwrap();
                prop_assert_eq!(&rest[..], &data[end..]);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
