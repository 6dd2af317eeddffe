use std::sync::Arc;

use tessera_store::{Collection, DocumentCursor, Filter, FindOptions, Sort};

use crate::error::{GridError, GridResult};
use crate::metadata::BlobMetadata;
use crate::reader::BlobReader;

/// Low-level query flags of the backing store's cursors.
///
/// Version cursors do not accept any of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorOption {
    Tailable,
    NoCursorTimeout,
    AwaitData,
    Exhaust,
    Partial,
}

/// Cursor over metadata records that yields a resolved [`BlobReader`] per
/// match.
///
/// The query is issued on the first advance. Until then sort, skip and
/// limit may still be changed.
pub struct VersionCursor {
    files: Arc<dyn Collection>,
    chunks: Arc<dyn Collection>,
    filter: Filter,
    options: FindOptions,
    inner: Option<Box<dyn DocumentCursor>>,
}

impl VersionCursor {
    pub fn new(
        files: Arc<dyn Collection>,
        chunks: Arc<dyn Collection>,
        filter: Filter,
        options: FindOptions,
    ) -> Self {
        Self {
            files,
            chunks,
            filter,
            options,
            inner: None,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Whether the underlying query has been issued.
    pub fn is_started(&self) -> bool {
        self.inner.is_some()
    }

    pub fn sort(&mut self, sort: Sort) -> GridResult<&mut Self> {
        self.ensure_unstarted("sort")?;
        self.options.sort = Some(sort);
        Ok(self)
    }

    pub fn skip(&mut self, skip: u64) -> GridResult<&mut Self> {
        self.ensure_unstarted("skip")?;
        self.options.skip = skip;
        Ok(self)
    }

    /// Cap the number of results; `0` removes the cap.
    pub fn limit(&mut self, limit: u64) -> GridResult<&mut Self> {
        self.ensure_unstarted("limit")?;
        self.options.limit = limit;
        Ok(self)
    }

    pub fn add_option(&mut self, _option: CursorOption) -> GridResult<()> {
        Err(GridError::UnsupportedOperation(
            "add_option is not supported on version cursors",
        ))
    }

    pub fn remove_option(&mut self, _option: CursorOption) -> GridResult<()> {
        Err(GridError::UnsupportedOperation(
            "remove_option is not supported on version cursors",
        ))
    }

    /// A fresh cursor with the same filter and options, not yet started.
    pub fn clone_unpositioned(&self) -> Self {
        Self::new(
            Arc::clone(&self.files),
            Arc::clone(&self.chunks),
            self.filter.clone(),
            self.options.clone(),
        )
    }

    /// Advance to the next matching blob.
    pub async fn next_blob(&mut self) -> GridResult<Option<BlobReader>> {
        if self.inner.is_none() {
            let cursor = self.files.find(&self.filter, self.options.clone()).await?;
            self.inner = Some(cursor);
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        match inner.next_document().await? {
            Some(doc) => {
                let meta = BlobMetadata::from_document(doc)?;
                let reader =
                    BlobReader::from_metadata(Arc::clone(&self.files), Arc::clone(&self.chunks), meta)?;
                Ok(Some(reader))
            }
            None => Ok(None),
        }
    }

    /// Drain the remaining results.
    pub async fn collect(mut self) -> GridResult<Vec<BlobReader>> {
        let mut readers = Vec::new();
        while let Some(reader) = self.next_blob().await? {
            readers.push(reader);
        }
        Ok(readers)
    }

    fn ensure_unstarted(&self, operation: &str) -> GridResult<()> {
        if self.is_started() {
            return Err(GridError::InvalidState(format!(
                "cannot change {operation} after the cursor has started"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for VersionCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionCursor")
            .field("filter", &self.filter)
            .field("options", &self.options)
            .field("started", &self.is_started())
            .finish()
    }
}
