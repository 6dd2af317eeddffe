use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tessera_store::{IndexSpec, SortOrder};
use tessera_types::{BlobKey, Document, TypeError, Value};

use crate::error::{GridError, GridResult};

/// Field names of a metadata record.
pub mod fields {
    pub const KEY: &str = "_id";
    pub const FILENAME: &str = "filename";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const LENGTH: &str = "length";
    pub const CHUNK_SIZE: &str = "chunk_size";
    pub const UPLOAD_DATE: &str = "upload_date";
    pub const CHECKSUM: &str = "checksum";

    /// Fields only the writer may set.
    pub const WRITER_MANAGED: [&str; 5] = [KEY, LENGTH, CHUNK_SIZE, UPLOAD_DATE, CHECKSUM];

    pub fn is_known(name: &str) -> bool {
        name == FILENAME || name == CONTENT_TYPE || WRITER_MANAGED.contains(&name)
    }
}

/// Lookup index on `(filename, upload_date)` in the metadata collection.
pub fn files_index() -> IndexSpec {
    IndexSpec::new(vec![
        (fields::FILENAME.into(), SortOrder::Ascending),
        (fields::UPLOAD_DATE.into(), SortOrder::Ascending),
    ])
}

/// Per-blob metadata record.
///
/// Known fields are typed; anything else the caller attached lives in
/// `extra`. `length`, `upload_date` and `checksum` are `None` until the
/// writer finalizes the blob.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobMetadata {
    pub key: BlobKey,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub length: Option<u64>,
    pub chunk_size: u64,
    pub upload_date: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl BlobMetadata {
    /// Pending metadata for a blob that has not been written yet.
    pub fn new(key: BlobKey, chunk_size: u64) -> Self {
        Self {
            key,
            filename: None,
            content_type: None,
            length: None,
            chunk_size,
            upload_date: None,
            checksum: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.length.is_some() && self.checksum.is_some()
    }

    /// Number of chunk records a finalized blob of this length must have.
    pub fn expected_chunks(&self) -> u64 {
        self.length.unwrap_or(0).div_ceil(self.chunk_size)
    }

    /// Look up a field by name: known fields first, then the extras.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            fields::KEY => Some(self.key.to_value()),
            fields::FILENAME => self.filename.clone().map(Value::String),
            fields::CONTENT_TYPE => self.content_type.clone().map(Value::String),
            fields::LENGTH => self.length.map(Value::from),
            fields::CHUNK_SIZE => Some(Value::from(self.chunk_size)),
            fields::UPLOAD_DATE => self.upload_date.map(Value::Timestamp),
            fields::CHECKSUM => self.checksum.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Set a caller-controlled field. Writer-managed fields are rejected.
    pub(crate) fn set_field(&mut self, name: &str, value: Value) -> GridResult<()> {
        if fields::WRITER_MANAGED.contains(&name) {
            return Err(GridError::InvalidState(format!(
                "field `{name}` is managed by the writer"
            )));
        }
        match name {
            fields::FILENAME => self.filename = optional_string(name, value)?,
            fields::CONTENT_TYPE => self.content_type = optional_string(name, value)?,
            _ => {
                self.extra.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Encode as a store document. Unset optional fields are omitted.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new()
            .with(fields::KEY, &self.key)
            .with(fields::CHUNK_SIZE, self.chunk_size);
        if let Some(filename) = &self.filename {
            doc.insert(fields::FILENAME, filename.as_str());
        }
        if let Some(content_type) = &self.content_type {
            doc.insert(fields::CONTENT_TYPE, content_type.as_str());
        }
        if let Some(length) = self.length {
            doc.insert(fields::LENGTH, length);
        }
        if let Some(upload_date) = self.upload_date {
            doc.insert(fields::UPLOAD_DATE, upload_date);
        }
        if let Some(checksum) = &self.checksum {
            doc.insert(fields::CHECKSUM, checksum.as_str());
        }
        for (name, value) in &self.extra {
            doc.insert(name.as_str(), value.clone());
        }
        doc
    }

    /// Decode a store document.
    pub fn from_document(doc: Document) -> GridResult<Self> {
        let key = doc
            .get(fields::KEY)
            .ok_or_else(|| TypeError::MissingField(fields::KEY.into()))
            .and_then(BlobKey::from_value)?;
        let chunk_size = doc
            .get_u64(fields::CHUNK_SIZE)?
            .ok_or_else(|| TypeError::MissingField(fields::CHUNK_SIZE.into()))?;
        if chunk_size == 0 {
            return Err(GridError::corruption(&key, "chunk size is zero"));
        }
        let upload_date = match doc.get(fields::UPLOAD_DATE) {
            None | Some(Value::Null) => None,
            Some(Value::Timestamp(t)) => Some(*t),
            Some(other) => {
                return Err(TypeError::FieldType {
                    field: fields::UPLOAD_DATE.into(),
                    expected: "timestamp",
                    actual: other.type_name(),
                }
                .into())
            }
        };

        let mut meta = Self {
            filename: doc.get_str(fields::FILENAME)?.map(str::to_string),
            content_type: doc.get_str(fields::CONTENT_TYPE)?.map(str::to_string),
            length: doc.get_u64(fields::LENGTH)?,
            checksum: doc.get_str(fields::CHECKSUM)?.map(str::to_string),
            upload_date,
            chunk_size,
            key,
            extra: BTreeMap::new(),
        };
        meta.extra = doc
            .into_iter()
            .filter(|(name, _)| !fields::is_known(name))
            .collect();
        Ok(meta)
    }
}

fn optional_string(field: &str, value: Value) -> GridResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(TypeError::FieldType {
            field: field.to_string(),
            expected: "string",
            actual: other.type_name(),
        }
        .into()),
    }
}
