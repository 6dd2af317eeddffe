use serde::{Deserialize, Serialize};

/// Direction of a sort key or index key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Numeric suffix used in generated index names.
    fn suffix(&self) -> i8 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Ordered list of sort keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sort {
    pub keys: Vec<(String, SortOrder)>,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), SortOrder::Ascending)],
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), SortOrder::Descending)],
        }
    }

    /// Append a secondary sort key.
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push((field.into(), order));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Options for [`Collection::find`](crate::Collection::find).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return; `0` means no limit.
    pub limit: u64,
    /// Result ordering; natural (insertion) order when `None`.
    pub sort: Option<Sort>,
    /// Ask the server not to time out an idle cursor.
    pub no_cursor_timeout: bool,
}

impl FindOptions {
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_no_cursor_timeout(mut self, no_timeout: bool) -> Self {
        self.no_cursor_timeout = no_timeout;
        self
    }
}

/// Specification of a secondary index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortOrder)>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(keys: Vec<(String, SortOrder)>) -> Self {
        Self {
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Conventional index name, e.g. `blob_id_1_n_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{field}_{}", order.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Whether `other` indexes the same keys in the same order.
    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys
    }
}

/// Write acknowledgment setting of a store or collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConcern {
    /// Whether the store confirms each write before returning.
    pub acknowledged: bool,
}

impl WriteConcern {
    pub const ACKNOWLEDGED: Self = Self { acknowledged: true };
    pub const UNACKNOWLEDGED: Self = Self {
        acknowledged: false,
    };
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self::ACKNOWLEDGED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_follows_keys() {
        let spec = IndexSpec::new(vec![
            ("filename".into(), SortOrder::Ascending),
            ("upload_date".into(), SortOrder::Descending),
        ]);
        assert_eq!(spec.name(), "filename_1_upload_date_-1");
        assert!(!spec.unique);
        assert!(spec.clone().unique().unique);
    }

    #[test]
    fn same_keys_ignores_uniqueness() {
        let a = IndexSpec::new(vec![("n".into(), SortOrder::Ascending)]);
        let b = a.clone().unique();
        assert!(a.same_keys(&b));
    }

    #[test]
    fn default_find_options() {
        let opts = FindOptions::default();
        assert_eq!(opts.skip, 0);
        assert_eq!(opts.limit, 0);
        assert!(opts.sort.is_none());
        assert!(!opts.no_cursor_timeout);
    }

    #[test]
    fn sort_builder() {
        let sort = Sort::descending("upload_date").then("_id", SortOrder::Ascending);
        assert_eq!(sort.keys.len(), 2);
        assert_eq!(sort.keys[0].1, SortOrder::Descending);
    }

    #[test]
    fn write_concern_defaults_to_acknowledged() {
        assert!(WriteConcern::default().acknowledged);
        assert!(!WriteConcern::UNACKNOWLEDGED.acknowledged);
    }
}
