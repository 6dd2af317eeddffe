use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;
use crate::value::Value;

/// Opaque unique key of a stored blob.
///
/// Generated keys are time-ordered UUIDv7 strings; callers may also supply
/// their own key, in which case uniqueness is enforced by the store at
/// insert time.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobKey(String);

impl BlobKey {
    /// Generate a fresh key.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Wrap a caller-supplied key.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 8 characters) for logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// The key as a document value.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }

    /// Read a key back from a document value.
    pub fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::String(s) => Self::new(s.clone()),
            other => Err(TypeError::FieldType {
                field: crate::ID_FIELD.to_string(),
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.short())
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BlobKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<BlobKey> for Value {
    fn from(key: BlobKey) -> Self {
        Value::String(key.0)
    }
}

impl From<&BlobKey> for Value {
    fn from(key: &BlobKey) -> Self {
        key.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = BlobKey::generate();
        let b = BlobKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(BlobKey::new("").unwrap_err(), TypeError::EmptyKey);
    }

    #[test]
    fn short_is_eight_chars() {
        let key = BlobKey::new("0123456789abcdef").unwrap();
        assert_eq!(key.short(), "01234567");
        let tiny = BlobKey::new("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn value_roundtrip() {
        let key = BlobKey::generate();
        let parsed = BlobKey::from_value(&key.to_value()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn non_string_value_is_rejected() {
        let err = BlobKey::from_value(&Value::Int(3)).unwrap_err();
        assert!(matches!(err, TypeError::FieldType { actual: "int", .. }));
    }

    #[test]
    fn display_is_full_key() {
        let key = BlobKey::new("report-2024").unwrap();
        assert_eq!(format!("{key}"), "report-2024");
        assert_eq!(format!("{key:?}"), "BlobKey(report-2)");
    }

    #[test]
    fn parse_from_str() {
        let key: BlobKey = "abc".parse().unwrap();
        assert_eq!(key.as_str(), "abc");
    }
}
