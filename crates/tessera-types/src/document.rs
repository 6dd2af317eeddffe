use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::Value;

/// Name of the primary-key field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// A record in the backing store: field names mapped to [`Value`]s.
///
/// Fields are kept sorted by name so that two documents with the same
/// content compare and serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert a field, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The document's `_id`, if set.
    pub fn id(&self) -> Option<&Value> {
        self.0.get(ID_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read an optional string field. `Null` reads as absent.
    pub fn get_str(&self, field: &str) -> Result<Option<&str>, TypeError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_error(field, "string", other)),
        }
    }

    /// Read an optional non-negative integer field. `Null` reads as absent.
    pub fn get_u64(&self, field: &str) -> Result<Option<u64>, TypeError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Int(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(type_error(field, "non-negative int", other)),
        }
    }

    /// Read a required binary field.
    pub fn get_binary(&self, field: &str) -> Result<&[u8], TypeError> {
        match self.0.get(field) {
            Some(Value::Binary(b)) => Ok(b),
            Some(other) => Err(type_error(field, "binary", other)),
            None => Err(TypeError::MissingField(field.to_string())),
        }
    }

    /// Consume the document and take ownership of a required binary field.
    pub fn take_binary(mut self, field: &str) -> Result<Vec<u8>, TypeError> {
        match self.0.remove(field) {
            Some(Value::Binary(b)) => Ok(b),
            Some(other) => Err(type_error(field, "binary", &other)),
            None => Err(TypeError::MissingField(field.to_string())),
        }
    }
}

fn type_error(field: &str, expected: &'static str, actual: &Value) -> TypeError {
    TypeError::FieldType {
        field: field.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
