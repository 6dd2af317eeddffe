use std::cmp::Ordering;

use tessera_types::{Document, Value};

/// Predicate applied to a single field.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Field equals the value. A missing field equals `Null`.
    Eq(Value),
    /// Field differs from the value.
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Field is present (`true`) or absent (`false`).
    Exists(bool),
}

impl Condition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => actual.unwrap_or(&Value::Null) == expected,
            Self::Ne(expected) => actual.unwrap_or(&Value::Null) != expected,
            Self::Gt(bound) => compare(actual, bound, |o| o == Ordering::Greater),
            Self::Gte(bound) => compare(actual, bound, |o| o != Ordering::Less),
            Self::Lt(bound) => compare(actual, bound, |o| o == Ordering::Less),
            Self::Lte(bound) => compare(actual, bound, |o| o != Ordering::Greater),
            Self::Exists(wanted) => actual.is_some() == *wanted,
        }
    }
}

/// Range comparisons only match values of the same type bracket.
fn compare(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    actual
        .and_then(|v| v.compare_same_kind(bound))
        .is_some_and(accept)
}

/// Conjunction of field conditions. An empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter with a single equality clause.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, Condition::Eq(value.into()))
    }

    /// Add a clause.
    pub fn and(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((field.into(), condition));
        self
    }

    /// Add an equality clause.
    pub fn and_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(field, Condition::Eq(value.into()))
    }

    /// Merge the clauses of another filter into this one.
    pub fn merge(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(doc.get(field)))
    }
}
