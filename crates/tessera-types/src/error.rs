use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("blob key must not be empty")]
    EmptyKey,

    #[error("field `{field}` has type {actual}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("missing required field `{0}`")]
    MissingField(String),
}
