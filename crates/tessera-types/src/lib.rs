//! Foundation types for Tessera.
//!
//! Every Tessera crate exchanges records with the backing document store
//! through the types defined here.
//!
//! # Key Types
//!
//! - [`Value`] -- a single field value (string, integer, raw binary, timestamp, ...)
//! - [`Document`] -- an ordered map of field names to values
//! - [`BlobKey`] -- opaque unique key of a stored blob

pub mod document;
pub mod error;
pub mod key;
pub mod value;

pub use document::{Document, ID_FIELD};
pub use error::TypeError;
pub use key::BlobKey;
pub use value::Value;
