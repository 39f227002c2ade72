//! Foundation types for refmesh.
//!
//! Every other refmesh crate depends on `refmesh-types`.
//!
//! # Key Types
//!
//! - [`DocId`]: Canonical 24-character document identifier
//! - [`ObjectId`]: Driver-native 12-byte identifier
//! - [`Value`]: A stored field value, including references
//! - [`RawDocument`]: A stored record as the driver sees it
//! - [`SchemaRegistry`]: Field metadata for every document type
//! - [`PopulatePath`]: A schema-checked, dot-delimited reference path

pub mod document;
pub mod error;
pub mod id;
pub mod path;
pub mod schema;
pub mod value;

pub use document::{RawDocument, ID_FIELD};
pub use error::{PathFault, TypeError, TypeResult};
pub use id::{ids_equal, to_id, DocId, ObjectId, ToDocId};
pub use path::PopulatePath;
pub use schema::{DocumentSchema, FieldSpec, FieldType, SchemaRegistry, SchemaRegistryBuilder};
pub use value::Value;
