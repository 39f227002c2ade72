//! Object-document mapping for refmesh.
//!
//! Documents are shared, mutable handles. Reference fields resolve into the
//! handles they point to, across as many hops as a populate path names, and
//! a change made through any path in the resulting graph is visible through
//! every other path to the same handle.
//!
//! This is the main entry point for applications: open a [`Session`] over a
//! [`Driver`], take a [`Model`] per document type, and build queries.

pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod populate;
pub mod query;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;

pub use completion::{Completion, OrPanic};
pub use config::OdmConfig;
pub use document::{Document, Field, Wrap};
pub use error::{OdmError, OdmResult};
pub use model::Model;
pub use populate::{Populator, Resolution};
pub use query::{DocumentStream, Many, One, Query};
pub use session::Session;

// Re-export key types
pub use refmesh_store::{Conditions, Driver, DriverError, Filter, InMemoryDriver, SortOrder};
pub use refmesh_types::{
    ids_equal, to_id, DocId, DocumentSchema, FieldSpec, FieldType, ObjectId, PopulatePath,
    RawDocument, SchemaRegistry, ToDocId, TypeError, Value,
};
