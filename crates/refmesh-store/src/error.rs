use refmesh_types::DocId;

/// Errors reported by a storage driver.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The driver has not been opened, or has been closed.
    #[error("driver is not connected")]
    NotConnected,

    /// No collection exists for the document type.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A required field was absent or null on save.
    #[error("validation failed: {doc_type}.{field} is required")]
    MissingRequired { doc_type: String, field: String },

    /// A unique field collided with another stored document.
    #[error("duplicate key: {doc_type}.{field} already used by {existing}")]
    DuplicateKey {
        doc_type: String,
        field: String,
        existing: DocId,
    },

    /// No stored record has this identifier.
    #[error("not found: {doc_type} {id}")]
    NotFound { doc_type: String, id: DocId },

    /// The document or query could not be interpreted.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
