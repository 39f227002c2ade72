use thiserror::Error;

use refmesh_store::DriverError;
use refmesh_types::TypeError;

#[derive(Debug, Error)]
pub enum OdmError {
    /// Identifier format, path, and schema errors.
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("database error: {operation} failed / {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("{doc_type} has no field {field:?}")]
    UnknownField { doc_type: String, field: String },

    #[error("{doc_type}.{field} expects {expected}, got {actual}")]
    TypeMismatch {
        doc_type: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("session is closed")]
    SessionClosed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OdmError {
    pub(crate) fn driver(operation: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| Self::Driver { operation, source }
    }

    /// Returns `true` for populate/condition path failures.
    pub fn is_path_error(&self) -> bool {
        matches!(self, Self::Type(e) if e.is_path_error())
    }

    /// The underlying driver failure, if this is one.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type OdmResult<T> = Result<T, OdmError>;
