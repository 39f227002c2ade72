use std::fmt;

use thiserror::Error;

/// Why a populate path (or a condition path) was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathFault {
    /// The path string was empty or contained an empty segment.
    Empty,
    /// A segment names a field the document type does not declare.
    UndeclaredField { doc_type: String, field: String },
    /// A non-terminal segment names a field that is not a reference.
    NotAReference { doc_type: String, field: String },
}

impl fmt::Display for PathFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty segment"),
            Self::UndeclaredField { doc_type, field } => {
                write!(f, "{doc_type} has no field {field:?}")
            }
            Self::NotAReference { doc_type, field } => {
                write!(f, "{doc_type}.{field} is not a reference")
            }
        }
    }
}

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid document identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Bad path {path}: {fault}")]
    BadPath { path: String, fault: PathFault },

    #[error("unknown document type: {0}")]
    UnknownType(String),

    #[error("document type registered twice: {0}")]
    DuplicateType(String),

    #[error("{doc_type}.{field} references unregistered type {target}")]
    DanglingTarget {
        doc_type: String,
        field: String,
        target: String,
    },
}

impl TypeError {
    pub(crate) fn bad_path(path: &str, fault: PathFault) -> Self {
        Self::BadPath {
            path: path.to_string(),
            fault,
        }
    }

    /// Returns `true` for populate/condition path failures.
    pub fn is_path_error(&self) -> bool {
        matches!(self, Self::BadPath { .. })
    }
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
