use std::fmt;

use crate::error::TypeResult;
use crate::schema::SchemaRegistry;

/// A validated, dot-delimited populate path such as `main_document.owner`.
///
/// Every segment but the last crosses a reference into another document
/// type. Construction goes through [`PopulatePath::parse`], so a value of this
/// type has already been checked against the schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PopulatePath {
    path: String,
    segments: Vec<String>,
}

impl PopulatePath {
    pub fn parse(registry: &SchemaRegistry, root: &str, path: &str) -> TypeResult<Self> {
        registry.verify_path(root, path)?;
        Ok(Self {
            path: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// First segment, which is a field of the root type.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }
}

impl fmt::Display for PopulatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
