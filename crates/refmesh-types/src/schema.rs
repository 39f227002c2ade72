//! Static schema metadata: which fields a document type declares, which of
//! them are references, and what type each reference points to.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::ID_FIELD;
use crate::error::{PathFault, TypeError, TypeResult};
use crate::value::Value;

/// Declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// Single-valued pointer to a document of type `target`.
    Reference { target: String },
}

/// Metadata for one declared field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub ty: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
}

impl FieldSpec {
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            required: false,
            unique: false,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self::new(FieldType::Reference {
            target: target.into(),
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.ty, FieldType::Reference { .. })
    }

    /// Target document type, for reference fields.
    pub fn target(&self) -> Option<&str> {
        match &self.ty {
            FieldType::Reference { target } => Some(target),
            _ => None,
        }
    }

    /// Whether `value` may be stored in this field. `Null` always may.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (&self.ty, value),
            (_, Value::Null)
                | (FieldType::String, Value::String(_))
                | (FieldType::Integer, Value::Int(_))
                | (FieldType::Float, Value::Float(_) | Value::Int(_))
                | (FieldType::Boolean, Value::Bool(_))
                | (FieldType::Timestamp, Value::Timestamp(_))
                | (FieldType::Reference { .. }, Value::Ref(_) | Value::Embedded(_))
        )
    }
}

/// The field-access table of one document type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    name: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl DocumentSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declare a field (builder style).
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.get(field)
    }

    /// `true` for declared fields and the implicit `_id`.
    pub fn declares(&self, field: &str) -> bool {
        field == ID_FIELD || self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All reference fields with their target types.
    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| Some((k.as_str(), v.target()?)))
    }
}

/// All known document types.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, Arc<DocumentSchema>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn get(&self, doc_type: &str) -> TypeResult<&Arc<DocumentSchema>> {
        self.types
            .get(doc_type)
            .ok_or_else(|| TypeError::UnknownType(doc_type.to_string()))
    }

    pub fn contains(&self, doc_type: &str) -> bool {
        self.types.contains_key(doc_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Check one segment of `path` on `doc_type`.
    ///
    /// Returns the target type when the field is a reference. Fails when the
    /// field is undeclared, or when it is not a reference and `more` segments
    /// follow. Both path declaration and path resolution go through here.
    pub fn step<'a>(
        &'a self,
        path: &str,
        doc_type: &str,
        field: &str,
        more: bool,
    ) -> TypeResult<Option<&'a str>> {
        if field.is_empty() {
            return Err(TypeError::bad_path(path, PathFault::Empty));
        }
        let schema = self.get(doc_type)?;
        if field == ID_FIELD && !more {
            return Ok(None);
        }
        let spec = schema.get(field).ok_or_else(|| {
            TypeError::bad_path(
                path,
                PathFault::UndeclaredField {
                    doc_type: doc_type.to_string(),
                    field: field.to_string(),
                },
            )
        })?;
        match spec.target() {
            Some(target) => Ok(Some(target)),
            None if more => Err(TypeError::bad_path(
                path,
                PathFault::NotAReference {
                    doc_type: doc_type.to_string(),
                    field: field.to_string(),
                },
            )),
            None => Ok(None),
        }
    }

    /// Validate a dotted path starting at `root`.
    pub fn verify_path(&self, root: &str, path: &str) -> TypeResult<()> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut doc_type = root.to_string();
        for (i, segment) in segments.iter().enumerate() {
            let more = i + 1 < segments.len();
            match self.step(path, &doc_type, segment, more)? {
                Some(target) => doc_type = target.to_string(),
                None => break,
            }
        }
        Ok(())
    }
}

/// Collects schemas and checks cross-references on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<DocumentSchema>,
}

impl SchemaRegistryBuilder {
    pub fn register(mut self, schema: DocumentSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn build(self) -> TypeResult<SchemaRegistry> {
        let mut types = BTreeMap::new();
        for schema in self.schemas {
            if types.contains_key(schema.name()) {
                return Err(TypeError::DuplicateType(schema.name().to_string()));
            }
            types.insert(schema.name().to_string(), Arc::new(schema));
        }
        for schema in types.values() {
            for (field, target) in schema.references() {
                if !types.contains_key(target) {
                    return Err(TypeError::DanglingTarget {
                        doc_type: schema.name().to_string(),
                        field: field.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(SchemaRegistry { types })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(
                DocumentSchema::new("Project")
                    .field("title", FieldSpec::string())
                    .field("owner", FieldSpec::reference("User").required())
                    .field("main_document", FieldSpec::reference("Document")),
            )
            .register(
                DocumentSchema::new("Document")
                    .field("project", FieldSpec::reference("Project"))
                    .field("filename", FieldSpec::string())
                    .field("owner", FieldSpec::reference("User")),
            )
            .register(
                DocumentSchema::new("User")
                    .field("username", FieldSpec::string().required())
                    .field("email", FieldSpec::string().required().unique()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn valid_paths_pass() {
        let reg = registry();
        reg.verify_path("Project", "owner").unwrap();
        reg.verify_path("Project", "main_document.owner").unwrap();
        reg.verify_path("Project", "main_document.project.main_document.filename")
            .unwrap();
        reg.verify_path("Project", "title").unwrap();
        reg.verify_path("Project", "_id").unwrap();
    }

    #[test]
    fn undeclared_field_is_a_path_error() {
        let err = registry()
            .verify_path("Project", "does_not_exist")
            .unwrap_err();
        assert!(err.is_path_error());
        assert!(err.to_string().starts_with("Bad path does_not_exist"));
    }

    #[test]
    fn crossing_a_scalar_is_a_path_error() {
        let err = registry().verify_path("Project", "title.length").unwrap_err();
        assert_eq!(
            err,
            TypeError::BadPath {
                path: "title.length".into(),
                fault: PathFault::NotAReference {
                    doc_type: "Project".into(),
                    field: "title".into(),
                },
            }
        );
    }

    #[test]
    fn undeclared_field_on_target_type() {
        let err = registry()
            .verify_path("Project", "main_document.nope")
            .unwrap_err();
        assert!(matches!(
            err,
            TypeError::BadPath { fault: PathFault::UndeclaredField { ref doc_type, .. }, .. }
                if doc_type == "Document"
        ));
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(registry().verify_path("Project", "").unwrap_err().is_path_error());
        assert!(registry()
            .verify_path("Project", "owner..email")
            .unwrap_err()
            .is_path_error());
    }

    #[test]
    fn builder_rejects_dangling_targets() {
        let err = SchemaRegistry::builder()
            .register(DocumentSchema::new("A").field("b", FieldSpec::reference("B")))
            .build()
            .unwrap_err();
        assert!(matches!(err, TypeError::DanglingTarget { .. }));
    }

    #[test]
    fn builder_rejects_duplicates() {
        let err = SchemaRegistry::builder()
            .register(DocumentSchema::new("A"))
            .register(DocumentSchema::new("A"))
            .build()
            .unwrap_err();
        assert_eq!(err, TypeError::DuplicateType("A".into()));
    }

    #[test]
    fn unknown_root_type() {
        assert_eq!(
            registry().verify_path("Nope", "x"),
            Err(TypeError::UnknownType("Nope".into()))
        );
    }

    #[test]
    fn field_type_acceptance() {
        assert!(FieldSpec::float().accepts(&Value::Int(1)));
        assert!(!FieldSpec::integer().accepts(&Value::Float(1.0)));
        assert!(FieldSpec::reference("User").accepts(&Value::Null));
        assert!(!FieldSpec::reference("User").accepts(&Value::from("x")));
    }
}
