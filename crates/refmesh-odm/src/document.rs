//! Document handles and the per-handle identity cache.
//!
//! A [`Document`] wraps one stored record. Cloning a handle shares the
//! record, so a mutation made through one path in an object graph is seen by
//! every other path that holds the same handle.
//!
//! Reference fields read back as one of three things:
//!
//! - the raw identifier, when the reference has not been resolved for this
//!   handle,
//! - the cached [`Document`] for that identifier, once it has been,
//! - nothing, when the reference is unset.
//!
//! The cache is keyed by identifier, not by field, so two fields of the same
//! document pointing at the same record share one handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use refmesh_types::{
    DocId, DocumentSchema, RawDocument, SchemaRegistry, ToDocId, Value, ID_FIELD,
};

use crate::error::{OdmError, OdmResult};

/// What a field read produced.
#[derive(Clone, Debug)]
pub enum Field {
    /// Unset or null.
    Missing,
    /// A scalar value.
    Value(Value),
    /// An unresolved reference.
    Id(DocId),
    /// A resolved reference.
    Linked(Document),
}

impl Field {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Linked(d) => Some(d),
            _ => None,
        }
    }

    /// The referenced identifier, resolved or not.
    pub fn ref_id(&self) -> Option<DocId> {
        match self {
            Self::Id(id) => Some(id.clone()),
            Self::Linked(d) => Some(d.id()),
            _ => None,
        }
    }
}

struct State {
    raw: RawDocument,
    linked: HashMap<DocId, Document>,
    modified: bool,
    partial: bool,
}

/// Shared handle to one stored document.
#[derive(Clone)]
pub struct Document {
    state: Arc<RwLock<State>>,
    schema: Arc<DocumentSchema>,
    registry: Arc<SchemaRegistry>,
}

impl Document {
    /// Wrap a raw record. Fails if its type is not registered.
    pub fn wrap(raw: RawDocument, registry: &Arc<SchemaRegistry>) -> OdmResult<Self> {
        let schema = Arc::clone(registry.get(&raw.doc_type)?);
        Ok(Self {
            state: Arc::new(RwLock::new(State {
                raw,
                linked: HashMap::new(),
                modified: false,
                partial: false,
            })),
            schema,
            registry: Arc::clone(registry),
        })
    }

    /// A new, unsaved document with a freshly generated identifier.
    pub fn create(doc_type: &str, registry: &Arc<SchemaRegistry>) -> OdmResult<Self> {
        let doc = Self::wrap(RawDocument::new(doc_type, DocId::generate()), registry)?;
        doc.write().modified = true;
        Ok(doc)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().expect("lock poisoned")
    }

    /// The canonical identifier.
    pub fn id(&self) -> DocId {
        self.read().raw.id.clone()
    }

    pub fn doc_type(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// `true` if both handles share the same underlying state.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Changed since it was wrapped or last saved.
    pub fn is_modified(&self) -> bool {
        self.read().modified
    }

    /// Loaded through a field projection, so fields may be absent here but
    /// present in the store. Saving such a handle only writes what it holds.
    pub fn is_partial(&self) -> bool {
        self.read().partial
    }

    /// Number of resolved references held in the identity cache.
    pub fn cached_links(&self) -> usize {
        self.read().linked.len()
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> OdmResult<Field> {
        if field == ID_FIELD {
            return Ok(Field::Value(Value::String(self.id().to_string())));
        }
        let spec = self.schema.get(field).ok_or_else(|| self.unknown(field))?;
        if !spec.is_reference() {
            return Ok(match self.read().raw.fields.get(field) {
                None | Some(Value::Null) => Field::Missing,
                Some(v) => Field::Value(v.clone()),
            });
        }

        let mut state = self.write();
        let current = state.raw.fields.get(field).cloned();
        match current {
            None | Some(Value::Null) => Ok(Field::Missing),
            Some(Value::Ref(id)) => Ok(match state.linked.get(&id) {
                Some(doc) => Field::Linked(doc.clone()),
                None => Field::Id(id),
            }),
            Some(Value::Embedded(raw)) => {
                let id = raw.id.clone();
                if let Some(doc) = state.linked.get(&id) {
                    return Ok(Field::Linked(doc.clone()));
                }
                if spec.target() != Some(raw.doc_type.as_str()) {
                    return Ok(Field::Id(id));
                }
                // Driver-populated record: wrap it once and keep only the id
                // in the raw fields.
                let doc = Document::wrap(*raw, &self.registry)?;
                state.raw.fields.insert(field.to_string(), Value::Ref(id.clone()));
                state.linked.insert(id, doc.clone());
                Ok(Field::Linked(doc))
            }
            // Drivers without a native reference type hand back id strings.
            Some(other) => Ok(match other.doc_id() {
                Some(id) => match state.linked.get(&id) {
                    Some(doc) => Field::Linked(doc.clone()),
                    None => Field::Id(id),
                },
                None => Field::Value(other),
            }),
        }
    }

    /// The resolved document behind a reference field, if resolved.
    pub fn link(&self, field: &str) -> OdmResult<Option<Document>> {
        Ok(match self.get(field)? {
            Field::Linked(doc) => Some(doc),
            _ => None,
        })
    }

    pub fn get_value(&self, field: &str) -> OdmResult<Option<Value>> {
        Ok(self.get(field)?.as_value().cloned())
    }

    /// String fields, and the identifier behind a reference field.
    pub fn get_str(&self, field: &str) -> OdmResult<Option<String>> {
        Ok(match self.get(field)? {
            Field::Value(Value::String(s)) => Some(s),
            other => other.ref_id().map(String::from),
        })
    }

    pub fn get_i64(&self, field: &str) -> OdmResult<Option<i64>> {
        Ok(self.get(field)?.as_value().and_then(Value::as_i64))
    }

    pub fn get_f64(&self, field: &str) -> OdmResult<Option<f64>> {
        Ok(self.get(field)?.as_value().and_then(Value::as_f64))
    }

    pub fn get_bool(&self, field: &str) -> OdmResult<Option<bool>> {
        Ok(self.get(field)?.as_value().and_then(Value::as_bool))
    }

    /// Write a scalar, a bare identifier, or null.
    ///
    /// On a reference field, strings are parsed as identifiers and the link
    /// for the previous identifier is dropped from the cache.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> OdmResult<()> {
        let value = value.into();
        let spec = self.settable(field)?;
        let value = if spec.is_reference() {
            match value {
                Value::Null | Value::Ref(_) => value,
                Value::String(s) => Value::Ref(DocId::parse(&s)?),
                other => return Err(self.mismatch(field, "reference id", other.kind())),
            }
        } else if spec.accepts(&value) {
            value
        } else {
            return Err(self.mismatch(field, &format!("{:?}", spec.ty), value.kind()));
        };

        let mut state = self.write();
        let previous = state.raw.fields.insert(field.to_string(), value);
        if let Some(old) = previous.as_ref().and_then(ToDocId::doc_id) {
            if spec.is_reference() {
                invalidate(&mut state, &self.schema, field, &old);
            }
        }
        state.modified = true;
        Ok(())
    }

    /// Point a reference field at another handle.
    ///
    /// The handle is cached under its identifier and the identifier is
    /// written to the stored field.
    pub fn set_document(&self, field: &str, doc: &Document) -> OdmResult<()> {
        let spec = self.settable(field)?;
        match spec.target() {
            Some(target) if target == doc.doc_type() => {}
            Some(target) => return Err(self.mismatch(field, target, doc.doc_type())),
            None => return Err(self.mismatch(field, &format!("{:?}", spec.ty), "document")),
        }
        self.link_to(field, doc);
        self.write().modified = true;
        Ok(())
    }

    /// Record a resolved reference without marking the document modified.
    ///
    /// Returns `false` if the field no longer holds `doc`'s identifier.
    pub(crate) fn attach(&self, field: &str, doc: &Document) -> bool {
        let id = doc.id();
        let holds = {
            let state = self.read();
            state.raw.fields.get(field).and_then(ToDocId::doc_id) == Some(id)
        };
        if holds {
            self.link_to(field, doc);
        }
        holds
    }

    fn link_to(&self, field: &str, doc: &Document) {
        // Read the child id before locking self: `doc` may be `self`.
        let id = doc.id();
        let mut state = self.write();
        let previous = state
            .raw
            .fields
            .insert(field.to_string(), Value::Ref(id.clone()));
        if let Some(old) = previous.as_ref().and_then(ToDocId::doc_id) {
            if old != id {
                invalidate(&mut state, &self.schema, field, &old);
            }
        }
        debug!(doc_type = %self.schema.name(), field, target = %id, "linked reference");
        state.linked.insert(id, doc.clone());
    }

    /// Snapshot of the stored form, with references as identifiers.
    pub fn to_raw(&self) -> RawDocument {
        self.read().raw.dehydrated()
    }

    pub(crate) fn mark_saved(&self) {
        self.write().modified = false;
    }

    pub(crate) fn mark_partial(&self) {
        self.write().partial = true;
    }

    fn settable(&self, field: &str) -> OdmResult<&refmesh_types::FieldSpec> {
        if field == ID_FIELD {
            return Err(self.mismatch(field, "read-only identifier", "write"));
        }
        self.schema.get(field).ok_or_else(|| self.unknown(field))
    }

    fn unknown(&self, field: &str) -> OdmError {
        OdmError::UnknownField {
            doc_type: self.schema.name().to_string(),
            field: field.to_string(),
        }
    }

    fn mismatch(&self, field: &str, expected: &str, actual: &str) -> OdmError {
        OdmError::TypeMismatch {
            doc_type: self.schema.name().to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Drop the cache entry for `old` unless a reference field other than
/// `field` still points at it.
fn invalidate(state: &mut State, schema: &DocumentSchema, field: &str, old: &DocId) {
    let still_used = schema.references().any(|(name, _)| {
        name != field
            && state
                .raw
                .fields
                .get(name)
                .and_then(ToDocId::doc_id)
                .as_ref()
                == Some(old)
    });
    if !still_used {
        state.linked.remove(old);
    }
}

impl ToDocId for Document {
    fn doc_id(&self) -> Option<DocId> {
        Some(self.id())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Document")
            .field("doc_type", &state.raw.doc_type)
            .field("id", &state.raw.id)
            .field("linked", &state.linked.len())
            .field("modified", &state.modified)
            .finish()
    }
}

/// Values that can be turned into document handles.
///
/// Wrapping an existing handle is a no-op; sequences wrap element-wise with
/// no cache shared between elements.
pub trait Wrap {
    type Output;

    fn wrap(self, registry: &Arc<SchemaRegistry>) -> OdmResult<Self::Output>;
}

impl Wrap for RawDocument {
    type Output = Document;

    fn wrap(self, registry: &Arc<SchemaRegistry>) -> OdmResult<Document> {
        Document::wrap(self, registry)
    }
}

impl Wrap for Document {
    type Output = Document;

    fn wrap(self, _registry: &Arc<SchemaRegistry>) -> OdmResult<Document> {
        Ok(self)
    }
}

impl<T: Wrap> Wrap for Vec<T> {
    type Output = Vec<T::Output>;

    fn wrap(self, registry: &Arc<SchemaRegistry>) -> OdmResult<Self::Output> {
        self.into_iter().map(|item| item.wrap(registry)).collect()
    }
}

impl<T: Wrap> Wrap for Option<T> {
    type Output = Option<T::Output>;

    fn wrap(self, registry: &Arc<SchemaRegistry>) -> OdmResult<Self::Output> {
        self.map(|item| item.wrap(registry)).transpose()
    }
}
