use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use refmesh_types::{DocId, RawDocument, SchemaRegistry, Value};

use crate::conditions::Conditions;
use crate::error::{DriverError, DriverResult};
use crate::options::FindOptions;
use crate::traits::Driver;

type Collection = BTreeMap<DocId, RawDocument>;

/// In-memory, map-based driver.
///
/// Intended for tests and embedding. Enforces the schema's `required` and
/// `unique` flags on save and populates single-segment reference paths
/// natively, the way a document database driver would.
pub struct InMemoryDriver {
    registry: Arc<SchemaRegistry>,
    collections: RwLock<HashMap<String, Collection>>,
    connected: AtomicBool,
    injected: Mutex<Option<DriverError>>,
    reads: AtomicUsize,
}

impl InMemoryDriver {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let collections = registry
            .names()
            .map(|name| (name.to_string(), Collection::new()))
            .collect();
        Self {
            registry,
            collections: RwLock::new(collections),
            connected: AtomicBool::new(false),
            injected: Mutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    /// Make the next driver call fail with `error`.
    pub fn fail_next(&self, error: DriverError) {
        *self.injected.lock().expect("lock poisoned") = Some(error);
    }

    /// Number of read round-trips served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of stored records of `doc_type`.
    pub fn len(&self, doc_type: &str) -> usize {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(doc_type)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.collections
            .read()
            .expect("lock poisoned")
            .values()
            .all(BTreeMap::is_empty)
    }

    /// Remove every record of every type.
    pub fn clear(&self) {
        for collection in self.collections.write().expect("lock poisoned").values_mut() {
            collection.clear();
        }
    }

    fn begin(&self) -> DriverResult<()> {
        if let Some(err) = self.injected.lock().expect("lock poisoned").take() {
            return Err(err);
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        Ok(())
    }

    fn matching(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<Vec<RawDocument>> {
        let map = self.collections.read().expect("lock poisoned");
        let collection = map
            .get(doc_type)
            .ok_or_else(|| DriverError::UnknownCollection(doc_type.to_string()))?;
        Ok(collection
            .values()
            .filter(|doc| conditions.matches(doc))
            .cloned()
            .collect())
    }

    /// Replace single-segment reference paths with the stored target record.
    fn populate_native(&self, doc: &mut RawDocument, paths: &[String]) {
        let Ok(schema) = self.registry.get(&doc.doc_type) else {
            return;
        };
        let map = self.collections.read().expect("lock poisoned");
        for path in paths.iter().filter(|p| !p.contains('.')) {
            let Some(target) = schema.get(path).and_then(|spec| spec.target()) else {
                continue;
            };
            let Some(Value::Ref(id)) = doc.fields.get(path) else {
                continue;
            };
            if let Some(found) = map.get(target).and_then(|c| c.get(id)) {
                let embedded = Value::Embedded(Box::new(found.clone()));
                doc.fields.insert(path.clone(), embedded);
            }
        }
    }

    fn check_constraints(&self, doc: &RawDocument, collection: &Collection) -> DriverResult<()> {
        let schema = self
            .registry
            .get(&doc.doc_type)
            .map_err(|_| DriverError::UnknownCollection(doc.doc_type.clone()))?;

        if let Some(field) = doc.fields.keys().find(|f| schema.get(f).is_none()) {
            return Err(DriverError::InvalidDocument(format!(
                "{} has no field {field:?}",
                doc.doc_type
            )));
        }

        for (field, spec) in schema.fields() {
            let value = doc.fields.get(field).filter(|v| !v.is_null());
            if spec.required && value.is_none() {
                return Err(DriverError::MissingRequired {
                    doc_type: doc.doc_type.clone(),
                    field: field.to_string(),
                });
            }
            if let (true, Some(value)) = (spec.unique, value) {
                let clash = collection.values().find(|other| {
                    other.id != doc.id
                        && other.fields.get(field).is_some_and(|v| v.loose_eq(value))
                });
                if let Some(other) = clash {
                    return Err(DriverError::DuplicateKey {
                        doc_type: doc.doc_type.clone(),
                        field: field.to_string(),
                        existing: other.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.collections.read().expect("lock poisoned");
        let counts: BTreeMap<&str, usize> = map.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("InMemoryDriver")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("collections", &counts)
            .finish()
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    async fn open(&self) -> DriverResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn find(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<Vec<RawDocument>> {
        self.begin()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let docs = options.window(self.matching(doc_type, conditions)?);
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut doc = match &options.projection {
                Some(fields) => doc.project(fields),
                None => doc,
            };
            self.populate_native(&mut doc, &options.populate);
            out.push(doc);
        }
        debug!(doc_type, results = out.len(), "find");
        Ok(out)
    }

    async fn find_by_id(
        &self,
        doc_type: &str,
        id: &DocId,
        options: &FindOptions,
    ) -> DriverResult<Option<RawDocument>> {
        self.begin()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let found = {
            let map = self.collections.read().expect("lock poisoned");
            map.get(doc_type)
                .ok_or_else(|| DriverError::UnknownCollection(doc_type.to_string()))?
                .get(id)
                .cloned()
        };
        Ok(found.map(|doc| {
            let mut doc = match &options.projection {
                Some(fields) => doc.project(fields),
                None => doc,
            };
            self.populate_native(&mut doc, &options.populate);
            doc
        }))
    }

    async fn count(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64> {
        self.begin()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(doc_type, conditions)?.len() as u64)
    }

    async fn distinct(
        &self,
        doc_type: &str,
        field: &str,
        conditions: &Conditions,
    ) -> DriverResult<Vec<Value>> {
        self.begin()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut seen: Vec<Value> = Vec::new();
        for doc in self.matching(doc_type, conditions)? {
            if let Some(v) = doc.get(field) {
                if !seen.iter().any(|s| s.loose_eq(&v)) {
                    seen.push(v);
                }
            }
        }
        Ok(seen)
    }

    async fn save(&self, doc: &RawDocument) -> DriverResult<RawDocument> {
        self.begin()?;
        let stored = doc.dehydrated();
        let mut map = self.collections.write().expect("lock poisoned");
        let collection = map
            .get_mut(&stored.doc_type)
            .ok_or_else(|| DriverError::UnknownCollection(stored.doc_type.clone()))?;
        self.check_constraints(&stored, collection)?;
        collection.insert(stored.id.clone(), stored.clone());
        debug!(doc_type = %stored.doc_type, id = %stored.id, "saved");
        Ok(stored)
    }

    async fn update(
        &self,
        doc_type: &str,
        id: &DocId,
        fields: &BTreeMap<String, Value>,
    ) -> DriverResult<RawDocument> {
        self.begin()?;
        let mut map = self.collections.write().expect("lock poisoned");
        let collection = map
            .get_mut(doc_type)
            .ok_or_else(|| DriverError::UnknownCollection(doc_type.to_string()))?;
        let mut merged = collection
            .get(id)
            .cloned()
            .ok_or_else(|| DriverError::NotFound {
                doc_type: doc_type.to_string(),
                id: id.clone(),
            })?;
        merged
            .fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.dehydrated())));
        self.check_constraints(&merged, collection)?;
        collection.insert(id.clone(), merged.clone());
        debug!(doc_type, id = %id, fields = fields.len(), "updated");
        Ok(merged)
    }

    async fn remove(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64> {
        self.begin()?;
        let mut map = self.collections.write().expect("lock poisoned");
        let collection = map
            .get_mut(doc_type)
            .ok_or_else(|| DriverError::UnknownCollection(doc_type.to_string()))?;
        let before = collection.len();
        collection.retain(|_, doc| !conditions.matches(doc));
        Ok((before - collection.len()) as u64)
    }
}
