//! Shared test fixtures: the Project / Document / User schemas and sessions
//! backed by the in-memory driver.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use refmesh_store::{
    Conditions, Driver, DriverResult, FindOptions, InMemoryDriver, RawStream,
};
use refmesh_types::{DocId, DocumentSchema, FieldSpec, RawDocument, SchemaRegistry, Value};

use crate::config::OdmConfig;
use crate::session::Session;

pub(crate) fn registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::builder()
            .register(
                DocumentSchema::new("Project")
                    .field("title", FieldSpec::string())
                    .field("owner", FieldSpec::reference("User").required())
                    .field("main_document", FieldSpec::reference("Document")),
            )
            .register(
                DocumentSchema::new("Document")
                    .field("project", FieldSpec::reference("Project").required())
                    .field("body", FieldSpec::string())
                    .field("filename", FieldSpec::string())
                    .field("owner", FieldSpec::reference("User"))
                    .field("reviewer", FieldSpec::reference("User")),
            )
            .register(
                DocumentSchema::new("User")
                    .field("username", FieldSpec::string().required())
                    .field("email", FieldSpec::string().required().unique())
                    .field("favorite_document", FieldSpec::reference("Document"))
                    .field("best_friend", FieldSpec::reference("User"))
                    .field("password", FieldSpec::string()),
            )
            .build()
            .unwrap(),
    )
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// An open session over a fresh in-memory driver.
pub(crate) async fn session() -> (Session, Arc<InMemoryDriver>) {
    session_with(OdmConfig::default()).await
}

pub(crate) async fn session_with(config: OdmConfig) -> (Session, Arc<InMemoryDriver>) {
    init_tracing();
    let registry = registry();
    let driver = Arc::new(InMemoryDriver::new(Arc::clone(&registry)));
    let session = Session::open(driver.clone(), registry, config)
        .await
        .unwrap();
    (session, driver)
}

/// A saved user with a unique email.
pub(crate) async fn user(session: &Session, name: &str) -> crate::Document {
    let u = session.create("User").unwrap();
    u.set("username", name).unwrap();
    u.set("email", format!("{name}@example.org")).unwrap();
    session.save(&u).await.unwrap()
}

/// Wraps the in-memory driver and records how many `find_by_id` calls are
/// in flight at once.
pub(crate) struct CountingDriver {
    pub inner: Arc<InMemoryDriver>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    by_id: AtomicUsize,
}

impl CountingDriver {
    pub fn new(inner: Arc<InMemoryDriver>) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            by_id: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn by_id_calls(&self) -> usize {
        self.by_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for CountingDriver {
    async fn open(&self) -> DriverResult<()> {
        self.inner.open().await
    }

    async fn close(&self) -> DriverResult<()> {
        self.inner.close().await
    }

    async fn find(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<Vec<RawDocument>> {
        self.inner.find(doc_type, conditions, options).await
    }

    async fn find_by_id(
        &self,
        doc_type: &str,
        id: &DocId,
        options: &FindOptions,
    ) -> DriverResult<Option<RawDocument>> {
        self.by_id.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let found = self.inner.find_by_id(doc_type, id, options).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        found
    }

    async fn count(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64> {
        self.inner.count(doc_type, conditions).await
    }

    async fn distinct(
        &self,
        doc_type: &str,
        field: &str,
        conditions: &Conditions,
    ) -> DriverResult<Vec<Value>> {
        self.inner.distinct(doc_type, field, conditions).await
    }

    async fn save(&self, doc: &RawDocument) -> DriverResult<RawDocument> {
        self.inner.save(doc).await
    }

    async fn update(
        &self,
        doc_type: &str,
        id: &DocId,
        fields: &BTreeMap<String, Value>,
    ) -> DriverResult<RawDocument> {
        self.inner.update(doc_type, id, fields).await
    }

    async fn remove(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64> {
        self.inner.remove(doc_type, conditions).await
    }

    async fn find_stream(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<RawStream> {
        self.inner.find_stream(doc_type, conditions, options).await
    }
}
