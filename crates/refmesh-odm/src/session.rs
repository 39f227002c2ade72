use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use refmesh_store::Driver;
use refmesh_types::{PopulatePath, SchemaRegistry};

use crate::completion::{normalize, Completion};
use crate::config::OdmConfig;
use crate::document::Document;
use crate::error::{OdmError, OdmResult};
use crate::model::Model;
use crate::populate::Populator;

struct Inner {
    driver: Arc<dyn Driver>,
    registry: Arc<SchemaRegistry>,
    config: OdmConfig,
    open: AtomicBool,
}

/// An open connection to a store plus the schemas it serves.
///
/// Cheap to clone; clones share the connection. Closing any clone closes
/// all of them.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Validate `config`, open the driver and start a session.
    pub async fn open(
        driver: Arc<dyn Driver>,
        registry: Arc<SchemaRegistry>,
        config: OdmConfig,
    ) -> OdmResult<Self> {
        config.validate()?;
        normalize("open", driver.open().await)?;
        info!(
            types = registry.names().count(),
            populate_concurrency = config.populate_concurrency,
            "session opened"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                driver,
                registry,
                config,
                open: AtomicBool::new(true),
            }),
        })
    }

    /// Close the driver. Closing twice is a no-op.
    pub async fn close(&self) -> OdmResult<()> {
        if !self.inner.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        normalize("close", self.inner.driver.close().await)?;
        info!("session closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &OdmConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.inner.registry
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.driver
    }

    /// The model for a registered document type.
    pub fn model(&self, doc_type: &str) -> OdmResult<Model> {
        let schema = Arc::clone(self.inner.registry.get(doc_type)?);
        Ok(Model::new(self.clone(), schema))
    }

    /// A new, unsaved document of `doc_type`.
    pub fn create(&self, doc_type: &str) -> OdmResult<Document> {
        Document::create(doc_type, &self.inner.registry)
    }

    /// Persist a document and return a fresh handle of what was stored.
    ///
    /// The fresh handle carries references as identifiers; the handle passed
    /// in keeps its resolved links and is marked unmodified. A partial handle
    /// is merged into the stored record, and the fresh handle is the whole
    /// merged record.
    pub async fn save(&self, doc: &Document) -> OdmResult<Document> {
        self.ensure_open()?;
        let raw = doc.to_raw();
        let driver = &self.inner.driver;
        let stored = if doc.is_partial() {
            normalize("save", driver.update(&raw.doc_type, &raw.id, &raw.fields).await)?
        } else {
            normalize("save", driver.save(&raw).await)?
        };
        doc.mark_saved();
        debug!(doc_type = %stored.doc_type, id = %stored.id, "saved document");
        Document::wrap(stored, &self.inner.registry)
    }

    /// [`save`](Self::save), delivered through a completion contract.
    pub async fn save_with(&self, doc: &Document, completion: Completion<Document>) {
        completion.complete(self.save(doc).await);
    }

    /// Resolve one reference field of `doc`, fetching it unless it is
    /// already linked. Returns `None` for unset and dangling references.
    pub async fn resolve(&self, doc: &Document, field: &str) -> OdmResult<Option<Document>> {
        self.ensure_open()?;
        let path = PopulatePath::parse(&self.inner.registry, doc.doc_type(), field)?;
        self.populator()
            .populate(doc, std::slice::from_ref(&path))
            .await?;
        doc.link(field)
    }

    pub(crate) fn ensure_open(&self) -> OdmResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(OdmError::SessionClosed)
        }
    }

    pub(crate) fn populator(&self) -> Populator {
        Populator::new(
            Arc::clone(&self.inner.driver),
            Arc::clone(&self.inner.registry),
            self.inner.config.populate_concurrency,
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("config", &self.inner.config)
            .finish()
    }
}
