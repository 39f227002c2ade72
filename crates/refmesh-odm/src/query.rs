//! Query description and execution.
//!
//! A [`Query`] is a reusable description: conditions, find options and the
//! ordered populate paths. Execution borrows it, so the same query can be run
//! again and every run does live I/O. `Query<Many>` yields a `Vec`,
//! `Query<One>` an `Option`.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use refmesh_store::{Conditions, FindOptions, SortOrder};
use refmesh_types::{DocId, DocumentSchema, PopulatePath};

use crate::completion::{normalize, Completion, OrPanic};
use crate::document::{Document, Wrap};
use crate::error::OdmResult;
use crate::session::Session;

/// Marker: the query returns every match.
#[derive(Clone, Copy, Debug)]
pub struct Many;

/// Marker: the query returns at most one document.
#[derive(Clone, Copy, Debug)]
pub struct One;

#[derive(Clone)]
pub struct Query<K> {
    session: Session,
    schema: Arc<DocumentSchema>,
    conditions: Conditions,
    id: Option<DocId>,
    options: FindOptions,
    paths: Vec<PopulatePath>,
    _kind: PhantomData<K>,
}

impl<K> Query<K> {
    pub(crate) fn new(
        session: Session,
        schema: Arc<DocumentSchema>,
        conditions: Conditions,
        id: Option<DocId>,
    ) -> Self {
        Self {
            session,
            schema,
            conditions,
            id,
            options: FindOptions::new(),
            paths: Vec::new(),
            _kind: PhantomData,
        }
    }

    pub fn doc_type(&self) -> &str {
        self.schema.name()
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// The populate paths, in declaration order.
    pub fn paths(&self) -> &[PopulatePath] {
        &self.paths
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.options.sort.push((field.into(), order));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = Some(n);
        self
    }

    /// Restrict the returned fields. `_id` is always returned.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Request population of a dotted reference path.
    ///
    /// The path is checked against the schema here, before any I/O.
    /// Declaring the same path twice has no further effect.
    pub fn populate(mut self, path: &str) -> OdmResult<Self> {
        let path = PopulatePath::parse(self.session.registry(), self.schema.name(), path)?;
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        Ok(self)
    }

    /// Options sent to the driver. Single-segment reference paths are
    /// offered for native population.
    fn driver_options(&self) -> FindOptions {
        let mut options = self.options.clone();
        options.populate = self
            .paths
            .iter()
            .filter(|p| p.depth() == 1 && self.schema.get(p.head()).is_some_and(|s| s.is_reference()))
            .map(|p| p.head().to_string())
            .collect();
        options
    }

    fn is_projected(&self) -> bool {
        self.options.projection.is_some()
    }
}

impl Query<Many> {
    /// Fetch, wrap and populate every match.
    pub async fn exec(&self) -> OdmResult<Vec<Document>> {
        self.session.ensure_open()?;
        let raws = normalize(
            "find",
            self.session
                .driver()
                .find(self.doc_type(), &self.conditions, &self.driver_options())
                .await,
        )?;
        let docs = raws.wrap(self.session.registry())?;
        if self.is_projected() {
            docs.iter().for_each(Document::mark_partial);
        }
        if !docs.is_empty() && !self.paths.is_empty() {
            self.session
                .populator()
                .populate_all(&docs, &self.paths)
                .await?;
        }
        debug!(doc_type = self.doc_type(), results = docs.len(), paths = self.paths.len(), "find");
        Ok(docs)
    }

    /// [`exec`](Self::exec), panicking on failure.
    pub async fn exec_or_panic(&self) -> Vec<Document> {
        self.exec().await.or_panic()
    }

    pub async fn exec_with(&self, completion: Completion<Vec<Document>>) {
        completion.complete(self.exec().await);
    }

    /// Stream matches one at a time, each wrapped and populated.
    ///
    /// The stream ends when every match has been delivered; a driver
    /// failure is delivered as an item and ends it.
    pub async fn stream(&self) -> OdmResult<DocumentStream> {
        self.session.ensure_open()?;
        let mut raw = normalize(
            "stream",
            self.session
                .driver()
                .find_stream(self.doc_type(), &self.conditions, &self.driver_options())
                .await,
        )?;

        let (tx, rx) = mpsc::channel(self.session.config().stream_buffer);
        let registry = Arc::clone(self.session.registry());
        let populator = self.session.populator();
        let paths = self.paths.clone();
        let doc_type = self.doc_type().to_string();
        let projected = self.is_projected();

        tokio::spawn(async move {
            let mut delivered = 0usize;
            while let Some(item) = raw.recv().await {
                let outcome = match normalize("stream", item) {
                    Ok(record) => match Document::wrap(record, &registry) {
                        Ok(doc) => {
                            if projected {
                                doc.mark_partial();
                            }
                            populator.populate(&doc, &paths).await.map(|()| doc)
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                };
                let failed = outcome.is_err();
                if tx.send(outcome).await.is_err() || failed {
                    break;
                }
                delivered += 1;
            }
            debug!(doc_type = %doc_type, delivered, "stream closed");
        });

        Ok(DocumentStream { rx })
    }
}

impl Query<One> {
    /// Fetch, wrap and populate the first match.
    pub async fn exec(&self) -> OdmResult<Option<Document>> {
        self.session.ensure_open()?;
        let driver = self.session.driver();
        let options = self.driver_options();
        let raw = match &self.id {
            Some(id) => normalize(
                "find_by_id",
                driver.find_by_id(self.doc_type(), id, &options).await,
            )?,
            None => normalize(
                "find_one",
                driver
                    .find_one(self.doc_type(), &self.conditions, &options)
                    .await,
            )?,
        };
        let doc = raw.wrap(self.session.registry())?;
        if let Some(doc) = &doc {
            if self.is_projected() {
                doc.mark_partial();
            }
            if !self.paths.is_empty() {
                self.session.populator().populate(doc, &self.paths).await?;
            }
        }
        Ok(doc)
    }

    pub async fn exec_or_panic(&self) -> Option<Document> {
        self.exec().await.or_panic()
    }

    pub async fn exec_with(&self, completion: Completion<Option<Document>>) {
        completion.complete(self.exec().await);
    }
}

impl<K> std::fmt::Debug for Query<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("doc_type", &self.doc_type())
            .field("conditions", &self.conditions)
            .field("id", &self.id)
            .field("options", &self.options)
            .field("paths", &self.paths)
            .finish()
    }
}

/// Populated documents from a streamed find.
#[derive(Debug)]
pub struct DocumentStream {
    rx: mpsc::Receiver<OdmResult<Document>>,
}

impl DocumentStream {
    /// The next document, or `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<OdmResult<Document>> {
        self.rx.recv().await
    }

    /// Drain the rest of the stream.
    pub async fn collect(mut self) -> OdmResult<Vec<Document>> {
        let mut docs = Vec::new();
        while let Some(doc) = self.next().await {
            docs.push(doc?);
        }
        Ok(docs)
    }
}
