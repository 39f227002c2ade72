//! Reference population.
//!
//! For each result element the declared paths are walked in order. Each
//! segment of a path is one hop: if the parent already holds a handle for the
//! reference (cached, or embedded by the driver) the hop costs nothing;
//! otherwise the referenced record is fetched by id, wrapped, and attached to
//! the parent's identity cache. Later paths pick up the handles produced by
//! earlier ones, so `main_document` followed by `main_document.owner` fetches
//! the document once.
//!
//! Result elements are resolved concurrently on a [`JoinSet`], at most
//! `concurrency` at a time. Within an element every fetch is sequential, so
//! the limit is also the bound on fetches in flight.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use refmesh_store::{Driver, FindOptions};
use refmesh_types::{PopulatePath, SchemaRegistry};

use crate::completion::normalize;
use crate::document::{Document, Field};
use crate::error::{OdmError, OdmResult};

/// How far a single path walk got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Every reference segment was resolved.
    Complete,
    /// A reference was unset, null, or dangling; the rest of the path was
    /// skipped.
    Stopped,
}

/// Resolves populate paths against a driver.
#[derive(Clone)]
pub struct Populator {
    driver: Arc<dyn Driver>,
    registry: Arc<SchemaRegistry>,
    concurrency: usize,
}

impl Populator {
    pub fn new(driver: Arc<dyn Driver>, registry: Arc<SchemaRegistry>, concurrency: usize) -> Self {
        Self {
            driver,
            registry,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolve every path on one document.
    pub async fn populate(&self, root: &Document, paths: &[PopulatePath]) -> OdmResult<()> {
        resolve_element(&*self.driver, &self.registry, root, paths).await
    }

    /// Resolve every path on every document.
    ///
    /// Elements never share caches. A driver failure does not cancel the
    /// other elements: all of them run to completion and the first failure
    /// is returned.
    pub async fn populate_all(&self, roots: &[Document], paths: &[PopulatePath]) -> OdmResult<()> {
        if roots.is_empty() || paths.is_empty() {
            return Ok(());
        }
        if roots.len() == 1 {
            return self.populate(&roots[0], paths).await;
        }

        let paths: Arc<[PopulatePath]> = paths.into();
        let mut join_set = JoinSet::new();
        let mut first_err = None;

        for root in roots {
            let driver = Arc::clone(&self.driver);
            let registry = Arc::clone(&self.registry);
            let paths = Arc::clone(&paths);
            let root = root.clone();
            join_set.spawn(async move { resolve_element(&*driver, &registry, &root, &paths).await });

            if join_set.len() >= self.concurrency {
                if let Some(joined) = join_set.join_next().await {
                    record(joined, &mut first_err);
                }
            }
        }
        while let Some(joined) = join_set.join_next().await {
            record(joined, &mut first_err);
        }

        debug!(elements = roots.len(), paths = paths.len(), "populated batch");
        first_err.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Populator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Populator")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

fn record(joined: Result<OdmResult<()>, JoinError>, first_err: &mut Option<OdmError>) {
    let outcome = joined
        .map_err(|e| OdmError::Internal(format!("populate task failed: {e}")))
        .and_then(|r| r);
    if let Err(err) = outcome {
        first_err.get_or_insert(err);
    }
}

async fn resolve_element(
    driver: &dyn Driver,
    registry: &Arc<SchemaRegistry>,
    root: &Document,
    paths: &[PopulatePath],
) -> OdmResult<()> {
    // A failed path does not stop the others; the first failure is reported.
    let mut first_err = None;
    for path in paths {
        if let Err(err) = resolve_path(driver, registry, root, path).await {
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Walk one path from `root`, fetching whatever is not yet resolved.
pub(crate) async fn resolve_path(
    driver: &dyn Driver,
    registry: &Arc<SchemaRegistry>,
    root: &Document,
    path: &PopulatePath,
) -> OdmResult<Resolution> {
    let segments = path.segments();
    let mut cursor = root.clone();

    for (i, segment) in segments.iter().enumerate() {
        let more = i + 1 < segments.len();
        let Some(target) = registry.step(path.as_str(), cursor.doc_type(), segment, more)? else {
            return Ok(Resolution::Complete);
        };

        let next = match cursor.get(segment)? {
            Field::Linked(doc) => doc,
            Field::Missing | Field::Value(_) => return Ok(Resolution::Stopped),
            Field::Id(id) => {
                let found = normalize(
                    "populate",
                    driver.find_by_id(target, &id, &FindOptions::new()).await,
                )?;
                let Some(raw) = found else {
                    warn!(path = %path, doc_type = target, id = %id, "dangling reference");
                    return Ok(Resolution::Stopped);
                };
                let child = Document::wrap(raw, registry)?;
                if !cursor.attach(segment, &child) {
                    // The field was rewritten while the fetch was in flight.
                    return Ok(Resolution::Stopped);
                }
                debug!(path = %path, segment = %segment, doc_type = target, id = %id, "fetched reference");
                child
            }
        };
        cursor = next;
    }
    Ok(Resolution::Complete)
}
