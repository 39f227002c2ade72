use std::fmt;
use std::sync::Arc;

use refmesh_store::Conditions;
use refmesh_types::{DocumentSchema, ToDocId, TypeError, Value};

use crate::completion::normalize;
use crate::document::Document;
use crate::error::OdmResult;
use crate::query::{Many, One, Query};
use crate::session::Session;

/// Entry point for the queries on one document type.
#[derive(Clone)]
pub struct Model {
    session: Session,
    schema: Arc<DocumentSchema>,
}

impl Model {
    pub(crate) fn new(session: Session, schema: Arc<DocumentSchema>) -> Self {
        Self { session, schema }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    /// A new, unsaved document of this type.
    pub fn create(&self) -> OdmResult<Document> {
        self.session.create(self.name())
    }

    /// Every document of this type.
    pub fn all(&self) -> Query<Many> {
        Query::new(self.session.clone(), Arc::clone(&self.schema), Conditions::new(), None)
    }

    pub fn find(&self, conditions: Conditions) -> OdmResult<Query<Many>> {
        self.verify(&conditions)?;
        Ok(Query::new(
            self.session.clone(),
            Arc::clone(&self.schema),
            conditions,
            None,
        ))
    }

    pub fn find_one(&self, conditions: Conditions) -> OdmResult<Query<One>> {
        self.verify(&conditions)?;
        Ok(Query::new(
            self.session.clone(),
            Arc::clone(&self.schema),
            conditions,
            None,
        ))
    }

    /// Look up by anything that canonicalizes to an identifier: a string, a
    /// [`refmesh_types::DocId`], a raw record or a document handle.
    pub fn find_by_id<T>(&self, id: &T) -> OdmResult<Query<One>>
    where
        T: ToDocId + fmt::Debug + ?Sized,
    {
        let id = id
            .doc_id()
            .ok_or_else(|| TypeError::InvalidIdentifier(format!("{id:?}")))?;
        Ok(Query::new(
            self.session.clone(),
            Arc::clone(&self.schema),
            Conditions::new(),
            Some(id),
        ))
    }

    pub async fn count(&self, conditions: Conditions) -> OdmResult<u64> {
        self.verify(&conditions)?;
        self.session.ensure_open()?;
        normalize(
            "count",
            self.session.driver().count(self.name(), &conditions).await,
        )
    }

    /// Distinct stored values of `field` across matching documents.
    pub async fn distinct(&self, field: &str, conditions: Conditions) -> OdmResult<Vec<Value>> {
        self.session.registry().verify_path(self.name(), field)?;
        self.verify(&conditions)?;
        self.session.ensure_open()?;
        normalize(
            "distinct",
            self.session
                .driver()
                .distinct(self.name(), field, &conditions)
                .await,
        )
    }

    /// Delete matching documents and return how many went.
    pub async fn remove(&self, conditions: Conditions) -> OdmResult<u64> {
        self.verify(&conditions)?;
        self.session.ensure_open()?;
        normalize(
            "remove",
            self.session.driver().remove(self.name(), &conditions).await,
        )
    }

    fn verify(&self, conditions: &Conditions) -> OdmResult<()> {
        if !self.session.config().verify_conditions {
            return Ok(());
        }
        let registry = self.session.registry();
        for field in conditions.fields() {
            registry.verify_path(self.name(), field)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("name", &self.name()).finish()
    }
}
