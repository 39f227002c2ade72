use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use refmesh_types::{DocId, RawDocument, Value, ID_FIELD};

use crate::conditions::Conditions;
use crate::error::{DriverError, DriverResult};
use crate::options::FindOptions;

/// Receiving end of a streamed find. Each message is one raw result; the
/// channel closing is the end of the stream.
pub type RawStream = mpsc::Receiver<DriverResult<RawDocument>>;

/// The storage driver consumed by refmesh.
///
/// Implementations own query execution and connection management. Each
/// call is one round-trip; refmesh never asks a driver to join.
///
/// All implementations must satisfy these invariants:
/// - Reads return records exactly as stored, except for fields the caller
///   asked to populate, which may come back as [`Value::Embedded`].
/// - `save` stores the dehydrated form of the record and returns it.
/// - Failures are reported, never swallowed.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Establish the connection. Called once by the session.
    async fn open(&self) -> DriverResult<()> {
        Ok(())
    }

    /// Release the connection.
    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn find(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<Vec<RawDocument>>;

    /// First match under the options' sort, if any.
    async fn find_one(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<Option<RawDocument>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self
            .find(doc_type, conditions, &options)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_id(
        &self,
        doc_type: &str,
        id: &DocId,
        options: &FindOptions,
    ) -> DriverResult<Option<RawDocument>> {
        let conditions = Conditions::new().eq(ID_FIELD, id.as_str());
        self.find_one(doc_type, &conditions, options).await
    }

    async fn count(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64>;

    /// Distinct values of `field` across matching records, first-seen order.
    async fn distinct(
        &self,
        doc_type: &str,
        field: &str,
        conditions: &Conditions,
    ) -> DriverResult<Vec<Value>>;

    /// Insert or replace a record and return what was stored.
    async fn save(&self, doc: &RawDocument) -> DriverResult<RawDocument>;

    /// Merge `fields` over the stored record and return what was stored.
    ///
    /// Fields not named are left as they are. The default implementation is
    /// a read followed by a full save; drivers that can should do this in
    /// one step.
    async fn update(
        &self,
        doc_type: &str,
        id: &DocId,
        fields: &BTreeMap<String, Value>,
    ) -> DriverResult<RawDocument> {
        let mut stored = self
            .find_by_id(doc_type, id, &FindOptions::default())
            .await?
            .ok_or_else(|| DriverError::NotFound {
                doc_type: doc_type.to_string(),
                id: id.clone(),
            })?;
        stored
            .fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.dehydrated())));
        self.save(&stored).await
    }

    /// Delete matching records and return how many were removed.
    async fn remove(&self, doc_type: &str, conditions: &Conditions) -> DriverResult<u64>;

    /// Streaming variant of [`find`](Self::find).
    ///
    /// The default implementation runs `find` and replays the results into
    /// a channel sized to hold all of them.
    async fn find_stream(
        &self,
        doc_type: &str,
        conditions: &Conditions,
        options: &FindOptions,
    ) -> DriverResult<RawStream> {
        let docs = self.find(doc_type, conditions, options).await?;
        let (tx, rx) = mpsc::channel(docs.len().max(1));
        for doc in docs {
            tx.try_send(Ok(doc))
                .map_err(|e| DriverError::Backend(format!("stream buffer: {e}")))?;
        }
        Ok(rx)
    }
}
