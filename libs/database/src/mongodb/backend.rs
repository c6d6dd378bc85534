use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use crate::common::BackendError;

/// The commands the connection manager needs from a cluster
///
/// [`MongoBackend`](super::MongoBackend) is the production implementation;
/// tests substitute mocks or in-memory fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Administrative `{ping: 1}` against `admin`
    async fn ping(&self) -> Result<(), BackendError>;

    /// Raw `buildInfo` reply
    async fn build_info(&self) -> Result<Document, BackendError>;

    /// Raw `replSetGetStatus` reply
    async fn replica_set_status(&self) -> Result<Document, BackendError>;

    /// Collection names of `database` with their document counts
    async fn collection_counts(&self, database: &str) -> Result<Vec<(String, u64)>, BackendError>;

    /// Insert one document, returning its `_id`
    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> Result<Bson, BackendError>;

    /// Read a document by `_id` with `primaryPreferred` read preference
    async fn find_by_id(
        &self,
        database: &str,
        collection: &str,
        id: Bson,
    ) -> Result<Option<Document>, BackendError>;

    /// Release pooled connections. Later calls fail with a backend error.
    async fn shutdown(&self);
}
