use async_trait::async_trait;
use mongodb::{
    Client,
    bson::{Bson, Document, doc},
    error::ErrorKind,
    options::{ClientOptions, FindOneOptions, ReadPreference, SelectionCriteria},
};
use tracing::{debug, info, instrument};

use super::{ClusterBackend, ConnectionConfig};
use crate::common::{BackendError, ConnectionError};

/// [`ClusterBackend`] over a pooled MongoDB driver client
///
/// The client is cheap to clone and shares its pool; dropping the last clone
/// releases the pool in the background, `shutdown` releases it eagerly.
#[derive(Clone, Debug)]
pub struct MongoBackend {
    client: Client,
}

impl MongoBackend {
    /// Build a client from `config` without touching the network
    ///
    /// URI parsing may resolve `mongodb+srv` records, so a DNS failure
    /// surfaces here as [`ConnectionError::Unreachable`].
    ///
    /// # Example
    /// ```ignore
    /// use database::mongodb::{ConnectionConfig, MongoBackend};
    ///
    /// let config = ConnectionConfig::new("mongodb://localhost:27017");
    /// let backend = MongoBackend::open(&config).await?;
    /// ```
    #[instrument(skip_all, fields(hosts = %config.redacted_hosts()))]
    pub async fn open(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let mut options = ClientOptions::parse(config.uri())
            .await
            .map_err(classify_open_error)?;

        config.apply_to(&mut options);
        debug!(
            min_pool_size = config.min_pool_size,
            max_pool_size = config.max_pool_size,
            write_concern = ?config.write_concern,
            "Applying MongoDB client options"
        );

        let client = Client::with_options(options).map_err(classify_open_error)?;
        Ok(Self { client })
    }
}

fn classify_open_error(error: mongodb::error::Error) -> ConnectionError {
    if matches!(*error.kind, ErrorKind::InvalidArgument { .. }) {
        ConnectionError::InvalidConfig(error.to_string())
    } else {
        ConnectionError::Unreachable(BackendError::Mongo(error))
    }
}

fn primary_preferred() -> SelectionCriteria {
    SelectionCriteria::ReadPreference(ReadPreference::PrimaryPreferred {
        options: Default::default(),
    })
}

#[async_trait]
impl ClusterBackend for MongoBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn build_info(&self) -> Result<Document, BackendError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;
        Ok(reply)
    }

    async fn replica_set_status(&self) -> Result<Document, BackendError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "replSetGetStatus": 1 })
            .await?;
        Ok(reply)
    }

    async fn collection_counts(&self, database: &str) -> Result<Vec<(String, u64)>, BackendError> {
        let db = self.client.database(database);
        let names = db.list_collection_names().await?;

        let mut counts = Vec::with_capacity(names.len());
        for name in names {
            let count = db
                .collection::<Document>(&name)
                .count_documents(doc! {})
                .await?;
            counts.push((name, count));
        }
        Ok(counts)
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> Result<Bson, BackendError> {
        let result = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .insert_one(document)
            .await?;
        Ok(result.inserted_id)
    }

    async fn find_by_id(
        &self,
        database: &str,
        collection: &str,
        id: Bson,
    ) -> Result<Option<Document>, BackendError> {
        let options = FindOneOptions::builder()
            .selection_criteria(primary_preferred())
            .build();

        let document = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .find_one(doc! { "_id": id })
            .with_options(options)
            .await?;
        Ok(document)
    }

    async fn shutdown(&self) {
        info!("Shutting down MongoDB client");
        self.client.clone().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_preferred_selection() {
        assert!(matches!(
            primary_preferred(),
            SelectionCriteria::ReadPreference(ReadPreference::PrimaryPreferred { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_uri() {
        let config = ConnectionConfig::new("not-a-mongodb-uri");
        let err = MongoBackend::open(&config).await.unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_open_does_not_touch_the_network() {
        // Nothing listens on this port; open() must still succeed
        let config = ConnectionConfig::new("mongodb://127.0.0.1:1/?directConnection=true");
        assert!(MongoBackend::open(&config).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_ping_live_server() {
        let uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017/?directConnection=true".to_string());
        let backend = MongoBackend::open(&ConnectionConfig::new(uri)).await.unwrap();
        assert!(backend.ping().await.is_ok());
        backend.shutdown().await;
    }
}
