//! Write-then-read verification against a live cluster

use std::time::Duration;

use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use serde::Serialize;
use tokio::time::{Instant, timeout};
use tracing::debug;

use super::{ClusterBackend, ManagerEvent, StatusSink};
use crate::common::OperationError;

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub inserted_id: Bson,
    pub inserted: Document,
    pub retrieved: Document,
    #[serde(rename = "round_trip_ms", serialize_with = "as_millis")]
    pub round_trip: Duration,
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Payload used when the caller does not supply one
pub fn default_document() -> Document {
    doc! { "name": "Test Document" }
}

/// Give the payload a client-side `_id` (kept if present) as its first field
fn prepare(document: Document) -> Result<Document, OperationError> {
    if document.keys().all(|key| key == "_id") {
        return Err(OperationError::EmptyDocument);
    }

    let id = document
        .get("_id")
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut prepared = doc! { "_id": id };
    for (key, value) in document {
        if key != "_id" {
            prepared.insert(key, value);
        }
    }
    Ok(prepared)
}

/// Insert `document` into `database.collection` and read it back
///
/// Each step is bounded by `step_timeout`. Nothing is rolled back on failure.
pub(crate) async fn run<B: ClusterBackend + ?Sized>(
    backend: &B,
    database: &str,
    collection: &str,
    document: Document,
    step_timeout: Duration,
    sink: &dyn StatusSink,
) -> Result<ProbeResult, OperationError> {
    let namespace = format!("{database}.{collection}");
    let inserted = prepare(document)?;
    let started = Instant::now();

    let inserted_id = timeout(
        step_timeout,
        backend.insert_document(database, collection, inserted.clone()),
    )
    .await
    .map_err(|_| OperationError::Timeout(step_timeout))?
    .map_err(|source| OperationError::Insert {
        namespace: namespace.clone(),
        source,
    })?;
    sink.report(&ManagerEvent::ProbeInserted {
        id: inserted_id.clone(),
    });

    let retrieved = timeout(
        step_timeout,
        backend.find_by_id(database, collection, inserted_id.clone()),
    )
    .await
    .map_err(|_| OperationError::Timeout(step_timeout))?
    .map_err(|source| OperationError::Read {
        namespace: namespace.clone(),
        source,
    })?
    .ok_or_else(|| OperationError::NotFound(inserted_id.clone()))?;

    if retrieved != inserted {
        debug!(%inserted, %retrieved, "Probe documents differ");
        return Err(OperationError::Mismatch(inserted_id));
    }

    sink.report(&ManagerEvent::ProbeRetrieved {
        id: inserted_id.clone(),
        document: retrieved.clone(),
    });

    Ok(ProbeResult {
        inserted_id,
        inserted,
        retrieved,
        round_trip: started.elapsed(),
    })
}
