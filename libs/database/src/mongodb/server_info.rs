use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::common::{BackendError, QueryError};

/// Server metadata fetched from `buildInfo`, stamped with its fetch time
#[derive(Debug, Clone, PartialEq)]
pub struct CachedServerInfo {
    /// Server version, e.g. `7.0.12`
    pub version: String,
    /// Whether the reply reported `ok: 1`
    pub healthy: bool,
    /// The full reply
    pub metadata: Document,
    /// Monotonic fetch time, used for TTL checks
    pub fetched_at: Instant,
    /// Wall-clock fetch time, for display
    pub fetched_at_utc: DateTime<Utc>,
}

impl CachedServerInfo {
    /// Interpret a `buildInfo` reply
    pub fn from_build_info(metadata: Document) -> Result<Self, BackendError> {
        let version = metadata
            .get_str("version")
            .map_err(|e| BackendError::Malformed(format!("buildInfo.version: {e}")))?
            .to_string();
        if version.is_empty() {
            return Err(BackendError::Malformed("buildInfo.version is empty".into()));
        }
        let healthy = metadata.get("ok").and_then(as_f64) == Some(1.0);

        Ok(Self {
            version,
            healthy,
            metadata,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        })
    }

    /// Age relative to the tokio clock
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Numeric BSON value as f64; servers send `ok` as double or int
pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Single-entry TTL cache with coalesced refresh
///
/// The slot lock is held for the whole refresh, so callers arriving while a
/// fetch is in flight wait for it and then see the new entry.
#[derive(Debug)]
pub(crate) struct ServerInfoCache {
    ttl: Duration,
    slot: Mutex<Option<CachedServerInfo>>,
}

impl ServerInfoCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached entry if fresh, otherwise the result of `fetch`.
    ///
    /// The returned flag is true when the entry came from cache.
    pub(crate) async fn get_or_refresh<F, Fut>(
        &self,
        fetch: F,
    ) -> Result<(CachedServerInfo, bool), QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Document, QueryError>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(info) = slot.as_ref().filter(|info| info.is_fresh(self.ttl)) {
            return Ok((info.clone(), true));
        }

        let info = CachedServerInfo::from_build_info(fetch().await?)?;
        *slot = Some(info.clone());
        Ok((info, false))
    }

    pub(crate) async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}
