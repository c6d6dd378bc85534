//! Connection lifecycle for a replica-set client
//!
//! ```text
//! Unconnected ──connect()──▶ Connecting ──ping ok──▶ Connected ──close()──▶ Closed
//!      ▲                         │
//!      └────────ping failed──────┘
//! ```
//!
//! `Closed` is terminal. `server_info()`, `probe()` and the other queries only
//! succeed while `Connected`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use mongodb::bson::Document;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout};
use tracing::{debug, instrument, warn};

use super::health::{HealthStatus, check_health_detailed};
use super::probe::{self, ProbeResult};
use super::server_info::{CachedServerInfo, ServerInfoCache};
use super::topology::{DatabaseSummary, ReplicaSetStatus};
use super::{ClusterBackend, ConnectionConfig, ManagerEvent, MongoBackend, StatusSink, TracingSink};
use crate::common::{
    BackendError, ConnectionError, OperationError, QueryError, retry_with_backoff_if,
};

/// Observable lifecycle state of a [`ConnectionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Lifecycle<B> {
    Unconnected,
    Connecting,
    Connected(Arc<B>),
    Closed,
}

impl<B> Lifecycle<B> {
    fn state(&self) -> ConnectionState {
        match self {
            Lifecycle::Unconnected => ConnectionState::Unconnected,
            Lifecycle::Connecting => ConnectionState::Connecting,
            Lifecycle::Connected(_) => ConnectionState::Connected,
            Lifecycle::Closed => ConnectionState::Closed,
        }
    }
}

/// Owns the connection to one cluster and the metadata cached from it
///
/// `connect` and `close` are meant to be called by a single owner; queries and
/// probes may run concurrently from shared references.
///
/// # Example
///
/// ```ignore
/// use database::mongodb::{ConnectionConfig, ConnectionManager};
///
/// let manager = ConnectionManager::new(ConnectionConfig::default());
/// manager.connect().await?;
///
/// let outcome = async {
///     let info = manager.server_info().await?;
///     let probe = manager.probe("commonDB").await?;
///     Ok::<_, database::DatabaseError>((info, probe))
/// }
/// .await;
///
/// manager.close().await;
/// let (info, probe) = outcome?;
/// ```
pub struct ConnectionManager<B: ClusterBackend = MongoBackend> {
    config: ConnectionConfig,
    lifecycle: RwLock<Lifecycle<B>>,
    server_info: ServerInfoCache,
    sink: Arc<dyn StatusSink>,
}

impl<B: ClusterBackend> ConnectionManager<B> {
    /// Unconnected manager reporting through [`TracingSink`]
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Unconnected manager reporting through `sink`
    pub fn with_sink(config: ConnectionConfig, sink: Arc<dyn StatusSink>) -> Self {
        let server_info = ServerInfoCache::new(config.server_info_ttl);
        Self {
            config,
            lifecycle: RwLock::new(Lifecycle::Unconnected),
            server_info,
            sink,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn state(&self) -> ConnectionState {
        self.lifecycle.read().await.state()
    }

    /// Verify an already-built backend with a ping and take ownership of it
    ///
    /// Same state rules and failure reporting as `connect()`.
    pub async fn connect_backend(&self, backend: B) -> Result<(), ConnectionError> {
        self.connect_via(|| async { Ok(backend) }).await
    }

    /// `connect_backend` repeated with backoff from `config.retry` while the
    /// failure is transient. `make` builds a fresh backend for every attempt.
    pub async fn connect_backend_with_retry<F>(&self, mut make: F) -> Result<(), ConnectionError>
    where
        F: FnMut() -> B,
    {
        self.connect_via_with_retry(|| {
            let backend = make();
            async move { Ok(backend) }
        })
        .await
    }

    async fn connect_via_with_retry<F, Fut>(&self, mut open: F) -> Result<(), ConnectionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<B, ConnectionError>>,
    {
        retry_with_backoff_if(
            || {
                let opening = open();
                self.connect_via(move || opening)
            },
            &self.config.retry,
            ConnectionError::is_transient,
        )
        .await
    }

    #[instrument(skip_all, fields(hosts = %self.config.redacted_hosts()))]
    async fn connect_via<F, Fut>(&self, open: F) -> Result<(), ConnectionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<B, ConnectionError>>,
    {
        self.begin_connect().await?;

        if let Err(e) = self.config.validate() {
            return Err(self.abort_connect(e).await);
        }

        self.sink.report(&ManagerEvent::Connecting {
            hosts: self.config.redacted_hosts(),
        });
        let started = Instant::now();

        let backend = match open().await {
            Ok(backend) => backend,
            Err(e) => return Err(self.abort_connect(e).await),
        };

        let limit = self.config.connect_timeout;
        let failure = match timeout(limit, backend.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(ConnectionError::from_ping(e)),
            Err(_) => Some(ConnectionError::Timeout(limit)),
        };
        if let Some(error) = failure {
            backend.shutdown().await;
            return Err(self.abort_connect(error).await);
        }

        {
            let mut lifecycle = self.lifecycle.write().await;
            if !matches!(*lifecycle, Lifecycle::Connecting) {
                // close() ran while the ping was in flight
                drop(lifecycle);
                backend.shutdown().await;
                return Err(ConnectionError::Closed);
            }
            *lifecycle = Lifecycle::Connected(Arc::new(backend));
        }

        self.sink.report(&ManagerEvent::Connected {
            elapsed: started.elapsed(),
        });
        Ok(())
    }

    async fn begin_connect(&self) -> Result<(), ConnectionError> {
        let mut lifecycle = self.lifecycle.write().await;
        match *lifecycle {
            Lifecycle::Unconnected => {
                *lifecycle = Lifecycle::Connecting;
                Ok(())
            }
            Lifecycle::Closed => Err(ConnectionError::Closed),
            ref other => Err(ConnectionError::InvalidState(other.state())),
        }
    }

    /// Back to `Unconnected`, report the cause, hand the error back
    async fn abort_connect(&self, error: ConnectionError) -> ConnectionError {
        {
            let mut lifecycle = self.lifecycle.write().await;
            if matches!(*lifecycle, Lifecycle::Connecting) {
                *lifecycle = Lifecycle::Unconnected;
            }
        }
        self.sink.report(&ManagerEvent::ConnectFailed {
            cause: error.to_string(),
        });
        error
    }

    async fn handle(&self) -> Result<Arc<B>, ConnectionState> {
        match &*self.lifecycle.read().await {
            Lifecycle::Connected(backend) => Ok(Arc::clone(backend)),
            other => Err(other.state()),
        }
    }

    async fn bounded_query<T, Fut>(&self, query: Fut) -> Result<T, QueryError>
    where
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let limit = self.config.query_timeout;
        timeout(limit, query)
            .await
            .map_err(|_| QueryError::Timeout(limit))?
            .map_err(QueryError::from)
    }

    /// Server metadata, served from cache while younger than the TTL
    ///
    /// Concurrent callers during a refresh wait for it rather than issuing
    /// their own query. Failures are not retried.
    #[instrument(skip(self))]
    pub async fn server_info(&self) -> Result<CachedServerInfo, QueryError> {
        let backend = self.handle().await.map_err(QueryError::NotConnected)?;

        let (info, cached) = self
            .server_info
            .get_or_refresh(|| self.bounded_query(backend.build_info()))
            .await?;

        debug!(cached, age_ms = info.age().as_millis() as u64, "Server info resolved");
        self.sink.report(&ManagerEvent::ServerInfo {
            version: info.version.clone(),
            healthy: info.healthy,
            cached,
        });
        Ok(info)
    }

    /// Drop the cached server info so the next call queries the server
    pub async fn invalidate_server_info(&self) {
        self.server_info.invalidate().await;
    }

    /// Replica-set membership; fails with `Unhealthy` when no member is healthy
    #[instrument(skip(self))]
    pub async fn replica_set_status(&self) -> Result<ReplicaSetStatus, QueryError> {
        let backend = self.handle().await.map_err(QueryError::NotConnected)?;
        let reply = self.bounded_query(backend.replica_set_status()).await?;
        let status = ReplicaSetStatus::from_document(&reply)?;

        if !status.is_healthy() {
            warn!(set = %status.set, "No healthy members in replica set");
            return Err(QueryError::Unhealthy(status.set));
        }
        Ok(status)
    }

    /// Collections of `database` with their document counts
    #[instrument(skip(self))]
    pub async fn database_summary(&self, database: &str) -> Result<DatabaseSummary, QueryError> {
        let backend = self.handle().await.map_err(QueryError::NotConnected)?;
        let counts = self
            .bounded_query(backend.collection_counts(database))
            .await?;
        Ok(DatabaseSummary::new(database, counts))
    }

    /// Ping-based health; never fails, reports unhealthy instead
    pub async fn health(&self) -> HealthStatus {
        match self.handle().await {
            Ok(backend) => check_health_detailed(backend.as_ref(), self.config.query_timeout).await,
            Err(state) => HealthStatus::unavailable(format!("not connected (state: {state})")),
        }
    }

    /// Insert `{"name": "Test Document"}` into the probe collection of
    /// `database` and read it back preferring the primary
    pub async fn probe(&self, database: &str) -> Result<ProbeResult, OperationError> {
        self.probe_document(database, probe::default_document())
            .await
    }

    /// Like [`probe`](Self::probe) with a caller-supplied payload
    #[instrument(skip(self, document), fields(collection = %self.config.probe_collection))]
    pub async fn probe_document(
        &self,
        database: &str,
        document: Document,
    ) -> Result<ProbeResult, OperationError> {
        let backend = self.handle().await.map_err(OperationError::NotConnected)?;

        probe::run(
            backend.as_ref(),
            database,
            &self.config.probe_collection,
            document,
            self.config.query_timeout,
            self.sink.as_ref(),
        )
        .await
    }

    /// Release the connection and pooled resources. Calling it again is a no-op.
    ///
    /// Dropping the manager without calling `close` still releases the pool,
    /// but in the background.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.write().await, Lifecycle::Closed);

        match previous {
            Lifecycle::Closed => return,
            Lifecycle::Connected(backend) => backend.shutdown().await,
            Lifecycle::Unconnected | Lifecycle::Connecting => {}
        }

        self.server_info.invalidate().await;
        self.sink.report(&ManagerEvent::Closed);
    }
}

impl ConnectionManager<MongoBackend> {
    /// Open a pooled client from the config and verify it with a ping
    ///
    /// A single attempt; see [`connect_with_retry`](Self::connect_with_retry).
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.connect_via(|| MongoBackend::open(&self.config)).await
    }

    /// `connect()` repeated with backoff from `config.retry` while the
    /// failure is transient (unreachable or timed out). Rejected credentials
    /// fail on the first attempt.
    pub async fn connect_with_retry(&self) -> Result<(), ConnectionError> {
        self.connect_via_with_retry(|| MongoBackend::open(&self.config))
            .await
    }
}
