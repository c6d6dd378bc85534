//! MongoDB replica-set connection management
//!
//! [`ConnectionManager`] owns one pooled client, caches server metadata, and
//! runs write-then-read probes. Cluster access goes through the
//! [`ClusterBackend`] trait, implemented for the real driver by
//! [`MongoBackend`].

mod backend;
mod config;
mod connector;
mod health;
mod manager;
mod probe;
mod server_info;
mod sink;
mod topology;

pub use backend::ClusterBackend;
pub use config::{ConnectionConfig, DEFAULT_DATABASE, DEFAULT_URI, WriteAcknowledgment};
pub use connector::MongoBackend;
pub use health::{HealthStatus, check_health, check_health_detailed};
pub use manager::{ConnectionManager, ConnectionState};
pub use probe::{ProbeResult, default_document};
pub use server_info::CachedServerInfo;
pub use sink::{ManagerEvent, MemorySink, StatusSink, TracingSink};
pub use topology::{CollectionInfo, DatabaseSummary, MemberHealth, ReplicaSetStatus};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, bson};
