//! MongoDB replica-set connection manager
//!
//! Connects to a replica set, caches server metadata for a bounded time, and
//! verifies the write/read path with a probe document.
//!
//! # Features
//!
//! - `config` - Configuration support with `core_config::FromEnv`
//!
//! # Example
//!
//! ```ignore
//! use database::mongodb::{ConnectionConfig, ConnectionManager};
//!
//! let manager = ConnectionManager::new(ConnectionConfig::default());
//! manager.connect().await?;
//!
//! let info = manager.server_info().await?;
//! println!("MongoDB {}", info.version);
//!
//! let probe = manager.probe("commonDB").await?;
//! println!("round trip: {:?}", probe.round_trip);
//!
//! manager.close().await;
//! ```

pub mod common;
pub mod mongodb;

// Re-exports for convenience
pub use common::{
    ConnectionError, DatabaseError, DatabaseResult, OperationError, QueryError,
};
pub use crate::mongodb::{ConnectionConfig, ConnectionManager, ConnectionState};
