//! Status reporting for the connection manager
//!
//! The manager never writes to a console directly. It hands every
//! lifecycle event to a [`StatusSink`] chosen by the caller.

use std::sync::Mutex;
use std::time::Duration;

use mongodb::bson::{Bson, Document};
use tracing::{error, info};

/// Something the connection manager did or observed
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    Connecting { hosts: String },
    Connected { elapsed: Duration },
    ConnectFailed { cause: String },
    ServerInfo { version: String, healthy: bool, cached: bool },
    ProbeInserted { id: Bson },
    ProbeRetrieved { id: Bson, document: Document },
    Closed,
}

/// Receiver for [`ManagerEvent`]s
pub trait StatusSink: Send + Sync {
    fn report(&self, event: &ManagerEvent);
}

/// Renders events as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, event: &ManagerEvent) {
        match event {
            ManagerEvent::Connecting { hosts } => {
                info!(%hosts, "Connecting to MongoDB replica set");
            }
            ManagerEvent::Connected { elapsed } => {
                info!(elapsed_ms = elapsed.as_millis() as u64, "Connected to MongoDB");
            }
            ManagerEvent::ConnectFailed { cause } => {
                error!(%cause, "MongoDB connection failed");
            }
            ManagerEvent::ServerInfo {
                version,
                healthy,
                cached,
            } => {
                info!(%version, healthy, cached, "Server information");
            }
            ManagerEvent::ProbeInserted { id } => {
                info!(%id, "Test document inserted");
            }
            ManagerEvent::ProbeRetrieved { id, document } => {
                info!(%id, %document, "Test document retrieved");
            }
            ManagerEvent::Closed => {
                info!("MongoDB connection closed");
            }
        }
    }
}

/// Keeps every event in memory, in order
///
/// Handy for tests and for callers that render a report after the fact.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ManagerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<ManagerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl StatusSink for MemorySink {
    fn report(&self, event: &ManagerEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }
}
