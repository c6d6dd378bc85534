//! MongoDB test infrastructure
//!
//! Provides a `TestMongo` helper that starts a single-node replica set in a
//! container.

use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;

/// Test MongoDB wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestMongo;
///
/// # async fn example() {
/// let mongo = TestMongo::new().await;
/// let uri = mongo.connection_string();
/// // Build a ConnectionConfig from `uri`
/// # }
/// ```
pub struct TestMongo {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    pub connection_string: String,
}

impl TestMongo {
    /// Start a single-member replica set (`rs`) and wait until it accepts writes
    pub async fn new() -> Self {
        let container = Mongo::repl_set()
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let host_port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");

        // The member advertises its container hostname, so skip discovery
        let connection_string = format!("mongodb://127.0.0.1:{host_port}/?directConnection=true");

        tracing::info!(port = host_port, "Test MongoDB ready (replica set rs)");

        Self {
            container,
            connection_string,
        }
    }

    /// Connection string for building a client or manager config
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestMongo {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test MongoDB container");
    }
}
