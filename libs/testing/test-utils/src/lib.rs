//! Shared test utilities for the connection manager
//!
//! - `TestMongo`: MongoDB replica-set container with automatic cleanup
//! - `TestDataBuilder`: Deterministic probe payloads and database names
//! - `assertions`: Custom assertion helpers
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let database = builder.database_name("probe");
//!     let payload = builder.probe_document("main");
//! }
//! ```

use mongodb::bson::{Document, doc, oid::ObjectId};

mod mongo;

pub use mongo::TestMongo;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_probe_round_trip");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic ObjectId derived from the seed
    pub fn object_id(&self) -> ObjectId {
        let bytes = self.seed.to_be_bytes();
        let mut oid = [0u8; 12];
        oid[..8].copy_from_slice(&bytes);
        oid[8..].copy_from_slice(&bytes[..4]);
        ObjectId::from_bytes(oid)
    }

    /// Database name unique to this test, e.g. `test_probe_12345`
    ///
    /// MongoDB limits database names to 63 bytes; this stays well under.
    pub fn database_name(&self, prefix: &str) -> String {
        format!("test_{}_{}", prefix, self.seed)
    }

    /// Probe payload with a mix of BSON types, tagged with `label`
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let payload = builder.probe_document("main");
    /// assert_eq!(payload.get_str("label").unwrap(), "main");
    /// ```
    pub fn probe_document(&self, label: &str) -> Document {
        doc! {
            "name": format!("probe-{}-{}", self.seed, label),
            "label": label,
            "seed": self.seed as i64,
            "tags": ["probe", label],
            "meta": { "source": "test-utils", "attempt": 1 },
        }
    }
}

/// Test assertion helpers
pub mod assertions {
    use mongodb::bson::Document;

    /// Assert that every field of `expected` appears in `actual` with the same value
    pub fn assert_contains_fields(actual: &Document, expected: &Document, context: &str) {
        for (key, value) in expected {
            assert_eq!(
                actual.get(key),
                Some(value),
                "{}: field `{}` differs in {}",
                context,
                key,
                actual
            );
        }
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
