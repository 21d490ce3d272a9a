//! Quarry Test Utilities
//!
//! Shared test infrastructure for the Quarry workspace:
//! - Proptest generators for paths, namespaces and payloads
//! - Fixtures wiring a datastore to the in-memory engine and a mock clock
//! - Assertions on error kinds
//! - Tracing setup for tests

pub use quarry_core::{
    derive_identifier, DatastoreConfig, ErrorKind, Identifier, MockClock, Namespace, QuarryError,
    QuarryResult, Record,
};
pub use quarry_storage::{Datastore, InMemorySearchBackend, OpContext};

use std::sync::Once;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for datastore inputs.

    use super::*;
    use proptest::prelude::*;

    /// A valid tenant namespace.
    pub fn arb_namespace() -> impl Strategy<Value = Namespace> {
        "[a-z0-9][a-z0-9._-]{0,15}".prop_map(|s| Namespace::new(s).expect("valid namespace"))
    }

    /// A slash-separated virtual path.
    pub fn arb_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9_.-]{1,10}", 1..5)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    /// Any string at all, including empty and non-ASCII ones.
    pub fn arb_any_path() -> impl Strategy<Value = String> {
        ".{0,64}"
    }

    /// A JSON object payload serialized to a string.
    pub fn arb_json_payload() -> impl Strategy<Value = String> {
        prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..4).prop_map(|map| {
            serde_json::to_string(&map).expect("map of integers serializes")
        })
    }

    /// A payload type tag.
    pub fn arb_kind() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Generic".to_string()),
            Just("Dashboard".to_string()),
            Just("Pipeline".to_string()),
            "[A-Z][a-z]{2,8}",
        ]
    }

    /// A sequence of payloads to write to one path, oldest first.
    pub fn arb_version_payloads(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z0-9]{1,12}", 1..=max)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made datastores and values for tests.

    use super::*;
    use std::sync::Arc;

    /// Classification used by fixtures.
    pub const CLASSIFICATION: &str = "datastore";

    /// A datastore over a fresh in-memory engine.
    pub struct TestDatastore {
        pub store: Datastore<InMemorySearchBackend>,
        pub backend: Arc<InMemorySearchBackend>,
        /// Starts at 1_000 and advances by 1 per read.
        pub clock: Arc<MockClock>,
        pub ctx: OpContext,
    }

    pub fn test_datastore() -> TestDatastore {
        test_datastore_with(InMemorySearchBackend::new(), DatastoreConfig::default())
    }

    pub fn test_datastore_with(
        backend: InMemorySearchBackend,
        config: DatastoreConfig,
    ) -> TestDatastore {
        let backend = Arc::new(backend);
        let clock = Arc::new(MockClock::ticking(1_000, 1));
        let store = Datastore::new(Arc::clone(&backend), clock.clone(), config)
            .expect("fixture config is valid");
        TestDatastore {
            store,
            backend,
            clock,
            ctx: OpContext::background(),
        }
    }

    pub fn org1() -> Namespace {
        Namespace::new("org1").expect("valid namespace")
    }

    pub fn org2() -> Namespace {
        Namespace::new("org2").expect("valid namespace")
    }

    /// A record as it would be written for `path` at `timestamp`.
    pub fn test_record(path: &str, payload: &str, timestamp: i64) -> Record {
        Record::new(CLASSIFICATION, path, "Generic", payload, timestamp)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on datastore results.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &QuarryResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "Wrong error kind: {e}"),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", kind, v),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert_error_kind(result, ErrorKind::NotFound);
    }

    #[track_caller]
    pub fn assert_backend_unavailable<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert_error_kind(result, ErrorKind::BackendUnavailable);
    }

    #[track_caller]
    pub fn assert_corrupt_record<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert_error_kind(result, ErrorKind::CorruptRecord);
    }

    #[track_caller]
    pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert_error_kind(result, ErrorKind::InvalidArgument);
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &QuarryResult<T>) {
        assert_error_kind(result, ErrorKind::Cancelled);
    }

    /// Assert that `record` is the version of `path` holding `payload`.
    #[track_caller]
    pub fn assert_record(record: &Record, path: &str, payload: &str) {
        assert_eq!(record.path, path, "Wrong path");
        assert_eq!(record.identifier, derive_identifier(path), "Identifier not derived from path");
        assert_eq!(record.payload, payload, "Wrong payload");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_namespaces_differ() {
        assert_ne!(fixtures::org1(), fixtures::org2());
    }

    #[test]
    fn test_test_record_fixture() {
        let record = fixtures::test_record("/a/b.db", "v1", 100);
        assertions::assert_record(&record, "/a/b.db", "v1");
        assert_eq!(record.classification, fixtures::CLASSIFICATION);
        assert_eq!(record.timestamp, 100);
    }

    #[tokio::test]
    async fn test_datastore_fixture_round_trips() {
        init_test_tracing();
        let t = fixtures::test_datastore();
        let ns = fixtures::org1();
        t.store
            .put(&t.ctx, &ns, fixtures::CLASSIFICATION, "/p", "Generic", "v1")
            .await
            .unwrap();

        let result = t.store.get(&t.ctx, &ns, fixtures::CLASSIFICATION, "/p").await;
        assertions::assert_ok(&result);
        assertions::assert_record(&result.unwrap(), "/p", "v1");
    }

    #[test]
    fn test_assert_error_kind_matches() {
        let result: QuarryResult<()> = Err(QuarryError::backend("down"));
        assertions::assert_backend_unavailable(&result);
    }

    #[test]
    #[should_panic(expected = "Expected NotFound error")]
    fn test_assert_error_kind_rejects_ok() {
        assertions::assert_not_found(&Ok::<_, QuarryError>(1));
    }

    proptest! {
        #[test]
        fn prop_generated_paths_are_absolute(path in generators::arb_path()) {
            prop_assert!(path.starts_with('/'));
            prop_assert!(!path.contains("//"));
        }

        #[test]
        fn prop_generated_payloads_are_json(payload in generators::arb_json_payload()) {
            prop_assert!(serde_json::from_str::<serde_json::Value>(&payload).is_ok());
        }
    }
}
