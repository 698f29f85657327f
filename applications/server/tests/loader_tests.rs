/// Profile loader integration tests
/// Exercises the seed-on-missing-table fallback against a real store
mod common;

use async_trait::async_trait;
use common::{create_test_store, create_test_telemetry};
use roster_server::services::{ProfileLoader, Seeder, StoreSeeder};
use roster_storage::StorageError;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Seeder that counts invocations before delegating to the real one.
struct CountingSeeder {
    calls: AtomicUsize,
    inner: StoreSeeder,
}

impl CountingSeeder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            inner: StoreSeeder,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Seeder for CountingSeeder {
    async fn seed(&self, pool: &SqlitePool) -> Result<u64, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.seed(pool).await
    }
}

/// Seeder that stalls before delegating, to expose the timing baseline.
struct SlowSeeder {
    delay: Duration,
    inner: StoreSeeder,
}

#[async_trait]
impl Seeder for SlowSeeder {
    async fn seed(&self, pool: &SqlitePool) -> Result<u64, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.seed(pool).await
    }
}

/// Seeder that always fails.
struct FailingSeeder;

#[async_trait]
impl Seeder for FailingSeeder {
    async fn seed(&self, _pool: &SqlitePool) -> Result<u64, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }
}

#[tokio::test]
async fn first_load_seeds_the_store_and_retries_once() {
    let (pool, _guard) = create_test_store().await;
    let telemetry = create_test_telemetry();
    let seeder = CountingSeeder::new();
    let loader = ProfileLoader::with_seeder(pool, seeder.clone());

    let (trace, session) = telemetry.begin_request(None);
    let loaded = loader.load(&trace).await.unwrap();
    let reported = session.finish();

    assert_eq!(loaded.profiles.len(), 5);
    assert!(loaded.seeded);
    assert_eq!(seeder.calls(), 1);
    assert_eq!(
        reported.span_names(),
        vec!["load-profiles", "seed-profiles", "load-profiles"]
    );
}

#[tokio::test]
async fn loading_a_seeded_store_skips_the_seeder() {
    let (pool, _guard) = create_test_store().await;
    roster_storage::seed::seed(&pool).await.unwrap();

    let telemetry = create_test_telemetry();
    let seeder = CountingSeeder::new();
    let loader = ProfileLoader::with_seeder(pool, seeder.clone());

    let (trace, session) = telemetry.begin_request(None);
    let loaded = loader.load(&trace).await.unwrap();
    let reported = session.finish();

    assert_eq!(loaded.profiles.len(), 5);
    assert!(!loaded.seeded);
    assert_eq!(seeder.calls(), 0);
    assert_eq!(reported.span_names(), vec!["load-profiles"]);
}

#[tokio::test]
async fn unrelated_store_errors_do_not_trigger_seeding() {
    let (pool, _guard) = create_test_store().await;
    // A profiles table without the expected columns fails the read with
    // something other than a missing table.
    sqlx::query("CREATE TABLE profiles (id INTEGER PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();

    let telemetry = create_test_telemetry();
    let seeder = CountingSeeder::new();
    let loader = ProfileLoader::with_seeder(pool, seeder.clone());

    let (trace, session) = telemetry.begin_request(None);
    let err = loader.load(&trace).await.unwrap_err();
    let reported = session.finish();

    assert!(matches!(err, StorageError::Database(_)));
    assert_eq!(seeder.calls(), 0);
    assert_eq!(reported.span_names(), vec!["load-profiles"]);
}

#[tokio::test]
async fn seed_failure_propagates_without_a_retry() {
    let (pool, _guard) = create_test_store().await;
    let telemetry = create_test_telemetry();
    let loader = ProfileLoader::with_seeder(pool, Arc::new(FailingSeeder));

    let (trace, session) = telemetry.begin_request(None);
    let err = loader.load(&trace).await.unwrap_err();
    let reported = session.finish();

    assert!(matches!(err, StorageError::Database(_)));
    // The failed seed still leaves both opened spans in the report, but no
    // retry read ever happened.
    assert_eq!(reported.span_names(), vec!["load-profiles", "seed-profiles"]);
}

#[tokio::test]
async fn elapsed_excludes_the_seed_detour() {
    let (pool, _guard) = create_test_store().await;
    let telemetry = create_test_telemetry();
    let delay = Duration::from_millis(250);
    let loader = ProfileLoader::with_seeder(
        pool,
        Arc::new(SlowSeeder {
            delay,
            inner: StoreSeeder,
        }),
    );

    let (trace, _session) = telemetry.begin_request(None);
    let loaded = loader.load(&trace).await.unwrap();

    assert!(loaded.seeded);
    assert!(
        loaded.elapsed < delay,
        "elapsed {:?} includes the seed detour",
        loaded.elapsed
    );
}

#[tokio::test]
async fn concurrent_first_loads_both_see_the_full_roster() {
    let (pool, _guard) = create_test_store().await;
    let telemetry = create_test_telemetry();
    let seeder = CountingSeeder::new();
    let loader = ProfileLoader::with_seeder(pool, seeder.clone());

    let (trace_a, _session_a) = telemetry.begin_request(None);
    let (trace_b, _session_b) = telemetry.begin_request(None);

    let (a, b) = tokio::join!(loader.load(&trace_a), loader.load(&trace_b));

    // Seeding is transactional and idempotent: whichever interleaving
    // happens, both requests end up with the complete dataset.
    assert_eq!(a.unwrap().profiles.len(), 5);
    assert_eq!(b.unwrap().profiles.len(), 5);
    let calls = seeder.calls();
    assert!((1..=2).contains(&calls), "unexpected seed count {calls}");
}
