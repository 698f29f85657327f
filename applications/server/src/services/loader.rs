/// Profile loading service - read, seed-once fallback, single retry
use async_trait::async_trait;
use opentelemetry::trace::Span as _;
use roster_storage::{profiles, seed, Profile, StorageError};
use roster_telemetry::TraceContext;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a roster load: the rows, how long the read that returned them
/// took, and whether this request had to seed the store first.
#[derive(Debug, Clone)]
pub struct LoadedProfiles {
    pub profiles: Vec<Profile>,
    pub elapsed: Duration,
    pub seeded: bool,
}

/// Seam over the seed operation so tests can count invocations or slow
/// them down.
#[async_trait]
pub trait Seeder: Send + Sync {
    async fn seed(&self, pool: &SqlitePool) -> Result<u64, StorageError>;
}

/// Production seeder: writes the demo dataset through the store.
#[derive(Debug, Clone, Default)]
pub struct StoreSeeder;

#[async_trait]
impl Seeder for StoreSeeder {
    async fn seed(&self, pool: &SqlitePool) -> Result<u64, StorageError> {
        seed::seed(pool).await
    }
}

/// Loads the roster, seeding the store at most once per call when the
/// `profiles` table does not exist yet.
pub struct ProfileLoader {
    pool: SqlitePool,
    seeder: Arc<dyn Seeder>,
}

impl ProfileLoader {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            seeder: Arc::new(StoreSeeder),
        }
    }

    /// Build a loader with a replacement seed collaborator. Test hook.
    pub fn with_seeder(pool: SqlitePool, seeder: Arc<dyn Seeder>) -> Self {
        Self { pool, seeder }
    }

    /// Load every profile, timing the read that actually produced rows.
    ///
    /// A missing `profiles` table triggers the one-shot fallback: seed the
    /// store, reset the timing baseline, and retry the read exactly once.
    /// Any other error, and any error after the retry, propagates unchanged.
    /// Each attempt and the seed run under their own span on `trace`; a span
    /// that is not ended explicitly is closed by drop, so every opened span
    /// is exported exactly once on failure paths too.
    pub async fn load(&self, trace: &TraceContext) -> Result<LoadedProfiles, StorageError> {
        let mut started = Instant::now();
        let mut span = trace.start_span("load-profiles");
        let first_attempt = profiles::fetch_all(&self.pool).await;
        span.end();

        let rows = match first_attempt {
            Ok(rows) => rows,
            Err(StorageError::MissingTable) => {
                tracing::info!("profiles table missing, seeding demo data");

                let mut seed_span = trace.start_span("seed-profiles");
                let seeded = self.seeder.seed(&self.pool).await;
                seed_span.end();
                let inserted = seeded?;
                tracing::info!(rows = inserted, "profile store seeded");

                // The caller sees the duration of the read that produced
                // rows, not the seed detour.
                started = Instant::now();
                let mut retry_span = trace.start_span("load-profiles");
                let retried = profiles::fetch_all(&self.pool).await;
                retry_span.end();

                return Ok(LoadedProfiles {
                    profiles: retried?,
                    elapsed: started.elapsed(),
                    seeded: true,
                });
            }
            Err(other) => return Err(other),
        };

        Ok(LoadedProfiles {
            profiles: rows,
            elapsed: started.elapsed(),
            seeded: false,
        })
    }
}
