/// Common test utilities and fixtures
use roster_telemetry::{Telemetry, TelemetryConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// Create a file-backed test store in a fresh temp directory.
///
/// No tables are created; the store starts empty so tests exercise the
/// seed-on-first-read fallback. The returned guard must outlive the pool.
pub async fn create_test_store() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("roster.db");
    let url = format!("sqlite://{}", db_path.display());
    let pool = roster_storage::create_pool(&url).await.unwrap();
    (pool, temp_dir)
}

/// Telemetry stack with default settings (no collector configured).
///
/// Each call builds an isolated provider, so parallel tests never observe
/// each other's spans.
pub fn create_test_telemetry() -> Arc<Telemetry> {
    Arc::new(Telemetry::new(&TelemetryConfig::default()))
}
