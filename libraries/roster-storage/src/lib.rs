//! Roster Storage
//!
//! SQLite-backed profile store for the Roster demo service.
//!
//! The store runs no migrations at startup. The `profiles` table is created
//! by [`seed::seed`] the first time a read reports it missing, which keeps
//! the missing-table fallback in the service a live code path rather than a
//! dead one.
//!
//! # Example
//!
//! ```rust,no_run
//! use roster_storage::{create_pool, profiles, seed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("sqlite://roster.db").await?;
//!     seed::seed(&pool).await?;
//!     let rows = profiles::fetch_all(&pool).await?;
//!     println!("{} profiles", rows.len());
//!     Ok(())
//! }
//! ```

pub mod profiles;
pub mod seed;

mod error;

pub use error::{Result, StorageError};
pub use profiles::Profile;

use sqlx::sqlite::SqlitePool;

/// Create a new `SQLite` connection pool.
///
/// The database file is created when missing, so a fresh deployment starts
/// from an empty store rather than a connection error.
pub async fn create_pool(database_url: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
