//! Profile queries
//!
//! The read side of the store: one unparameterized select over the
//! `profiles` table. Rows come back in store-return order (SQLite rowid
//! order, which is insertion order for this table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{Result, StorageError};

/// A stored user profile.
///
/// `name` doubles as the display key in the rendered roster; the seed
/// dataset keeps it unique alongside the uniqueness constraint on `email`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Fetch every stored profile.
///
/// Fails with [`StorageError::MissingTable`] when the table has not been
/// created yet; any other failure surfaces unchanged.
pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Profile>> {
    sqlx::query_as::<_, Profile>("SELECT name, email, image, created_at FROM profiles")
        .fetch_all(pool)
        .await
        .map_err(StorageError::from_query_error)
}

/// Count stored profiles without materializing rows.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
        .fetch_one(pool)
        .await
        .map_err(StorageError::from_query_error)?;
    Ok(row.0)
}
