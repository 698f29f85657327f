//! Seed operation
//!
//! Creates the `profiles` table when absent and fills it with the demo
//! dataset. Idempotent by construction: `CREATE TABLE IF NOT EXISTS` plus
//! `INSERT OR IGNORE` keyed on the unique email means racing callers and
//! repeated runs converge on the same five rows.

use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;

use crate::error::Result;

const CREATE_PROFILES: &str = include_str!("../../sql/create_profiles.sql");

/// Demo people inserted on first run: (name, email, minutes since joining).
///
/// Ages are staggered from minutes to days so the rendered roster exercises
/// several relative-time buckets at once.
const DEMO_PROFILES: &[(&str, &str, i64)] = &[
    ("Ada Lovelace", "ada@roster.dev", 4),
    ("Grace Hopper", "grace@roster.dev", 32),
    ("Alan Turing", "alan@roster.dev", 190),
    ("Katherine Johnson", "katherine@roster.dev", 1_500),
    ("Margaret Hamilton", "margaret@roster.dev", 12_000),
];

/// Create and populate the `profiles` table. Returns the number of rows
/// actually inserted, which is zero when the dataset is already present.
///
/// Runs in a single transaction, so a concurrent reader sees either no
/// table or the complete dataset, never a partial one.
pub async fn seed(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query(CREATE_PROFILES).execute(&mut *tx).await?;

    let now = Utc::now();
    let mut inserted = 0;
    for (name, email, minutes_ago) in DEMO_PROFILES {
        let image = format!("https://i.pravatar.cc/128?u={email}");
        let created_at = now - TimeDelta::minutes(*minutes_ago);
        let result = sqlx::query(
            "INSERT OR IGNORE INTO profiles (name, email, image, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(&image)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}
