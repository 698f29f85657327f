//! Storage-specific errors

use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// The `profiles` table has not been created yet. Recoverable: callers
    /// seed the store and retry the read once.
    #[error("profiles table does not exist")]
    MissingTable,

    /// Any other database failure. Not recoverable by seeding.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Classify a query failure, mapping the missing-table signature to
    /// [`StorageError::MissingTable`] and passing everything else through.
    pub fn from_query_error(err: sqlx::Error) -> Self {
        if is_missing_table(&err) {
            Self::MissingTable
        } else {
            Self::Database(err)
        }
    }

    /// True when the error is the recoverable missing-table condition.
    pub fn is_missing_table(&self) -> bool {
        matches!(self, Self::MissingTable)
    }
}

/// Whether `err` carries the store's missing-table signature.
fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => message_is_missing_table(db.message()),
        _ => false,
    }
}

/// SQLite reports `no such table: profiles`; Postgres phrases the same
/// condition as `relation "profiles" does not exist`. Matched on the message
/// because SQLite assigns no dedicated error code to it.
fn message_is_missing_table(message: &str) -> bool {
    message.contains("no such table")
        || (message.contains("relation") && message.contains("does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_sqlite_wording() {
        assert!(message_is_missing_table("no such table: profiles"));
    }

    #[test]
    fn recognizes_postgres_wording() {
        assert!(message_is_missing_table(
            r#"relation "profiles" does not exist"#
        ));
    }

    #[test]
    fn leaves_other_messages_alone() {
        assert!(!message_is_missing_table("no such column: email"));
        assert!(!message_is_missing_table("near \"SELEC\": syntax error"));
        assert!(!message_is_missing_table("UNIQUE constraint failed: profiles.email"));
    }
}
