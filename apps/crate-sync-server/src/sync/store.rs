//! Change store contract
//!
//! Both the in-memory log and the SQL-backed logs implement [`ChangeStore`].
//! The server picks one at startup and keeps it for the process lifetime.

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use super::types::Change;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a change store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call exceeded its deadline")]
    DeadlineExceeded,

    #[error("Unsupported database url: {0}")]
    UnsupportedUrl(String),
}

/// Which implementation backs a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Postgres,
    Sqlite,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Append-only log of change records.
///
/// `since` is fail-open: an empty or unparsable cursor returns the whole log,
/// and a record whose own timestamp cannot be parsed is always included.
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// Normalize timestamps and append the batch in input order.
    ///
    /// Returns the number of records appended. On error nothing from the batch
    /// is visible.
    async fn append(&self, changes: Vec<Change>) -> StoreResult<usize>;

    /// Records with `ts` at or after `cursor`.
    async fn since(&self, cursor: &str) -> StoreResult<Vec<Change>>;

    fn kind(&self) -> StoreKind;
}

/// Run a store call, aborting it once `deadline` passes.
///
/// The inner future is dropped on expiry, which rolls back any open
/// transaction.
pub async fn with_deadline<T, F>(deadline: Instant, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result = with_deadline(deadline, async { Ok(3usize) }).await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_deadline_expiry() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let result: StoreResult<()> = with_deadline(deadline, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
    }

    #[test]
    fn test_store_kind_names() {
        assert_eq!(StoreKind::Memory.as_str(), "memory");
        assert_eq!(StoreKind::Postgres.as_str(), "postgres");
        assert_eq!(StoreKind::Sqlite.as_str(), "sqlite");
    }
}
