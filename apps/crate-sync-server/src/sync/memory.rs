//! In-memory change log
//!
//! Used when no database is configured. Contents are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::store::{ChangeStore, StoreKind, StoreResult};
use super::timestamp::{normalize_batch, parse_cursor};
use super::types::Change;

/// Process-local change log guarded by a reader/writer lock.
///
/// Appends are exclusive; pulls share the lock, so a pull never sees half of
/// an append. Results keep append order, including between equal timestamps.
#[derive(Default)]
pub struct MemoryChangeStore {
    changes: RwLock<Vec<Change>>,
}

impl MemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.read().is_empty()
    }
}

#[async_trait]
impl ChangeStore for MemoryChangeStore {
    async fn append(&self, changes: Vec<Change>) -> StoreResult<usize> {
        let count = changes.len();
        let mut log = self.changes.write();
        log.extend(normalize_batch(changes, Utc::now()));
        tracing::debug!(count, total = log.len(), "Appended changes to memory log");
        Ok(count)
    }

    async fn since(&self, cursor: &str) -> StoreResult<Vec<Change>> {
        let log = self.changes.read();
        if cursor.is_empty() {
            return Ok(log.clone());
        }

        let Some(cursor_ts) = parse_cursor(cursor) else {
            tracing::debug!(cursor, "Unparsable cursor, returning full log");
            return Ok(log.clone());
        };

        Ok(log
            .iter()
            .filter(|change| match parse_cursor(&change.ts) {
                Some(ts) => ts >= cursor_ts,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}
