//! Push/pull operations over the active change store

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::store::{with_deadline, ChangeStore, StoreKind, StoreResult};
use super::types::Change;

/// Stateless front for whichever [`ChangeStore`] was chosen at startup.
///
/// Every call runs under a deadline: the configured default, or one supplied
/// by the caller through the `*_until` variants.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn ChangeStore>,
    timeout: Duration,
}

impl SyncService {
    pub fn new(store: Arc<dyn ChangeStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    /// Changes at or after `cursor`; `None` or `""` returns the whole log.
    pub async fn pull(&self, cursor: Option<&str>) -> StoreResult<Vec<Change>> {
        self.pull_until(cursor, Instant::now() + self.timeout).await
    }

    pub async fn pull_until(
        &self,
        cursor: Option<&str>,
        deadline: Instant,
    ) -> StoreResult<Vec<Change>> {
        let cursor = cursor.unwrap_or_default();
        let result = with_deadline(deadline, self.store.since(cursor)).await;
        match &result {
            Ok(changes) => tracing::debug!(cursor, count = changes.len(), "Pulled changes"),
            Err(e) => tracing::error!(cursor, error = %e, "Pull failed"),
        }
        result
    }

    /// Append a batch; the whole batch fails or succeeds together.
    pub async fn push(&self, changes: Vec<Change>) -> StoreResult<usize> {
        self.push_until(changes, Instant::now() + self.timeout).await
    }

    pub async fn push_until(&self, changes: Vec<Change>, deadline: Instant) -> StoreResult<usize> {
        let submitted = changes.len();
        let result = with_deadline(deadline, self.store.append(changes)).await;
        match &result {
            Ok(count) => tracing::info!(count, "Accepted pushed changes"),
            Err(e) => tracing::error!(submitted, error = %e, "Push failed"),
        }
        result
    }
}
