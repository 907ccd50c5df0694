//! SQLite-backed change log

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::store::{ChangeStore, StoreKind, StoreResult};
use super::timestamp::{ceil_to_second, format_cursor, normalize_batch, parse_cursor};
use super::types::Change;
use crate::db::initialize_sqlite_schema;

/// Rows per INSERT statement; 8 binds each stays well under SQLite's limit.
const INSERT_CHUNK: usize = 500;

/// Durable change log on SQLite.
///
/// Results are ordered by `ts`, then by insertion id.
pub struct SqliteChangeStore {
    pool: SqlitePool,
}

impl SqliteChangeStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        initialize_sqlite_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_all(&self) -> StoreResult<Vec<Change>> {
        let rows = sqlx::query_as::<_, Change>(
            r#"
            SELECT entity_type, entity_id, field, value_hash, device_id,
                   lamport_clock, vector_clock, ts
            FROM sync_changes
            ORDER BY ts ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl ChangeStore for SqliteChangeStore {
    async fn append(&self, changes: Vec<Change>) -> StoreResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        let changes = normalize_batch(changes, Utc::now());

        let mut tx = self.pool.begin().await?;
        for chunk in changes.chunks(INSERT_CHUNK) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO sync_changes (entity_type, entity_id, field, value_hash, \
                 device_id, lamport_clock, vector_clock, ts) ",
            );
            insert.push_values(chunk, |mut row, change| {
                row.push_bind(change.entity_type.clone())
                    .push_bind(change.entity_id.clone())
                    .push_bind(change.field.clone())
                    .push_bind(change.value_hash.clone())
                    .push_bind(change.device_id.clone())
                    .push_bind(change.lamport_clock)
                    .push_bind(change.vector_clock.clone())
                    .push_bind(change.ts.clone());
            });
            insert.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = changes.len(), "Appended changes to sqlite log");
        Ok(changes.len())
    }

    async fn since(&self, cursor: &str) -> StoreResult<Vec<Change>> {
        if cursor.is_empty() {
            return self.fetch_all().await;
        }
        let Some(cursor_ts) = parse_cursor(cursor) else {
            tracing::debug!(cursor, "Unparsable cursor, returning full log");
            return self.fetch_all().await;
        };

        let rows = sqlx::query_as::<_, Change>(
            r#"
            SELECT entity_type, entity_id, field, value_hash, device_id,
                   lamport_clock, vector_clock, ts
            FROM sync_changes
            WHERE ts >= ?
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(format_cursor(ceil_to_second(cursor_ts)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Sqlite
    }
}
