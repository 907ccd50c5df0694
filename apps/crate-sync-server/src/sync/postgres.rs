//! PostgreSQL-backed change log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::store::{ChangeStore, StoreKind, StoreResult};
use super::timestamp::{format_cursor, normalize_instant, parse_cursor};
use super::types::Change;
use crate::db::initialize_postgres_schema;

/// Rows per INSERT statement; 8 binds each stays under the 65535 bind limit.
const INSERT_CHUNK: usize = 1000;

/// Durable change log on PostgreSQL.
///
/// `ts` is a `TIMESTAMPTZ`, so cursor filtering is a native comparison served
/// by the `ts` index. Results are ordered by `ts`, then by insertion id.
pub struct PgChangeStore {
    pool: PgPool,
}

impl PgChangeStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: PgPool) -> StoreResult<Self> {
        initialize_postgres_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, cursor: Option<DateTime<Utc>>) -> StoreResult<Vec<Change>> {
        let rows = match cursor {
            None => {
                sqlx::query_as::<_, ChangeRow>(
                    r#"
                    SELECT entity_type, entity_id, field, value_hash, device_id,
                           lamport_clock, vector_clock, ts
                    FROM sync_changes
                    ORDER BY ts ASC, id ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
            Some(cursor) => {
                sqlx::query_as::<_, ChangeRow>(
                    r#"
                    SELECT entity_type, entity_id, field, value_hash, device_id,
                           lamport_clock, vector_clock, ts
                    FROM sync_changes
                    WHERE ts >= $1
                    ORDER BY ts ASC, id ASC
                    "#,
                )
                .bind(cursor)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(ChangeRow::into_change).collect())
    }
}

#[async_trait]
impl ChangeStore for PgChangeStore {
    async fn append(&self, changes: Vec<Change>) -> StoreResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        for chunk in changes.chunks(INSERT_CHUNK) {
            let mut insert: QueryBuilder<Postgres> = QueryBuilder::new(
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
                    .push_bind(normalize_instant(&change.ts, now));
            });
            insert.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = changes.len(), "Appended changes to postgres log");
        Ok(changes.len())
    }

    async fn since(&self, cursor: &str) -> StoreResult<Vec<Change>> {
        if cursor.is_empty() {
            return self.fetch(None).await;
        }
        match parse_cursor(cursor) {
            Some(cursor_ts) => self.fetch(Some(cursor_ts)).await,
            None => {
                tracing::debug!(cursor, "Unparsable cursor, returning full log");
                self.fetch(None).await
            }
        }
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Postgres
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    entity_type: String,
    entity_id: String,
    field: String,
    value_hash: String,
    device_id: String,
    lamport_clock: i64,
    vector_clock: String,
    ts: DateTime<Utc>,
}

impl ChangeRow {
    fn into_change(self) -> Change {
        Change {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            field: self.field,
            value_hash: self.value_hash,
            device_id: self.device_id,
            lamport_clock: self.lamport_clock,
            vector_clock: self.vector_clock,
            ts: format_cursor(self.ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_renders_cursor_profile() {
        let row = ChangeRow {
            entity_type: "playlist".to_string(),
            entity_id: "p1".to_string(),
            field: "name".to_string(),
            value_hash: "abc".to_string(),
            device_id: "d1".to_string(),
            lamport_clock: 5,
            vector_clock: "{}".to_string(),
            ts: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };

        let change = row.into_change();
        assert_eq!(change.ts, "2024-01-02T03:04:05Z");
        assert_eq!(change.lamport_clock, 5);
        assert_eq!(change.entity_type, "playlist");
    }

    /// Runs against a live server when `TEST_DATABASE_URL` is set.
    /// The `sync_changes` table in that database is truncated.
    #[tokio::test]
    async fn test_against_live_postgres() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        let store = PgChangeStore::new(pool).await.unwrap();
        sqlx::query("TRUNCATE sync_changes")
            .execute(store.pool())
            .await
            .unwrap();

        let change = |id: &str, ts: &str| Change {
            entity_type: "track".to_string(),
            entity_id: id.to_string(),
            field: "bpm".to_string(),
            value_hash: "h".to_string(),
            device_id: "d1".to_string(),
            lamport_clock: 1,
            vector_clock: "{}".to_string(),
            ts: ts.to_string(),
        };

        let appended = store
            .append(vec![
                change("t2", "2024-01-02T00:00:00Z"),
                change("t1", "2024-01-01T00:00:00Z"),
                change("t3", "2024-01-02T00:00:00Z"),
            ])
            .await
            .unwrap();
        assert_eq!(appended, 3);

        let all = store.since("").await.unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2", "t3"]);
        assert_eq!(all[0].ts, "2024-01-01T00:00:00Z");

        let recent = store.since("2024-01-01T12:00:00Z").await.unwrap();
        assert_eq!(recent.len(), 2);

        let round_trip = store.since(&all[0].ts).await.unwrap();
        assert_eq!(round_trip.len(), 3);

        assert_eq!(store.since("garbage").await.unwrap().len(), 3);
    }
}
