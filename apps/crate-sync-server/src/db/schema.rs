//! Database schema initialization
//!
//! One append-only table per backend. Rows are never updated or deleted and
//! nothing is unique except the surrogate id, so a retried push stores
//! duplicate rows.

use sqlx::{PgPool, SqlitePool};

use crate::sync::StoreResult;

/// Create the SQLite change table and its `ts` index
pub async fn initialize_sqlite_schema(pool: &SqlitePool) -> StoreResult<()> {
    for statement in SQLITE_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Create the PostgreSQL change table and its `ts` index
pub async fn initialize_postgres_schema(pool: &PgPool) -> StoreResult<()> {
    for statement in POSTGRES_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

// `ts` holds the fixed `YYYY-MM-DDTHH:MM:SSZ` text, which sorts in time order.
const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sync_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        field TEXT NOT NULL,
        value_hash TEXT NOT NULL,
        device_id TEXT NOT NULL,
        lamport_clock INTEGER NOT NULL,
        vector_clock TEXT NOT NULL,
        ts TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sync_changes_ts ON sync_changes(ts)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sync_changes (
        id BIGSERIAL PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        field TEXT NOT NULL,
        value_hash TEXT NOT NULL,
        device_id TEXT NOT NULL,
        lamport_clock BIGINT NOT NULL,
        vector_clock TEXT NOT NULL,
        ts TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sync_changes_ts ON sync_changes(ts)",
];
