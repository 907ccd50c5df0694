//! Database module
//!
//! Picks the change store backend from the configured connection string and
//! opens its pool.

mod schema;

pub use schema::*;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;
use crate::sync::{
    ChangeStore, MemoryChangeStore, PgChangeStore, SqliteChangeStore, StoreError, StoreResult,
};

/// Durable backends, chosen by URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> StoreResult<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            Err(StoreError::UnsupportedUrl(redact(url)))
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_sqlite_pool(database_url: &str, max_connections: u32) -> StoreResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create a PostgreSQL connection pool
pub async fn create_postgres_pool(database_url: &str, max_connections: u32) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Open the change store described by `config`.
///
/// Without a URL the log lives in memory.
pub async fn open_store(config: &DatabaseConfig) -> StoreResult<Arc<dyn ChangeStore>> {
    let Some(url) = config.url.as_deref() else {
        return Ok(Arc::new(MemoryChangeStore::new()));
    };

    match Backend::from_url(url)? {
        Backend::Postgres => {
            let pool = create_postgres_pool(url, config.max_connections).await?;
            Ok(Arc::new(PgChangeStore::new(pool).await?))
        }
        Backend::Sqlite => {
            let pool = create_sqlite_pool(url, config.max_connections).await?;
            Ok(Arc::new(SqliteChangeStore::new(pool).await?))
        }
    }
}

/// Strip credentials from a connection string before it is logged.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
