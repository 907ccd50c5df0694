//! Sync module for multi-device synchronization
//!
//! Provides:
//! - The change record exchanged between devices
//! - An append-only change log (in memory, SQLite or PostgreSQL)
//! - Cursor-based retrieval of changes
//!
//! # Sync Protocol
//!
//! 1. A device mutates a field locally, bumps its Lamport clock and pushes a
//!    `Change` carrying a hash of the new value
//! 2. The server normalizes `ts` and appends the batch to the log
//! 3. Other devices pull with the last `ts` they saw as the cursor
//! 4. A device compares `value_hash` and the clocks, then fetches fresh data
//!    for entities it is missing
//!
//! The cursor is inclusive, so a device sees the boundary record again on its
//! next pull. Consumers drop repeats with [`dedup_changes`]. Conflict
//! resolution happens on the devices; the vector clock is carried opaquely.

mod memory;
mod postgres;
mod service;
mod sqlite;
mod store;
mod timestamp;
mod types;

pub use memory::MemoryChangeStore;
pub use postgres::PgChangeStore;
pub use service::SyncService;
pub use sqlite::SqliteChangeStore;
pub use store::{with_deadline, ChangeStore, StoreError, StoreKind, StoreResult};
pub use timestamp::{format_cursor, normalize_batch, normalize_ts, parse_cursor, CURSOR_FORMAT};
pub use types::{dedup_changes, Change, ChangeKey, PullQuery, PushResponse};
