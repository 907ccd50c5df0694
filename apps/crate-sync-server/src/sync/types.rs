//! Sync data types
//!
//! Defines the change record exchanged between devices and the
//! request/response shapes of the changes API.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One field-level mutation on one entity.
///
/// The record never carries the new value itself, only `value_hash`, a
/// fingerprint that lets a device tell whether it already holds the value.
/// Fields missing from a pushed record decode to their zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct Change {
    /// Kind of entity that changed ("track", "cue", "playlist")
    pub entity_type: String,
    /// Identifier of the entity instance
    pub entity_id: String,
    /// Attribute that changed within the entity
    pub field: String,
    /// Content fingerprint of the new field value
    pub value_hash: String,
    /// Replica that produced the change
    pub device_id: String,
    /// Per-device logical counter, incremented on every local mutation
    pub lamport_clock: i64,
    /// Serialized device -> counter map. Opaque to the server.
    pub vector_clock: String,
    /// UTC wall-clock timestamp, `YYYY-MM-DDTHH:MM:SSZ` once stored
    pub ts: String,
}

impl Change {
    /// Key a consumer uses to spot the same change delivered twice.
    pub fn dedup_key(&self) -> ChangeKey {
        ChangeKey {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            field: self.field.clone(),
            device_id: self.device_id.clone(),
            lamport_clock: self.lamport_clock,
        }
    }

    /// Whether this change originated on `device_id` (an echo of a local write).
    pub fn is_from(&self, device_id: &str) -> bool {
        self.device_id == device_id
    }
}

/// Identity of a change for duplicate detection.
///
/// The stores keep duplicates; a retried push shows up twice in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    pub entity_type: String,
    pub entity_id: String,
    pub field: String,
    pub device_id: String,
    pub lamport_clock: i64,
}

/// Drop repeated changes from a pulled batch, keeping the first occurrence.
pub fn dedup_changes(changes: Vec<Change>) -> Vec<Change> {
    let mut seen = HashSet::with_capacity(changes.len());
    changes
        .into_iter()
        .filter(|change| seen.insert(change.dedup_key()))
        .collect()
}

/// Query string of a pull request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullQuery {
    /// Cursor from a previous pull; absent or empty means "everything"
    pub since: Option<String>,
}

impl PullQuery {
    /// Build from raw query pairs. A repeated `since` keeps its first value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            since: pairs
                .into_iter()
                .find_map(|(key, value)| (key == "since").then_some(value)),
        }
    }
}

/// Body returned by a successful push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub status: String,
    pub received: usize,
}

impl PushResponse {
    pub fn ok(received: usize) -> Self {
        Self {
            status: "ok".to_string(),
            received,
        }
    }
}
