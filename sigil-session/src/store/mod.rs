//! Durable session records
//!
//! The database backend talks to storage only through [`RecordStore`]: get a row by id,
//! insert, update the payload in place, delete. Two implementations ship with the crate.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

use crate::SessionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One stored session
///
/// `expires` is always `created + max_age` and never moves. `updated` follows the
/// timestamp signed into `data`, so a row is stale once `updated + max_age` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(sqlx::FromRow))]
pub struct SessionRecord {
    /// The signed session identifier handed to the client
    pub id: String,
    /// Unix timestamp of the first write
    pub created: i64,
    /// Lifetime in seconds at creation time
    pub max_age: i64,
    pub expires: i64,
    /// Unix timestamp of the latest write
    pub updated: i64,
    /// Timestamp-signed, base64-encoded JSON payload
    pub data: String,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, created: i64, max_age: i64, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            max_age,
            expires: created.saturating_add(max_age),
            updated: created,
            data: data.into(),
        }
    }

    /// Whether the payload signature is too old to be accepted at `now`
    pub fn is_stale_at(&self, now: i64) -> bool {
        self.updated < now.saturating_sub(self.max_age)
    }
}

/// Row-oriented storage consumed by [`crate::DatabaseBackend`]
///
/// No locking is performed; concurrent writers to the same id resolve last-write-wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &str) -> SessionResult<Option<SessionRecord>>;

    /// Insert a new record. If a row with the same id appeared in the meantime only its
    /// `data` and `updated` are overwritten.
    async fn insert(&self, record: &SessionRecord) -> SessionResult<()>;

    /// Overwrite `data` and `updated` of an existing row. Returns `false` when no row
    /// matched.
    async fn update_data(&self, id: &str, data: &str, updated: i64) -> SessionResult<bool>;

    /// Returns `false` when no row matched.
    async fn delete(&self, id: &str) -> SessionResult<bool>;

    /// Delete every row whose last write is older than its `max_age` at `now`
    async fn purge_expired(&self, now: i64) -> SessionResult<u64>;

    async fn count(&self) -> SessionResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_expiry_invariant() {
        let mut record = SessionRecord::new("id", 1_000, 60, "payload");
        assert_eq!(record.expires, 1_060);
        assert_eq!(record.updated, 1_000);
        assert!(!record.is_stale_at(1_060));
        assert!(record.is_stale_at(1_061));

        record.updated = 1_050;
        assert!(!record.is_stale_at(1_110));
        assert!(record.is_stale_at(1_111));
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let record = SessionRecord::new("id", 1_700_000_000, i64::MAX, "payload");
        assert_eq!(record.expires, i64::MAX);
        assert!(!record.is_stale_at(1_800_000_000));
    }
}
