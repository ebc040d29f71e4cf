//! In-process record store
//!
//! Records are lost when the process exits. Useful for tests and single-node development.

use super::{RecordStore, SessionRecord};
use crate::SessionResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory record store; clones share the same records
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &str) -> SessionResult<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn insert(&self, record: &SessionRecord) -> SessionResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(record.id.clone())
            .and_modify(|existing| {
                existing.data = record.data.clone();
                existing.updated = record.updated;
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn update_data(&self, id: &str, data: &str, updated: i64) -> SessionResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                record.data = data.to_string();
                record.updated = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> SessionResult<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(id).is_some())
    }

    async fn purge_expired(&self, now: i64) -> SessionResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_stale_at(now));
        Ok((before - records.len()) as u64)
    }

    async fn count(&self) -> SessionResult<u64> {
        let records = self.records.read().await;
        Ok(records.len() as u64)
    }
}
