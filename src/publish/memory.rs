//! In-memory status store

use super::traits::{StatusRecord, StatusStore, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;

/// Status store backed by a concurrent map. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: DashMap<String, StatusRecord>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StatusRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by key
    pub fn records(&self) -> Vec<StatusRecord> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, record: &StatusRecord) -> StoreResult<()> {
        let mut incoming = record.clone();
        if let Some(existing) = self.records.get(&record.key) {
            if existing.status == record.status {
                incoming.updated_at = existing.updated_at;
            }
        }
        self.records.insert(incoming.key.clone(), incoming);
        Ok(())
    }
}
