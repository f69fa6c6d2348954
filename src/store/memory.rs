use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::batch::{BatchId, BatchRecord};

use super::{BatchRepository, StoreError};

/// In-memory batch store. The revision check and the write happen under one
/// write lock, which gives the conditional-update guarantee the workflow
/// engine relies on.
#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    batches: RwLock<HashMap<String, BatchRecord>>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored batches, for CLI summaries.
    pub async fn len(&self) -> usize {
        self.batches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.batches.read().await.is_empty()
    }
}

#[async_trait]
impl BatchRepository for MemoryBatchStore {
    async fn get(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError> {
        Ok(self.batches.read().await.get(id.as_str()).cloned())
    }

    async fn get_by_lot_number(
        &self,
        lot_number: &str,
    ) -> Result<Option<BatchRecord>, StoreError> {
        Ok(self
            .batches
            .read()
            .await
            .values()
            .find(|batch| batch.lot_number.as_deref() == Some(lot_number))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<BatchRecord>, StoreError> {
        let mut batches: Vec<BatchRecord> = self.batches.read().await.values().cloned().collect();
        batches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(batches)
    }

    async fn save(
        &self,
        mut record: BatchRecord,
        expected_revision: Option<u64>,
    ) -> Result<BatchRecord, StoreError> {
        let mut batches = self.batches.write().await;
        let key = record.id.as_str().to_string();

        match expected_revision {
            None => {
                if batches.contains_key(&key) {
                    return Err(StoreError::DuplicateId { id: key });
                }
                record.revision = 1;
            }
            Some(expected) => {
                let stored = batches
                    .get(&key)
                    .ok_or_else(|| StoreError::RevisionConflict { id: key.clone() })?;
                if stored.revision != expected {
                    return Err(StoreError::RevisionConflict { id: key });
                }
                record.revision = expected + 1;
            }
        }

        batches.insert(key, record.clone());
        Ok(record)
    }
}
