// Batch persistence - repository trait and its backends
//
// The workflow engine never talks to a concrete store; it is handed a
// `BatchRepository` at construction. Every mutation goes through `save`
// conditioned on the revision the caller read, which is what makes
// concurrent transitions from the same stale state mutually exclusive.

use async_trait::async_trait;
use thiserror::Error;

use crate::batch::{BatchId, BatchRecord};

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryBatchStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteBatchStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch {id} already exists")]
    DuplicateId { id: String },
    /// The stored record changed between the caller's read and this write.
    #[error("batch {id} was modified since it was read")]
    RevisionConflict { id: String },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn get(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError>;

    async fn get_by_lot_number(&self, lot_number: &str)
        -> Result<Option<BatchRecord>, StoreError>;

    /// All batches, most recently updated first.
    async fn list_all(&self) -> Result<Vec<BatchRecord>, StoreError>;

    /// Upsert one batch document, atomically with its embedded audit trail.
    ///
    /// `expected_revision: None` inserts a new document and fails with
    /// `DuplicateId` if the id is taken. `Some(n)` updates only while the
    /// stored revision is still `n`, failing with `RevisionConflict`
    /// otherwise. The returned record carries the bumped revision.
    async fn save(
        &self,
        record: BatchRecord,
        expected_revision: Option<u64>,
    ) -> Result<BatchRecord, StoreError>;
}
