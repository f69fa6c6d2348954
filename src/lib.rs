// FreshTrace Library - Farm-to-Consumer Batch Tracking
// This exposes the workflow engine and its collaborators for integration

pub mod batch;
pub mod config;
pub mod observability;
pub mod push;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use batch::{AuditEntry, BatchId, BatchRecord, BatchStatus, Grade, SensorReading, Weight};
pub use config::{config, init_config, FreshtraceConfig};
pub use observability::{publish_metrics, OperationTimer, PublishMetrics};
pub use push::{Channel, EventPublisher, PublishError, PushRelayClient, TracingPublisher};
pub use store::{BatchRepository, MemoryBatchStore, StoreError};
#[cfg(feature = "database")]
pub use store::SqliteBatchStore;
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    DirectUpload, FarmerConfirmation, FarmerRejection, OrderRequest, PriceUpdate, RetailPricing,
    StatusNote, WorkflowEngine, WorkflowError,
};
