// Real-time event delivery - channels, publisher trait, implementations
//
// Delivery is best-effort by contract: the persisted batch is authoritative
// and a failed publish never rolls a transition back. The workflow engine
// logs and counts failures instead of raising them.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub mod relay;

pub use relay::{PushRelayClient, RelayRetryConfig};

/// Named notification topics routing events to interested viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Farmer,
    Retailer,
    Distributor,
    System,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Farmer => "farmer-channel",
            Channel::Retailer => "retailer-channel",
            Channel::Distributor => "distributor-channel",
            Channel::System => "system-channel",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event names the dashboards subscribe to.
pub mod events {
    pub const BATCH_UPLOADED: &str = "batch-uploaded";
    pub const BATCH_UPDATED: &str = "batch-updated";
    pub const BATCH_CONFIRMED: &str = "batch-confirmed";
    pub const NEW_ORDER_REQUEST: &str = "new-order-request";
    pub const ORDER_CONFIRMED_BY_FARMER: &str = "order-confirmed-by-farmer";
    pub const ORDER_REJECTED_BY_FARMER: &str = "order-rejected-by-farmer";
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// The relay answered with a non-retryable rejection.
    #[error("push relay rejected '{event}' on {channel}: HTTP {status}")]
    Rejected {
        channel: &'static str,
        event: String,
        status: u16,
    },
    #[error("push relay unreachable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        channel: Channel,
        event: &str,
        payload: Value,
    ) -> Result<(), PublishError>;
}

/// Publisher that only logs. Default for local runs and the CLI; viewers
/// tailing the structured log see every event that would have been pushed.
#[derive(Debug, Default)]
pub struct TracingPublisher;

impl TracingPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(
        &self,
        channel: Channel,
        event: &str,
        payload: Value,
    ) -> Result<(), PublishError> {
        info!(
            channel = %channel,
            event = %event,
            payload = %payload,
            "Event published"
        );
        Ok(())
    }
}
