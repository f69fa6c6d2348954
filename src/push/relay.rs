use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde_json::Value;
use tracing::{debug, warn};

use crate::observability::publish_metrics;

use super::{Channel, EventPublisher, PublishError};

/// Retry policy for transient relay failures.
#[derive(Debug, Clone)]
pub struct RelayRetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RelayRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP client for a Pusher-style push relay.
///
/// Every publish is one POST of `{channel, event, data}` with bearer auth.
/// Publishes are rate-limited client-side; transient failures (transport
/// errors, 5xx) are retried with exponential backoff, rejections (4xx) are
/// not.
pub struct PushRelayClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    retry: RelayRetryConfig,
}

impl PushRelayClient {
    pub fn new(
        endpoint: String,
        token: String,
        publishes_per_second: u32,
        burst_capacity: u32,
    ) -> Result<Self, PublishError> {
        Self::with_retry(
            endpoint,
            token,
            publishes_per_second,
            burst_capacity,
            RelayRetryConfig::default(),
        )
    }

    pub fn with_retry(
        endpoint: String,
        token: String,
        publishes_per_second: u32,
        burst_capacity: u32,
        retry: RelayRetryConfig,
    ) -> Result<Self, PublishError> {
        let per_second =
            NonZeroU32::new(publishes_per_second.max(1)).expect("max(1) is non-zero");
        let burst = NonZeroU32::new(burst_capacity.max(1)).expect("max(1) is non-zero");
        let quota = Quota::per_second(per_second).allow_burst(burst);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            token,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            retry,
        })
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.retry.base_delay.saturating_mul(1 << attempt.min(16));
        exp.min(self.retry.max_delay)
    }

    async fn post_once(
        &self,
        channel: Channel,
        event: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let body = serde_json::json!({
            "channel": channel.as_str(),
            "event": event,
            "data": payload,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() {
            return Err(PublishError::Transport(format!(
                "relay answered HTTP {}",
                status.as_u16()
            )));
        }
        Err(PublishError::Rejected {
            channel: channel.as_str(),
            event: event.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl EventPublisher for PushRelayClient {
    async fn publish(
        &self,
        channel: Channel,
        event: &str,
        payload: Value,
    ) -> Result<(), PublishError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut attempt = 0;
        loop {
            debug!(
                channel = %channel,
                event = %event,
                attempt = attempt + 1,
                "Publishing to push relay"
            );
            publish_metrics().record_attempt();

            match self.post_once(channel, event, &payload).await {
                Ok(()) => {
                    publish_metrics().record_delivered();
                    return Ok(());
                }
                Err(err @ PublishError::Rejected { .. }) => {
                    publish_metrics().record_failure();
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        publish_metrics().record_failure();
                        return Err(err);
                    }
                    publish_metrics().record_retry();
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        channel = %channel,
                        event = %event,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Push relay publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let client = PushRelayClient::with_retry(
            "http://localhost:9999/events".to_string(),
            "test-token".to_string(),
            10,
            10,
            RelayRetryConfig {
                max_attempts: 5,
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
            },
        )
        .unwrap();

        assert_eq!(client.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(client.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(client.backoff_delay(10), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn unreachable_relay_reports_transport_error() {
        let client = PushRelayClient::with_retry(
            // Reserved port, nothing listens here.
            "http://127.0.0.1:9".to_string(),
            "test-token".to_string(),
            100,
            100,
            RelayRetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        )
        .unwrap();

        let err = client
            .publish(
                Channel::System,
                super::super::events::BATCH_UPDATED,
                serde_json::json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
