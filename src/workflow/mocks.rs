// Mock collaborators for testing - no side effects

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::push::{Channel, EventPublisher, PublishError};

/// One event captured by the recording publisher.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub channel: Channel,
    pub event: String,
    pub payload: Value,
}

/// Publisher that records every event instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn events_on(&self, channel: Channel) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.channel == channel)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("events lock").clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        channel: Channel,
        event: &str,
        payload: Value,
    ) -> Result<(), PublishError> {
        self.events.lock().expect("events lock").push(RecordedEvent {
            channel,
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Publisher whose every delivery fails, for testing that transitions never
/// roll back on publish errors.
#[derive(Debug, Default)]
pub struct FailingPublisher {
    attempts: Mutex<u32>,
}

impl FailingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().expect("attempts lock")
    }
}

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(
        &self,
        _channel: Channel,
        _event: &str,
        _payload: Value,
    ) -> Result<(), PublishError> {
        *self.attempts.lock().expect("attempts lock") += 1;
        Err(PublishError::Transport("relay is down".to_string()))
    }
}
