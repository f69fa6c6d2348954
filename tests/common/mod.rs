// Shared fixtures for the integration suites
#![allow(dead_code)] // each suite uses its own slice of the fixtures

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use freshtrace::push::{Channel, EventPublisher, PublishError};
use freshtrace::store::MemoryBatchStore;
use freshtrace::workflow::WorkflowEngine;
use freshtrace::{DirectUpload, Grade, OrderRequest};

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

    #[allow(dead_code)]
    pub fn events_on(&self, channel: Channel) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.channel == channel)
            .collect()
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

pub struct TestHarness {
    pub engine: Arc<WorkflowEngine>,
    pub store: Arc<MemoryBatchStore>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryBatchStore::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let engine = Arc::new(WorkflowEngine::new(store.clone(), publisher.clone()));
    TestHarness {
        engine,
        store,
        publisher,
    }
}

pub fn tomato_order() -> OrderRequest {
    OrderRequest {
        crop: "Tomatoes".to_string(),
        quantity_kg: 100.0,
        grade: Grade::A,
        contact_person: "Jane".to_string(),
        contact_phone: "555-0100".to_string(),
        preferred_date: None,
        price: "\u{20b9}800".to_string(),
        notes: None,
    }
}

pub fn carrot_upload() -> DirectUpload {
    DirectUpload {
        crop: "Carrots".to_string(),
        weight_kg: 200.0,
        harvest_date: "2024-01-14".to_string(),
        quality: Grade::APlus,
        farmer: "Sarah Johnson".to_string(),
        farm_location: Some("Sunny Acres Farm, OR".to_string()),
    }
}
