//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use pawprint_server::notify::MessagePublisher;
use pawprint_server::storage::DocumentStore;
use pawprint_server::streak::ManualClock;
use pawprint_server::{Backends, ServiceConfig, Services};

/// Publisher that keeps every message it is handed.
#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, body: &str) -> anyhow::Result<()> {
        let value = serde_json::from_str(body)?;
        self.messages.lock().push((topic.to_string(), value));
        Ok(())
    }
}

impl RecordingPublisher {
    pub fn on_topic(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// Monday 2024-05-06 09:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub services: Services,
    pub docs: Arc<dyn DocumentStore>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,
}

/// In-memory services with a manual clock and a recording publisher.
pub fn harness() -> Harness {
    let config = ServiceConfig::default();
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let publisher = Arc::new(RecordingPublisher::default());
    let base = Backends::in_memory(&config);
    let docs = Arc::clone(&base.docs);
    let backends = Backends {
        clock: Arc::clone(&clock) as _,
        publisher: Arc::clone(&publisher) as _,
        ..base
    };
    Harness {
        services: Services::start(&config, backends),
        docs,
        clock,
        publisher,
    }
}
