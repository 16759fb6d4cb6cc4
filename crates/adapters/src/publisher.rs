//! Broadcast port for notifying other processes of domain events.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from the broadcast transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("publish to {topic} failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

/// Trait for publishing event payloads to a topic.
///
/// Payloads are the event's field set as a JSON object; the wire encoding
/// beyond that is the transport's concern.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), PublishError>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<(String, Value)>,
    fail_times: u32,
}

/// In-memory publisher for testing. Records `(topic, payload)` pairs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` publishes fail before recovering.
    pub fn set_fail_times(&self, times: u32) {
        self.state.write().unwrap().fail_times = times;
    }

    /// Returns everything published so far.
    pub fn published(&self) -> Vec<(String, Value)> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the payloads published on one topic.
    pub fn published_on(&self, topic: &str) -> Vec<Value> {
        self.state
            .read()
            .unwrap()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();

        if state.fail_times > 0 {
            state.fail_times -= 1;
            return Err(PublishError {
                topic: topic.to_string(),
                reason: "transport unavailable".to_string(),
            });
        }

        state.published.push((topic.to_string(), payload));
        Ok(())
    }
}
