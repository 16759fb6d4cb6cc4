//! Notification port and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// A notification could not be delivered.
///
/// This is the kind of transient failure the bus's event-retry mechanism
/// exists to mask.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Trait for outbound notification delivery.
#[async_trait]
pub trait Notifications: Send + Sync {
    /// Sends a message to a destination (an email address, a webhook, ...).
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationsState {
    sent: HashMap<String, Vec<String>>,
    fail_times: u32,
}

/// In-memory notifications for testing.
///
/// Records every delivered message per destination and can be told to fail
/// the next N sends to exercise the retry path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifications {
    state: Arc<RwLock<InMemoryNotificationsState>>,
}

impl InMemoryNotifications {
    /// Creates a new in-memory notification sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` sends fail before recovering.
    pub fn set_fail_times(&self, times: u32) {
        self.state.write().unwrap().fail_times = times;
    }

    /// Returns the messages delivered to a destination.
    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .get(destination)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the total number of delivered messages.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl Notifications for InMemoryNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap();

        if state.fail_times > 0 {
            state.fail_times -= 1;
            return Err(NotificationError("sink unavailable".to_string()));
        }

        state
            .sent
            .entry(destination.to_string())
            .or_default()
            .push(message.to_string());
        Ok(())
    }
}
