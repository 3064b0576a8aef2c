//! # Event Bus
//!
//! Publish/subscribe plumbing between the stage engine and its outer
//! service layer. The engine publishes deferred executions on the
//! `"schedule"` feed and remote proxy requests on the `"remote"` feed; the
//! staging manager consumes job notifications.

pub mod publisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

pub use publisher::{InMemoryEventBus, PublishError};

/// Event carried on a feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl Event {
    pub fn new(body: Value) -> Self {
        Self {
            metadata: HashMap::new(),
            body,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Feed-addressed publish/subscribe
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, feed: &str, event: Event) -> Result<(), PublishError>;

    fn subscribe(&self, feed: &str) -> broadcast::Receiver<Event>;
}
