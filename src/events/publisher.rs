use super::{Event, EventBus};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// In-process event bus with one broadcast channel per feed
#[derive(Debug)]
pub struct InMemoryEventBus {
    feeds: DashMap<String, broadcast::Sender<Event>>,
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new event bus; each feed buffers up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            feeds: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, feed: &str) -> broadcast::Sender<Event> {
        self.feeds
            .entry(feed.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Get the number of active subscribers on a feed
    pub fn subscriber_count(&self, feed: &str) -> usize {
        self.feeds
            .get(feed)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, feed: &str, event: Event) -> Result<(), PublishError> {
        // No subscribers is acceptable - events are published even if no one is listening
        if self.sender(feed).send(event).is_err() {
            debug!(feed = feed, "Event published with no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self, feed: &str) -> broadcast::Receiver<Event> {
        self.sender(feed).subscribe()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PublishError> for crate::error::OrchestrationError {
    fn from(error: PublishError) -> Self {
        crate::error::OrchestrationError::InternalError(error.to_string())
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1000) // Default capacity of 1000 events per feed
    }
}
