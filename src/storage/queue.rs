//! # Named Queues
//!
//! FIFO queues addressed by name. The staging manager keeps one global queue
//! of site ids plus one job queue per site.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Named queue contract
#[async_trait]
pub trait QueueProvider: Send + Sync {
    async fn enqueue(&self, queue: &str, item: Value);

    /// Remove and return the head of the queue, `None` when empty
    async fn dequeue(&self, queue: &str) -> Option<Value>;

    async fn peek(&self, queue: &str) -> Option<Value>;

    async fn size(&self, queue: &str) -> usize;
}

/// Thread-safe in-memory queue implementation for testing and development
#[derive(Debug, Default)]
pub struct InMemoryQueueProvider {
    /// Queue storage (queue_name -> items)
    queues: RwLock<HashMap<String, VecDeque<Value>>>,
}

impl InMemoryQueueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all messages from a queue (for testing)
    pub async fn clear_queue(&self, queue: &str) {
        let mut queues = self.queues.write().await;
        if let Some(items) = queues.get_mut(queue) {
            items.clear();
        }
    }
}

#[async_trait]
impl QueueProvider for InMemoryQueueProvider {
    async fn enqueue(&self, queue: &str, item: Value) {
        let mut queues = self.queues.write().await;
        queues.entry(queue.to_string()).or_default().push_back(item);
    }

    async fn dequeue(&self, queue: &str) -> Option<Value> {
        let mut queues = self.queues.write().await;
        queues.get_mut(queue).and_then(VecDeque::pop_front)
    }

    async fn peek(&self, queue: &str) -> Option<Value> {
        let queues = self.queues.read().await;
        queues.get(queue).and_then(|items| items.front().cloned())
    }

    async fn size(&self, queue: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue).map(VecDeque::len).unwrap_or(0)
    }
}
