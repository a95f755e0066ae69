use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::events::{
    event_queue::EventQueue,
    queue_manager::{NoTaskQueue, QueueManager, TaskQueueExists},
};

/// Single-process queue registry. Every request for a given task must reach
/// the same process.
#[derive(Default)]
pub struct InMemoryQueueManager {
    task_queue: RwLock<HashMap<String, EventQueue>>,
}

impl InMemoryQueueManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    async fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), TaskQueueExists> {
        let mut task_queue = self.task_queue.write().await;
        if task_queue.contains_key(task_id) {
            return Err(TaskQueueExists);
        }
        task_queue.insert(task_id.to_string(), queue);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Option<EventQueue> {
        self.task_queue.read().await.get(task_id).cloned()
    }

    async fn tap(&self, task_id: &str) -> Option<EventQueue> {
        self.task_queue.read().await.get(task_id).map(EventQueue::tap)
    }

    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue> {
        let queue = self.task_queue.write().await.remove(task_id);
        match queue {
            Some(queue) => {
                queue.close().await;
                Ok(())
            }
            None => Err(NoTaskQueue),
        }
    }

    async fn create_or_tap(&self, task_id: &str) -> (EventQueue, bool) {
        let mut task_queue = self.task_queue.write().await;
        match task_queue.get(task_id) {
            Some(queue) if !queue.is_closed() => {
                debug!(task_id, "Found existing queue, tapping it");
                (queue.tap(), false)
            }
            _ => {
                debug!(task_id, "Creating new queue");
                let queue = EventQueue::default();
                task_queue.insert(task_id.to_string(), queue.clone());
                (queue, true)
            }
        }
    }
}
