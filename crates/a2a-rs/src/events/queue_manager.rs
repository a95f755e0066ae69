use async_trait::async_trait;

use crate::events::event_queue::EventQueue;

/// Owns the event queue of every task that currently has a running producer.
#[async_trait]
pub trait QueueManager: Send + Sync {
    async fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), TaskQueueExists>;

    async fn get(&self, task_id: &str) -> Option<EventQueue>;

    /// Creates a child consumer for an existing task queue.
    async fn tap(&self, task_id: &str) -> Option<EventQueue>;

    /// Closes and forgets the queue of a task.
    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue>;

    /// Returns the task's queue, creating it first when the task has none.
    /// The second value is `true` when the queue was created by this call.
    async fn create_or_tap(&self, task_id: &str) -> (EventQueue, bool);
}

#[derive(Debug, thiserror::Error)]
#[error("Task queue already exists")]
pub struct TaskQueueExists;

#[derive(Debug, thiserror::Error)]
#[error("No task queue found")]
pub struct NoTaskQueue;
