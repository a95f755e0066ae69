use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use crate::types::{Message, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

/// Anything an agent publishes while executing a request.
#[derive(Clone, Debug)]
pub enum Event {
    Message(Message),
    Task(Task),
    TaskStatusUpdate(TaskStatusUpdateEvent),
    TaskArtifactUpdate(TaskArtifactUpdateEvent),
}

impl Event {
    /// Whether this event ends the stream of updates for its request.
    pub fn is_final(&self) -> bool {
        match self {
            Event::Message(_) => true,
            Event::TaskStatusUpdate(update) => update.final_,
            Event::Task(task) => {
                task.status.state.is_terminal() || task.status.state.is_interrupted()
            }
            Event::TaskArtifactUpdate(_) => false,
        }
    }
}

pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1024;

#[derive(Clone, Debug)]
enum Envelope {
    Event(Box<Event>),
    Closed,
}

/// Buffer between an executing agent and whoever serves its response.
///
/// Producers and the primary consumer share one queue (cloning shares the
/// receiver). [`EventQueue::tap`] creates an independent consumer that sees
/// every event enqueued after the tap. Closing wakes all consumers once they
/// have drained what was enqueued before the close.
pub struct EventQueue {
    sender: broadcast::Sender<Envelope>,
    receiver: Arc<Mutex<broadcast::Receiver<Envelope>>>,
    is_closed: Arc<AtomicBool>,
}

impl EventQueue {
    pub fn new(max_queue_size: usize) -> Self {
        let (sender, receiver) = broadcast::channel(max_queue_size.max(1));
        debug!("EventQueue initialized.");
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            is_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn enqueue_event(&self, event: Event) {
        if self.is_closed() {
            debug!("Queue is closed. Event will not be enqueued.");
            return;
        }

        match &event {
            Event::Task(task) => debug!(task_id = %task.id, "Enqueuing Task event"),
            Event::TaskStatusUpdate(update) => debug!(
                task_id = %update.task_id,
                state = ?update.status.state,
                "Enqueuing TaskStatusUpdate event"
            ),
            Event::TaskArtifactUpdate(update) => debug!(
                task_id = %update.task_id,
                artifact_id = %update.artifact.artifact_id,
                "Enqueuing TaskArtifactUpdate event"
            ),
            Event::Message(msg) => debug!(task_id = ?msg.task_id, "Enqueuing Message event"),
        }

        // Every live queue handle keeps a receiver, so a send error only means
        // nobody is listening anymore.
        if self.sender.send(Envelope::Event(Box::new(event))).is_err() {
            debug!("No consumer attached to EventQueue, event dropped.");
        }
    }

    pub async fn dequeue_event(&self, no_wait: bool) -> Result<Event, DequeueError> {
        let mut receiver = self.receiver.lock().await;

        loop {
            let envelope = if no_wait {
                match receiver.try_recv() {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::TryRecvError::Empty) => {
                        return if self.is_closed() {
                            Err(DequeueError::QueueClosed)
                        } else {
                            Err(DequeueError::QueueEmpty)
                        };
                    }
                    Err(broadcast::error::TryRecvError::Closed) => {
                        return Err(DequeueError::QueueClosed);
                    }
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "EventQueue consumer lagged, events were skipped");
                        continue;
                    }
                }
            } else {
                if self.is_closed() && receiver.is_empty() {
                    return Err(DequeueError::QueueClosed);
                }
                match receiver.recv().await {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(DequeueError::QueueClosed);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "EventQueue consumer lagged, events were skipped");
                        continue;
                    }
                }
            };

            match envelope {
                Envelope::Event(event) => return Ok(*event),
                Envelope::Closed => return Err(DequeueError::QueueClosed),
            }
        }
    }

    /// Creates a child consumer that receives all future events of this queue.
    pub fn tap(&self) -> EventQueue {
        debug!("Tapping EventQueue to create a child queue.");
        EventQueue {
            sender: self.sender.clone(),
            receiver: Arc::new(Mutex::new(self.sender.subscribe())),
            is_closed: self.is_closed.clone(),
        }
    }

    /// Closes the queue for future events. Idempotent.
    pub async fn close(&self) {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing EventQueue.");
        let _ = self.sender.send(Envelope::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            is_closed: self.is_closed.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DequeueError {
    #[error("Queue is empty")]
    QueueEmpty,
    #[error("Queue is closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::types::{TaskState, TaskStatus};

        fn status(task_id: &str, state: TaskState, final_: bool) -> Event {
            Event::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                task_id,
                "ctx",
                TaskStatus::new(state, None),
                final_,
            ))
        }

        #[tokio::test]
        async fn drains_enqueued_events_before_reporting_close() {
            let queue = EventQueue::default();
            queue.enqueue_event(status("t1", TaskState::Working, false)).await;
            queue.enqueue_event(status("t1", TaskState::Completed, true)).await;
            queue.close().await;

            assert!(matches!(
                queue.dequeue_event(false).await,
                Ok(Event::TaskStatusUpdate(e)) if e.status.state == TaskState::Working
            ));
            assert!(matches!(
                queue.dequeue_event(false).await,
                Ok(Event::TaskStatusUpdate(e)) if e.final_
            ));
            assert!(matches!(
                queue.dequeue_event(false).await,
                Err(DequeueError::QueueClosed)
            ));
        }

        #[tokio::test]
        async fn tap_sees_only_later_events() {
            let queue = EventQueue::default();
            queue.enqueue_event(status("t1", TaskState::Submitted, false)).await;
            let tap = queue.tap();
            queue.enqueue_event(status("t1", TaskState::Working, false)).await;

            assert!(matches!(
                tap.dequeue_event(true).await,
                Ok(Event::TaskStatusUpdate(e)) if e.status.state == TaskState::Working
            ));
            assert!(matches!(
                tap.dequeue_event(true).await,
                Err(DequeueError::QueueEmpty)
            ));
        }

        #[tokio::test]
        async fn enqueue_after_close_is_ignored() {
            let queue = EventQueue::default();
            queue.close().await;
            queue.enqueue_event(status("t1", TaskState::Working, false)).await;
            assert!(matches!(
                queue.dequeue_event(true).await,
                Err(DequeueError::QueueClosed)
            ));
        }
    }
}
