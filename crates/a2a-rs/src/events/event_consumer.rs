use futures::Stream;
use tracing::{debug, warn};

use crate::{
    errors::A2aServerError,
    events::event_queue::{DequeueError, Event, EventQueue},
};

/// Reads the events an agent publishes for one request.
pub struct EventConsumer {
    queue: EventQueue,
}

impl EventConsumer {
    pub fn new(queue: EventQueue) -> Self {
        debug!("EventConsumer initialized");
        Self { queue }
    }

    /// Takes one event without waiting.
    pub async fn consume_one(&self) -> Result<Event, A2aServerError> {
        match self.queue.dequeue_event(true).await {
            Ok(event) => Ok(event),
            Err(DequeueError::QueueEmpty) => {
                warn!("Event queue was empty in consume_one.");
                Err(A2aServerError::internal("Agent did not return any response"))
            }
            Err(DequeueError::QueueClosed) => {
                warn!("Event queue was closed in consume_one.");
                Err(A2aServerError::internal("Queue is closed"))
            }
        }
    }

    /// Yields events in publication order until a final event has been
    /// yielded or the queue is closed.
    pub fn consume_all(self) -> impl Stream<Item = Event> + Send + 'static {
        let queue = self.queue;

        async_stream::stream! {
            loop {
                match queue.dequeue_event(false).await {
                    Ok(event) => {
                        let is_final = event.is_final();
                        yield event;
                        if is_final {
                            debug!("Final event received, stopping consumption.");
                            break;
                        }
                    }
                    Err(DequeueError::QueueEmpty) => continue,
                    Err(DequeueError::QueueClosed) => {
                        debug!("Event queue closed, stopping consumption.");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::types::{TaskState, TaskStatus, TaskStatusUpdateEvent};
        use futures::StreamExt;

        fn status(state: TaskState, final_: bool) -> Event {
            Event::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                "t1",
                "c1",
                TaskStatus::new(state, None),
                final_,
            ))
        }

        #[tokio::test]
        async fn consume_all_stops_after_final_event() {
            let queue = EventQueue::default();
            queue.enqueue_event(status(TaskState::Working, false)).await;
            queue.enqueue_event(status(TaskState::Completed, true)).await;
            queue.enqueue_event(status(TaskState::Working, false)).await;

            let events: Vec<Event> = EventConsumer::new(queue).consume_all().collect().await;
            assert_eq!(events.len(), 2);
            assert!(events[1].is_final());
        }

        #[tokio::test]
        async fn consume_all_ends_when_queue_closes() {
            let queue = EventQueue::default();
            queue.enqueue_event(status(TaskState::Working, false)).await;
            queue.close().await;

            let events: Vec<Event> = EventConsumer::new(queue).consume_all().collect().await;
            assert_eq!(events.len(), 1);
        }

        #[tokio::test]
        async fn consume_one_reports_empty_queue() {
            let consumer = EventConsumer::new(EventQueue::default());
            assert!(consumer.consume_one().await.is_err());
        }
    }
}
