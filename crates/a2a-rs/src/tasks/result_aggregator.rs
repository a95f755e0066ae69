use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
    errors::A2aServerError,
    events::{event_consumer::EventConsumer, event_queue::Event},
    tasks::TaskManager,
    types::{Message, Task},
};

/// What a request ultimately produced.
#[derive(Clone, Debug)]
pub enum AggregatedResult {
    Task(Task),
    Message(Message),
}

impl AggregatedResult {
    fn is_interrupted(&self) -> bool {
        match self {
            AggregatedResult::Task(task) => task.status.state.is_interrupted(),
            AggregatedResult::Message(_) => false,
        }
    }
}

/// Applies every consumed event to the task store and tracks the latest result.
pub struct ResultAggregator {
    task_manager: Mutex<TaskManager>,
    current_result: Mutex<Option<AggregatedResult>>,
}

impl ResultAggregator {
    pub fn new(task_manager: TaskManager) -> Self {
        Self {
            task_manager: Mutex::new(task_manager),
            current_result: Mutex::new(None),
        }
    }

    pub async fn current_result(&self) -> Option<AggregatedResult> {
        self.current_result.lock().await.clone()
    }

    async fn process_event(&self, event: &Event) -> Result<AggregatedResult, A2aServerError> {
        let result = match event {
            Event::Message(message) => AggregatedResult::Message(message.clone()),
            other => {
                let task = self.task_manager.lock().await.process(other).await?;
                match task {
                    Some(task) => AggregatedResult::Task(task),
                    None => return Err(A2aServerError::internal("Event produced no task")),
                }
            }
        };
        *self.current_result.lock().await = Some(result.clone());
        Ok(result)
    }

    /// Consumes until the request stops producing events and returns the
    /// final result, plus whether it stopped because input is required.
    pub async fn consume_and_break_on_interrupt(
        &self,
        consumer: EventConsumer,
    ) -> Result<(AggregatedResult, bool), A2aServerError> {
        let events = consumer.consume_all();
        tokio::pin!(events);

        let mut last_result = None;
        while let Some(event) = events.next().await {
            last_result = Some(self.process_event(&event).await?);
        }

        let result = last_result
            .ok_or_else(|| A2aServerError::internal("No events received from agent"))?;
        let interrupted = result.is_interrupted();
        if interrupted {
            debug!("Result requires more input from the client");
        }
        Ok((result, interrupted))
    }

    /// Forwards every event once it has been applied to the task store.
    pub fn consume_and_emit(
        self: Arc<Self>,
        consumer: EventConsumer,
    ) -> impl Stream<Item = Result<Event, A2aServerError>> + Send + 'static {
        async_stream::stream! {
            let events = consumer.consume_all();
            tokio::pin!(events);

            while let Some(event) = events.next().await {
                match self.process_event(&event).await {
                    Ok(_) => yield Ok(event),
                    Err(e) => {
                        error!(error = %e, "Error processing event in stream");
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
