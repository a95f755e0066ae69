use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    agent_execution::{AgentExecutor, RequestContext},
    errors::{A2aServerError, Error},
    events::{Event, EventConsumer, EventQueue, InMemoryQueueManager, QueueManager},
    request_handlers::request_handler::{RequestHandler, TaskSubscriptionStream},
    tasks::{AggregatedResult, ResultAggregator, TaskManager, TaskStore},
    types::{
        Message, MessageSendParams, SendMessageSuccessResponseResult,
        SendStreamingMessageSuccessResponseResult, Task, TaskIdParams, TaskQueryParams, TaskState,
        TaskStatus, TaskStatusUpdateEvent,
    },
};

impl From<Event> for SendStreamingMessageSuccessResponseResult {
    fn from(event: Event) -> Self {
        match event {
            Event::Task(task) => SendStreamingMessageSuccessResponseResult::Task(task),
            Event::Message(message) => SendStreamingMessageSuccessResponseResult::Message(message),
            Event::TaskStatusUpdate(update) => {
                SendStreamingMessageSuccessResponseResult::TaskStatusUpdateEvent(update)
            }
            Event::TaskArtifactUpdate(update) => {
                SendStreamingMessageSuccessResponseResult::TaskArtifactUpdateEvent(update)
            }
        }
    }
}

/// State shared by one in-flight `message/send` or `message/stream` call.
struct Execution {
    task_id: String,
    queue: EventQueue,
    aggregator: Arc<ResultAggregator>,
    producer: JoinHandle<()>,
}

/// Default request handler for all incoming requests.
///
/// Coordinates the `AgentExecutor`, the `TaskStore` and the `QueueManager`:
/// the executor runs on its own tokio task and publishes events, and the
/// request side folds those events into the store while serving them.
#[derive(Clone)]
pub struct DefaultRequestHandler {
    agent_executor: Arc<dyn AgentExecutor>,
    task_store: Arc<dyn TaskStore>,
    queue_manager: Arc<dyn QueueManager>,
    running_agents: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl DefaultRequestHandler {
    pub fn new(
        agent_executor: Arc<dyn AgentExecutor>,
        task_store: Arc<dyn TaskStore>,
        queue_manager: Option<Arc<dyn QueueManager>>,
    ) -> Self {
        let queue_manager = queue_manager.unwrap_or_else(|| Arc::new(InMemoryQueueManager::new()));

        Self {
            agent_executor,
            task_store,
            queue_manager,
            running_agents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves the task the message belongs to and starts the executor.
    ///
    /// A message naming a task that already reached a terminal state starts a
    /// follow-up task in the same context which references the old one.
    async fn setup_message_execution(
        &self,
        mut params: MessageSendParams,
    ) -> Result<Execution, A2aServerError> {
        let mut lookup = TaskManager::new(
            self.task_store.clone(),
            params.message.task_id.clone(),
            params.message.context_id.clone(),
        );

        let mut related_task = None;
        let current_task = match lookup.get_task().await? {
            Some(task) if task.status.state.is_terminal() => {
                info!(
                    task_id = %task.id,
                    state = ?task.status.state,
                    "Task is terminal, starting a follow-up task in the same context"
                );
                if !params.message.reference_task_ids.contains(&task.id) {
                    params.message.reference_task_ids.push(task.id.clone());
                }
                params.message.task_id = None;
                params.message.context_id = Some(task.context_id.clone());
                related_task = Some(task);
                None
            }
            Some(task) => {
                if let Some(context_id) = &params.message.context_id
                    && context_id != &task.context_id
                {
                    return Err(A2aServerError::invalid_params(format!(
                        "Message context {context_id} does not match the context of task {}",
                        task.id
                    )));
                }
                Some(task)
            }
            None => None,
        };

        let task_id = current_task
            .as_ref()
            .map(|t| t.id.clone())
            .or_else(|| params.message.task_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let context_id = current_task
            .as_ref()
            .map(|t| t.context_id.clone())
            .or_else(|| params.message.context_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut task_manager = TaskManager::new(
            self.task_store.clone(),
            Some(task_id.clone()),
            Some(context_id.clone()),
        );

        let current_task = match current_task {
            Some(mut task) => {
                let mut message = params.message.clone();
                message.task_id = Some(task_id.clone());
                message.context_id = Some(context_id.clone());
                task.history.push(message);
                Some(task_manager.save_task(task).await?)
            }
            None => None,
        };

        let mut request_context =
            RequestContext::new(Some(params), task_id.clone(), context_id, current_task);
        if let Some(task) = related_task {
            request_context.attach_related_task(task);
        }

        let (queue, created) = self.queue_manager.create_or_tap(&task_id).await;
        debug!(task_id = %task_id, created, "Event queue ready");

        let aggregator = Arc::new(ResultAggregator::new(task_manager));
        let producer = self.spawn_producer(request_context, queue.clone());
        self.running_agents
            .lock()
            .await
            .insert(task_id.clone(), producer.abort_handle());

        Ok(Execution {
            task_id,
            queue,
            aggregator,
            producer,
        })
    }

    /// Runs the executor, reports a failure as a final `failed` status and
    /// closes the queue once the executor returns.
    fn spawn_producer(&self, context: RequestContext, queue: EventQueue) -> JoinHandle<()> {
        let agent_executor = self.agent_executor.clone();

        tokio::spawn(async move {
            let task_id = context.task_id().to_string();
            let context_id = context.context_id().to_string();
            info!(task_id = %task_id, "Starting agent execution");

            if let Err(e) = agent_executor.execute(context, queue.clone()).await {
                error!(task_id = %task_id, error = %e, "Agent execution failed");
                let status = TaskStatus::new(
                    TaskState::Failed,
                    Some(Message::agent_text(
                        format!("Task failed: {e}"),
                        &task_id,
                        &context_id,
                    )),
                );
                queue
                    .enqueue_event(Event::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                        &task_id,
                        &context_id,
                        status,
                        true,
                    )))
                    .await;
            }

            queue.close().await;
            debug!(task_id = %task_id, "Agent execution finished");
        })
    }

    fn validate_task_id_match(&self, task_id: &str, event_task_id: &str) -> Result<(), A2aServerError> {
        if task_id != event_task_id {
            error!(
                expected = %task_id,
                received = %event_task_id,
                "Agent generated task_id does not match the request task_id"
            );
            return Err(A2aServerError::internal("Task ID mismatch in agent response"));
        }
        Ok(())
    }

    /// Waits for the producer and releases its queue.
    async fn cleanup_producer(&self, producer: JoinHandle<()>, task_id: &str) {
        if let Err(e) = producer.await
            && !e.is_cancelled()
        {
            warn!(task_id, error = %e, "Agent execution task panicked");
        }
        self.queue_manager.close(task_id).await.ok();
        self.running_agents.lock().await.remove(task_id);
        debug!(task_id, "Cleanup completed");
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Option<Task>, A2aServerError> {
        let Some(mut task) = self.task_store.get(&params.id).await? else {
            return Err(A2aServerError::task_not_found(&params.id));
        };

        if let Some(history_length) = params.history_length
            && task.history.len() > history_length
        {
            let skip = task.history.len() - history_length;
            task.history.drain(..skip);
        }
        Ok(Some(task))
    }

    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Option<Task>, A2aServerError> {
        let task = self
            .task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2aServerError::task_not_found(&params.id))?;

        if task.status.state.is_terminal() {
            return Err(A2aServerError::TaskNotCancelableError(
                Error::new(format!(
                    "Task cannot be canceled - current state: {:?}",
                    task.status.state
                )),
            ));
        }

        // Stop the producer first so nothing races the cancellation events.
        if let Some(handle) = self.running_agents.lock().await.remove(&task.id) {
            debug!(task_id = %task.id, "Aborting running agent");
            handle.abort();
        }

        let queue = EventQueue::default();
        let consumer = EventConsumer::new(queue.clone());
        self.agent_executor
            .cancel(
                RequestContext::new(
                    None,
                    task.id.clone(),
                    task.context_id.clone(),
                    Some(task.clone()),
                ),
                queue.clone(),
            )
            .await
            .map_err(|e| A2aServerError::internal(format!("Failed to cancel task: {e}")))?;
        queue.close().await;

        // Anyone still streaming the task sees the cancellation on its queue.
        let running = self.queue_manager.get(&task.id).await;
        let aggregator = Arc::new(ResultAggregator::new(TaskManager::new(
            self.task_store.clone(),
            Some(task.id.clone()),
            Some(task.context_id.clone()),
        )));

        let events = aggregator.clone().consume_and_emit(consumer);
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            let event = event?;
            if let Some(running) = &running {
                running.enqueue_event(event).await;
            }
        }
        if let Some(running) = running {
            running.close().await;
        }
        self.queue_manager.close(&task.id).await.ok();

        match aggregator.current_result().await {
            Some(AggregatedResult::Task(task)) => Ok(Some(task)),
            _ => Err(A2aServerError::internal(
                "Agent did not return valid response for cancel",
            )),
        }
    }

    async fn on_message_send(
        &self,
        params: MessageSendParams,
    ) -> Result<SendMessageSuccessResponseResult, A2aServerError> {
        let execution = self.setup_message_execution(params).await?;

        let consumer = EventConsumer::new(execution.queue.clone());
        let outcome = execution
            .aggregator
            .consume_and_break_on_interrupt(consumer)
            .await;

        // The executor returns right after its final event, so waiting keeps the
        // queue of this task from leaking into the next request on it.
        self.cleanup_producer(execution.producer, &execution.task_id)
            .await;

        let (result, interrupted) = outcome?;
        if interrupted {
            info!(task_id = %execution.task_id, "Task is waiting for more input");
        }

        match result {
            AggregatedResult::Task(task) => {
                self.validate_task_id_match(&execution.task_id, &task.id)?;
                Ok(SendMessageSuccessResponseResult::Task(task))
            }
            AggregatedResult::Message(message) => {
                Ok(SendMessageSuccessResponseResult::Message(message))
            }
        }
    }

    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<TaskSubscriptionStream, A2aServerError> {
        let execution = self.setup_message_execution(params).await?;
        let handler = self.clone();

        let stream = async_stream::try_stream! {
            let Execution { task_id, queue, aggregator, producer } = execution;
            let consumer = EventConsumer::new(queue);

            let events = aggregator.consume_and_emit(consumer);
            tokio::pin!(events);

            while let Some(event) = events.next().await {
                let event = event?;
                if let Event::Task(task) = &event
                    && let Err(e) = handler.validate_task_id_match(&task_id, &task.id)
                {
                    error!(error = %e, "Task ID validation failed");
                }
                yield SendStreamingMessageSuccessResponseResult::from(event);
            }

            handler.cleanup_producer(producer, &task_id).await;
        };

        Ok(Box::pin(stream))
    }

    async fn on_resubscribe_to_task(
        &self,
        params: TaskIdParams,
    ) -> Result<TaskSubscriptionStream, A2aServerError> {
        let task = self
            .task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2aServerError::task_not_found(&params.id))?;

        if task.status.state.is_terminal() {
            return Err(A2aServerError::UnsupportedOperationError(
                Error::new(format!(
                    "Task {} is in a terminal state and cannot be resubscribed",
                    task.id
                )),
            ));
        }

        let queue = self
            .queue_manager
            .tap(&task.id)
            .await
            .ok_or_else(|| A2aServerError::task_not_found(&task.id))?;

        let aggregator = Arc::new(ResultAggregator::new(TaskManager::new(
            self.task_store.clone(),
            Some(task.id.clone()),
            Some(task.context_id.clone()),
        )));

        let stream = async_stream::try_stream! {
            // Current snapshot first, then whatever the agent publishes next.
            yield SendStreamingMessageSuccessResponseResult::Task(task);

            let events = aggregator.consume_and_emit(EventConsumer::new(queue));
            tokio::pin!(events);
            while let Some(event) = events.next().await {
                yield SendStreamingMessageSuccessResponseResult::from(event?);
            }
        };

        Ok(Box::pin(stream))
    }
}
