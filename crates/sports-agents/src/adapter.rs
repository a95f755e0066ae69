use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use a2a_rs::agent_execution::{AgentExecutor, BoxedFuture, RequestContext};
use a2a_rs::events::{Event, EventQueue};
use a2a_rs::types::{
    Artifact, Message, Part, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};
use futures::{FutureExt, StreamExt};
use tracing::{debug, error, info, instrument};

use crate::executor::UpdateSource;

pub const RESULT_ARTIFACT_NAME: &str = "current_result";
pub const FINAL_DESCRIPTION: &str = "Result of request to agent.";
pub const STREAMING_DESCRIPTION: &str = "Result of request to agent. (streaming)";
pub const EMPTY_QUERY_MESSAGE: &str = "Please provide your query (no text was detected).";
pub const DEFAULT_INPUT_REQUIRED: &str = "Additional input is required.";
pub const DEFAULT_COMPLETION: &str = "Task completed.";
pub const UNEXPECTED_END: &str = "Stream ended unexpectedly without completion.";

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("request carries no message to start a task from")]
    MissingMessage,
}

impl AdapterError {
    fn type_name(&self) -> &'static str {
        match self {
            AdapterError::MissingMessage => "MissingMessage",
        }
    }
}

/// Serves an [`UpdateSource`] as an inter-agent task endpoint.
///
/// Every request produces at most one `current_result` artifact. The first
/// chunk creates it and later chunks append to it. Only a completion closes
/// it, so a stream that ends early leaves it open and fails the task.
#[derive(Clone)]
pub struct ProtocolAdapter {
    source: Arc<dyn UpdateSource>,
}

/// Publishes the events of one task.
struct TaskEvents<'a> {
    queue: &'a EventQueue,
    task_id: &'a str,
    context_id: &'a str,
    artifact_id: Option<String>,
}

impl TaskEvents<'_> {
    fn agent_message(&self, text: &str) -> Message {
        Message::agent_text(text, self.task_id, self.context_id)
    }

    async fn status(&self, state: TaskState, message: Option<&str>, final_: bool) {
        let message = message.map(|text| self.agent_message(text));
        self.queue
            .enqueue_event(Event::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                self.task_id,
                self.context_id,
                TaskStatus::new(state, message),
                final_,
            )))
            .await;
    }

    async fn chunk(&mut self, text: &str, description: &str, last_chunk: bool) {
        let (artifact_id, append) = match &self.artifact_id {
            Some(id) => (id.clone(), true),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                self.artifact_id = Some(id.clone());
                (id, false)
            }
        };
        debug!(artifact_id = %artifact_id, append, last_chunk, "Publishing result chunk");

        let artifact = Artifact {
            artifact_id,
            name: Some(RESULT_ARTIFACT_NAME.to_string()),
            description: Some(description.to_string()),
            parts: vec![Part::text(text)],
            metadata: None,
        };
        self.queue
            .enqueue_event(Event::TaskArtifactUpdate(TaskArtifactUpdateEvent::new(
                self.task_id,
                self.context_id,
                artifact,
                append,
                last_chunk,
            )))
            .await;
    }
}

fn non_empty<'a>(content: &'a str, default: &'a str) -> &'a str {
    if content.is_empty() {
        default
    } else {
        content
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ProtocolAdapter {
    pub fn new(source: impl UpdateSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    #[instrument(skip_all, fields(task_id = %context.task_id(), context_id = %context.context_id()))]
    async fn run(&self, context: &RequestContext, queue: &EventQueue) -> Result<(), AdapterError> {
        if context.current_task().is_none() {
            let message = context.message().ok_or(AdapterError::MissingMessage)?;
            queue
                .enqueue_event(Event::Task(Task::from_message(message)))
                .await;
        }

        let mut events = TaskEvents {
            queue,
            task_id: context.task_id(),
            context_id: context.context_id(),
            artifact_id: None,
        };

        let query = context.get_user_input("\n");
        let query = query.trim();
        if query.is_empty() {
            info!("Request carries no text, asking for input");
            events
                .status(TaskState::InputRequired, Some(EMPTY_QUERY_MESSAGE), true)
                .await;
            return Ok(());
        }

        events.status(TaskState::Working, None, false).await;

        let mut updates = self.source.updates(query, context.context_id());
        while let Some(update) = updates.next().await {
            let content = update.content.trim();

            if update.require_user_input {
                let content = non_empty(content, DEFAULT_INPUT_REQUIRED);
                events
                    .status(TaskState::InputRequired, Some(content), true)
                    .await;
                return Ok(());
            }

            if update.is_task_complete {
                let content = non_empty(content, DEFAULT_COMPLETION);
                events.chunk(content, FINAL_DESCRIPTION, true).await;
                events
                    .status(TaskState::Completed, Some(content), true)
                    .await;
                return Ok(());
            }

            if !content.is_empty() {
                events
                    .status(TaskState::Working, Some(content), false)
                    .await;
                events.chunk(content, STREAMING_DESCRIPTION, false).await;
            }
        }

        error!("Agent stream ended without a completion");
        events.status(TaskState::Failed, Some(UNEXPECTED_END), true).await;
        Ok(())
    }

    async fn fail(&self, context: &RequestContext, queue: &EventQueue, reason: String) {
        error!(task_id = %context.task_id(), reason = %reason, "Agent execution failed");
        let events = TaskEvents {
            queue,
            task_id: context.task_id(),
            context_id: context.context_id(),
            artifact_id: None,
        };
        events
            .status(TaskState::Failed, Some(&format!("Task failed: {reason}")), true)
            .await;
    }
}

impl AgentExecutor for ProtocolAdapter {
    fn execute<'a>(&'a self, context: RequestContext, event_queue: EventQueue) -> BoxedFuture<'a> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(self.run(&context, &event_queue))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.fail(&context, &event_queue, format!("{}: {e}", e.type_name()))
                        .await
                }
                Err(panic) => {
                    let reason = format!("Panic: {}", panic_message(&*panic));
                    self.fail(&context, &event_queue, reason).await
                }
            }
            Ok(())
        })
    }

    fn cancel<'a>(&'a self, context: RequestContext, event_queue: EventQueue) -> BoxedFuture<'a> {
        Box::pin(async move {
            if let Some(task) = context.current_task() {
                info!(task_id = %task.id, "Canceling task");
                event_queue
                    .enqueue_event(Event::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                        &task.id,
                        &task.context_id,
                        TaskStatus::new(TaskState::Canceled, None),
                        true,
                    )))
                    .await;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::executor::testing::ScriptedBackend;
        use crate::executor::{AgentUpdate, AgentUpdateStream, StreamingTaskExecutor};
        use crate::model::{ModelBackend, ModelError, ModelEventStream};
        use crate::stream::{RESPONSE_COMPLETED, RawModelEvent, TEXT_DELTA};
        use a2a_rs::events::DequeueError;
        use a2a_rs::request_handlers::{DefaultRequestHandler, RequestHandler};
        use a2a_rs::tasks::InMemoryTaskStore;
        use a2a_rs::types::{
            MessageSendParams, Role, SendMessageSuccessResponseResult, TaskArtifactUpdateEvent,
        };
        use serde_json::json;

        fn delta(text: &str) -> Result<RawModelEvent, ModelError> {
            Ok(RawModelEvent::new(TEXT_DELTA, json!({ "delta": text })))
        }

        fn completed() -> Result<RawModelEvent, ModelError> {
            Ok(RawModelEvent::new(RESPONSE_COMPLETED, json!({})))
        }

        fn adapter(script: Vec<Result<RawModelEvent, ModelError>>, threshold: usize) -> ProtocolAdapter {
            ProtocolAdapter::new(StreamingTaskExecutor::new(
                Arc::new(ScriptedBackend::new(script)),
                threshold,
            ))
        }

        fn context(text: &str) -> RequestContext {
            let message = Message::new_text(Role::User, text, None, None);
            RequestContext::new(
                Some(MessageSendParams {
                    message,
                    configuration: None,
                    metadata: None,
                }),
                "t1".to_string(),
                "c1".to_string(),
                None,
            )
        }

        async fn execute(adapter: &ProtocolAdapter, context: RequestContext) -> Vec<Event> {
            let queue = EventQueue::default();
            adapter.execute(context, queue.clone()).await.unwrap();
            queue.close().await;

            let mut events = vec![];
            loop {
                match queue.dequeue_event(true).await {
                    Ok(event) => events.push(event),
                    Err(DequeueError::QueueClosed) | Err(DequeueError::QueueEmpty) => break,
                }
            }
            events
        }

        fn artifact_updates(events: &[Event]) -> Vec<&TaskArtifactUpdateEvent> {
            events
                .iter()
                .filter_map(|event| match event {
                    Event::TaskArtifactUpdate(update) => Some(update),
                    _ => None,
                })
                .collect()
        }

        fn last_status(events: &[Event]) -> &TaskStatusUpdateEvent {
            events
                .iter()
                .rev()
                .find_map(|event| match event {
                    Event::TaskStatusUpdate(update) => Some(update),
                    _ => None,
                })
                .unwrap()
        }

        #[tokio::test]
        async fn streamed_chunks_build_one_artifact() {
            let adapter = adapter(vec![delta("abcd"), delta("efgh"), delta("ij"), completed()], 4);
            let events = execute(&adapter, context("who won?")).await;

            assert!(matches!(events[0], Event::Task(_)));
            let chunks = artifact_updates(&events);
            assert_eq!(chunks.len(), 3);
            assert_eq!(chunks[0].append, Some(false));
            assert!(chunks[1..].iter().all(|c| c.append == Some(true)));
            assert_eq!(
                chunks.iter().filter(|c| c.last_chunk == Some(true)).count(),
                1
            );
            assert_eq!(chunks[2].last_chunk, Some(true));
            assert!(
                chunks
                    .iter()
                    .all(|c| c.artifact.artifact_id == chunks[0].artifact.artifact_id)
            );
            assert_eq!(chunks[0].artifact.description.as_deref(), Some(STREAMING_DESCRIPTION));
            assert_eq!(chunks[2].artifact.description.as_deref(), Some(FINAL_DESCRIPTION));

            let done = last_status(&events);
            assert!(done.final_);
            assert_eq!(done.status.state, TaskState::Completed);
        }

        #[tokio::test]
        async fn incremental_chunks_are_also_working_history() {
            let adapter = adapter(vec![delta("abcd"), completed()], 4);
            let events = execute(&adapter, context("who won?")).await;

            let working: Vec<_> = events
                .iter()
                .filter_map(|event| match event {
                    Event::TaskStatusUpdate(u) if u.status.state == TaskState::Working => Some(u),
                    _ => None,
                })
                .collect();
            assert_eq!(working.len(), 2);
            assert!(working[0].status.message.is_none());
            assert_eq!(
                working[1].status.message.as_ref().map(|m| m.text("")),
                Some("abcd".to_string())
            );
            assert!(working.iter().all(|u| !u.final_));
        }

        #[tokio::test]
        async fn tool_notices_are_trimmed() {
            let adapter = ProtocolAdapter::new(FixedUpdates(vec![
                AgentUpdate::working("\n🛠️ SportsResultsAgent is calling web_search\n"),
                AgentUpdate::working("  \n "),
                AgentUpdate::complete("\nPirates 5, Reds 3\n"),
            ]));
            let events = execute(&adapter, context("who won?")).await;

            let chunks = artifact_updates(&events);
            assert_eq!(chunks.len(), 2);
            assert_eq!(
                chunks[0].artifact.text(),
                "🛠️ SportsResultsAgent is calling web_search"
            );
            assert_eq!(chunks[1].artifact.text(), "Pirates 5, Reds 3");
            assert_eq!(
                last_status(&events).status.message.as_ref().map(|m| m.text("")),
                Some("Pirates 5, Reds 3".to_string())
            );
        }

        /// Replays a fixed list of updates, with or without a completion.
        struct FixedUpdates(Vec<AgentUpdate>);

        impl UpdateSource for FixedUpdates {
            fn updates(&self, _query: &str, _session_id: &str) -> AgentUpdateStream {
                Box::pin(futures::stream::iter(self.0.clone()))
            }
        }

        #[tokio::test]
        async fn stream_without_completion_fails_the_task() {
            let adapter = ProtocolAdapter::new(FixedUpdates(vec![AgentUpdate::working(
                "Pirates lead 3-1 in the 7th",
            )]));
            let events = execute(&adapter, context("who is winning?")).await;

            let chunks = artifact_updates(&events);
            assert_eq!(chunks.len(), 1);
            assert!(chunks.iter().all(|c| c.last_chunk != Some(true)));

            let status = last_status(&events);
            assert!(status.final_);
            assert_eq!(status.status.state, TaskState::Failed);
            assert_eq!(
                status.status.message.as_ref().map(|m| m.text("")),
                Some(UNEXPECTED_END.to_string())
            );
        }

        #[tokio::test]
        async fn empty_query_asks_for_input_without_an_artifact() {
            let adapter = adapter(vec![], 256);
            let events = execute(&adapter, context("   ")).await;

            assert!(artifact_updates(&events).is_empty());
            let status = last_status(&events);
            assert!(status.final_);
            assert_eq!(status.status.state, TaskState::InputRequired);
            assert_eq!(
                status.status.message.as_ref().map(|m| m.text("")),
                Some(EMPTY_QUERY_MESSAGE.to_string())
            );
        }

        #[tokio::test]
        async fn model_error_becomes_input_required() {
            let adapter = adapter(
                vec![Err(ModelError::Decode("broken".to_string()))],
                256,
            );
            let events = execute(&adapter, context("who won?")).await;

            let status = last_status(&events);
            assert_eq!(status.status.state, TaskState::InputRequired);
            assert_eq!(
                status.status.message.as_ref().map(|m| m.text("")),
                Some("Error processing request: malformed model event: broken".to_string())
            );
        }

        struct PanickingBackend;

        impl ModelBackend for PanickingBackend {
            fn stream(&self, _input: &str, _session_id: &str) -> ModelEventStream {
                Box::pin(futures::stream::poll_fn(|_| -> std::task::Poll<
                    Option<Result<RawModelEvent, ModelError>>,
                > {
                    panic!("backend exploded")
                }))
            }
        }

        #[tokio::test]
        async fn panics_become_failed_status() {
            let adapter = ProtocolAdapter::new(StreamingTaskExecutor::new(
                Arc::new(PanickingBackend),
                256,
            ));
            let events = execute(&adapter, context("who won?")).await;

            let status = last_status(&events);
            assert_eq!(status.status.state, TaskState::Failed);
            assert_eq!(
                status.status.message.as_ref().map(|m| m.text("")),
                Some("Task failed: Panic: backend exploded".to_string())
            );
        }

        #[tokio::test]
        async fn missing_message_fails_the_task() {
            let adapter = adapter(vec![], 256);
            let context = RequestContext::new(None, "t1".to_string(), "c1".to_string(), None);
            let events = execute(&adapter, context).await;

            let status = last_status(&events);
            assert_eq!(status.status.state, TaskState::Failed);
            assert!(
                status
                    .status
                    .message
                    .as_ref()
                    .map(|m| m.text(""))
                    .unwrap()
                    .starts_with("Task failed: MissingMessage:")
            );
        }

        #[tokio::test]
        async fn cancel_only_acts_on_a_known_task() {
            let adapter = adapter(vec![], 256);

            let idle = EventQueue::default();
            adapter
                .cancel(RequestContext::new(None, "t1".into(), "c1".into(), None), idle.clone())
                .await
                .unwrap();
            assert!(idle.dequeue_event(true).await.is_err());

            let task = Task::from_message(&Message::new_text(
                Role::User,
                "hi",
                Some("t1".to_string()),
                Some("c1".to_string()),
            ));
            let queue = EventQueue::default();
            adapter
                .cancel(
                    RequestContext::new(None, "t1".into(), "c1".into(), Some(task)),
                    queue.clone(),
                )
                .await
                .unwrap();
            assert!(matches!(
                queue.dequeue_event(true).await,
                Ok(Event::TaskStatusUpdate(u)) if u.status.state == TaskState::Canceled && u.final_
            ));
        }

        #[tokio::test]
        async fn zero_deltas_complete_with_done_through_the_request_handler() {
            let handler = DefaultRequestHandler::new(
                Arc::new(adapter(vec![completed()], 256)),
                Arc::new(InMemoryTaskStore::new()),
                None,
            );
            let result = handler
                .on_message_send(MessageSendParams {
                    message: Message::new_text(Role::User, "any news?", None, None),
                    configuration: None,
                    metadata: None,
                })
                .await
                .unwrap();

            let SendMessageSuccessResponseResult::Task(task) = result else {
                panic!("expected a task");
            };
            assert_eq!(task.status.state, TaskState::Completed);
            assert_eq!(
                task.status.message.as_ref().map(|m| m.text("")),
                Some("Done.".to_string())
            );
            assert_eq!(task.artifacts.len(), 1);
            assert_eq!(task.artifacts[0].text(), "Done.");
            assert_eq!(task.artifacts[0].name.as_deref(), Some(RESULT_ARTIFACT_NAME));
        }

        #[tokio::test]
        async fn session_is_the_context_id() {
            let backend = Arc::new(ScriptedBackend::new(vec![completed()]));
            let adapter =
                ProtocolAdapter::new(StreamingTaskExecutor::new(backend.clone(), 256));
            execute(&adapter, context("  scores  ")).await;

            let inputs = backend.inputs.lock().unwrap();
            assert_eq!(inputs.as_slice(), &[("scores".to_string(), "c1".to_string())]);
        }
    }
}
