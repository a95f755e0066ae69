use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use shared::rate_limit::describe_model_error;
use tracing::{debug, info, warn};

use crate::model::ModelBackend;
use crate::stream::{StreamEvent, classify};

pub const DEFAULT_FLUSH_THRESHOLD_BYTES: usize = 256;
pub const DONE: &str = "Done.";

const TOOL_OUTPUT_PREVIEW_CHARS: usize = 150;

/// One step of an agent run, as the protocol adapter consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUpdate {
    pub is_task_complete: bool,
    pub require_user_input: bool,
    pub content: String,
}

impl AgentUpdate {
    pub fn working(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: false,
            require_user_input: false,
            content: content.into(),
        }
    }

    pub fn complete(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: true,
            require_user_input: false,
            content: content.into(),
        }
    }

    pub fn input_required(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: false,
            require_user_input: true,
            content: content.into(),
        }
    }
}

pub type AgentUpdateStream = BoxStream<'static, AgentUpdate>;

/// Anything that answers a query with a stream of [`AgentUpdate`]s.
pub trait UpdateSource: Send + Sync {
    fn updates(&self, query: &str, session_id: &str) -> AgentUpdateStream;
}

/// Runs the downstream model and turns its event stream into [`AgentUpdate`]s.
///
/// Text deltas are buffered and flushed once the buffer reaches the
/// threshold, before any tool event, and at the end of the stream. The last
/// update is always either a completion or an input request.
#[derive(Clone)]
pub struct StreamingTaskExecutor {
    backend: Arc<dyn ModelBackend>,
    flush_threshold: usize,
}

impl StreamingTaskExecutor {
    pub fn new(backend: Arc<dyn ModelBackend>, flush_threshold: usize) -> Self {
        Self {
            backend,
            flush_threshold: flush_threshold.max(1),
        }
    }

    pub fn stream(
        &self,
        query: &str,
        session_id: &str,
    ) -> impl Stream<Item = AgentUpdate> + Send + 'static {
        let mut events = self.backend.stream(query, session_id);
        let threshold = self.flush_threshold;
        let session_id = session_id.to_string();

        async_stream::stream! {
            info!(session_id = %session_id, "Starting model run");
            let mut buffer = String::new();

            while let Some(event) = events.next().await {
                let raw = match event {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(error = %e, "Model stream failed");
                        if !buffer.is_empty() {
                            yield AgentUpdate::working(std::mem::take(&mut buffer));
                        }
                        yield AgentUpdate::input_required(describe_model_error(
                            e.type_name(),
                            &e.to_string(),
                        ));
                        return;
                    }
                };

                let Some(event) = classify(raw) else {
                    continue;
                };
                match event {
                    StreamEvent::TextDelta(delta) => {
                        buffer.push_str(&delta);
                        if buffer.len() >= threshold {
                            yield AgentUpdate::working(std::mem::take(&mut buffer));
                        }
                    }
                    StreamEvent::StreamEnd => {
                        debug!("Model reported completion");
                        break;
                    }
                    other => {
                        if !buffer.is_empty() {
                            yield AgentUpdate::working(std::mem::take(&mut buffer));
                        }
                        yield AgentUpdate::working(describe_event(&other));
                    }
                }
            }

            if buffer.is_empty() {
                yield AgentUpdate::complete(DONE);
            } else {
                yield AgentUpdate::complete(buffer);
            }
        }
    }
}

impl UpdateSource for StreamingTaskExecutor {
    fn updates(&self, query: &str, session_id: &str) -> AgentUpdateStream {
        Box::pin(self.stream(query, session_id))
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TOOL_OUTPUT_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(TOOL_OUTPUT_PREVIEW_CHARS).collect();
    format!("{cut}...")
}

fn describe_event(event: &StreamEvent) -> String {
    match event {
        StreamEvent::ToolStart { agent, tool } => {
            info!(agent = %agent, tool = %tool, "Tool call started");
            format!("\n🛠️ {agent} is calling {tool}\n")
        }
        StreamEvent::ToolResult { tool, output } => {
            info!(tool = %tool, "Tool call finished");
            format!("\n📋 {tool} returned: {}\n", preview(output))
        }
        StreamEvent::Handoff { from, to } if from.is_empty() => {
            format!("\n🔀 Handing off to {to}\n")
        }
        StreamEvent::Handoff { from, to } => format!("\n🔀 Handing off from {from} to {to}\n"),
        StreamEvent::ToolError { tool, message } => {
            warn!(tool = %tool, error = %message, "Tool call failed");
            format!("\n⚠️ {tool} failed: {message}\n")
        }
        StreamEvent::TextDelta(text) => text.clone(),
        StreamEvent::StreamEnd => String::new(),
    }
}
