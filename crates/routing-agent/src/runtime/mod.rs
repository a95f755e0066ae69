//! The hosted agent runtime the routing agent reasons with.
//!
//! The runtime owns agent definitions, conversation threads and runs. Runs are
//! pull-based: callers poll [`AgentsRuntime::get_run`] and answer
//! `requires_action` by submitting tool outputs.

pub mod assistants;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::rate_limit::{classify_limit, mentions_rate_limit};
use thiserror::Error;

pub use assistants::AssistantsClient;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("could not reach agent runtime at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} not found")]
    NotFound { url: String },
    #[error("agent runtime answered {url} with HTTP {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not decode agent runtime response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RuntimeError {
    /// Guidance for a call the runtime refused because of a rate, quota or
    /// usage limit. `None` for every other failure.
    pub fn limit_message(&self) -> Option<String> {
        match self {
            RuntimeError::Http { status, body, .. }
                if *status == 429 || mentions_rate_limit(body) =>
            {
                classify_limit("HTTPError", &format!("{status} {body}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    Function { function: FunctionDefinition },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAgentRequest {
    pub model: String,
    pub name: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Statuses that keep the poll loop going.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::RequiresAction
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON encoded arguments, exactly as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitToolOutputsAction {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub submit_tool_outputs: SubmitToolOutputsAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextValue {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: TextValue,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text of the last text content block.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|content| match content {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

#[async_trait]
pub trait AgentsRuntime: Send + Sync {
    async fn create_agent(
        &self,
        request: &CreateAgentRequest,
    ) -> Result<AgentDefinition, RuntimeError>;
    async fn delete_agent(&self, agent_id: &str) -> Result<(), RuntimeError>;
    async fn create_thread(&self) -> Result<Thread, RuntimeError>;
    async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError>;
    async fn create_message(&self, thread_id: &str, text: &str) -> Result<(), RuntimeError>;
    /// Starts a run. `additional_instructions` are appended to the agent's
    /// instructions for this run only.
    async fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<Run, RuntimeError>;
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RuntimeError>;
    async fn list_messages(
        &self,
        thread_id: &str,
        order: SortOrder,
    ) -> Result<Vec<ThreadMessage>, RuntimeError>;
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use serde_json::json;

        #[test]
        fn decodes_run_waiting_on_tools() {
            let run: Run = serde_json::from_value(json!({
                "id": "run_1",
                "object": "thread.run",
                "thread_id": "thread_1",
                "status": "requires_action",
                "required_action": {
                    "type": "submit_tool_outputs",
                    "submit_tool_outputs": {
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "send_message",
                                "arguments": "{\"agent_name\":\"SportsResultsAgent\",\"task\":\"score\"}"
                            }
                        }]
                    }
                },
                "last_error": null
            }))
            .unwrap();

            assert_eq!(run.status, RunStatus::RequiresAction);
            assert!(run.status.is_pending());
            assert_eq!(run.tool_calls().len(), 1);
            assert_eq!(run.tool_calls()[0].function.name, "send_message");
        }

        #[test]
        fn unknown_status_is_not_pending() {
            let run: Run = serde_json::from_value(json!({
                "id": "run_1",
                "thread_id": "thread_1",
                "status": "paused_for_lunch"
            }))
            .unwrap();
            assert_eq!(run.status, RunStatus::Unknown);
            assert!(!run.status.is_pending());
            assert!(run.tool_calls().is_empty());
        }

        #[test]
        fn throttled_calls_carry_limit_guidance() {
            let throttled = RuntimeError::Http {
                url: "/threads/t/runs".to_string(),
                status: 429,
                body: "Rate limit is exceeded for tokens per minute".to_string(),
            };
            let message = throttled.limit_message().unwrap();
            assert!(message.starts_with("⚠️ **Rate Limit Exceeded: Tokens Per Minute (TPM)**"));
            assert!(message.contains("429 Rate limit is exceeded"));

            let bare = RuntimeError::Http {
                url: "/threads".to_string(),
                status: 429,
                body: String::new(),
            };
            assert!(bare.limit_message().is_some());

            let server_error = RuntimeError::Http {
                url: "/threads".to_string(),
                status: 500,
                body: "internal".to_string(),
            };
            assert_eq!(server_error.limit_message(), None);
            let missing = RuntimeError::NotFound {
                url: "/threads/t".to_string(),
            };
            assert_eq!(missing.limit_message(), None);
        }

        #[test]
        fn message_text_skips_non_text_blocks() {
            let message: ThreadMessage = serde_json::from_value(json!({
                "id": "msg_1",
                "role": "assistant",
                "content": [
                    {"type": "image_file", "image_file": {"file_id": "f"}},
                    {"type": "text", "text": {"value": "<p>Pirates won</p>", "annotations": []}}
                ]
            }))
            .unwrap();
            assert_eq!(message.text(), Some("<p>Pirates won</p>"));
        }
    }
}
