use a2a_rs::types::Task;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::runtime::{FunctionDefinition, ToolDefinition};

pub const SEND_MESSAGE: &str = "send_message";

/// The one function the routing agent may call.
pub fn send_message_tool() -> ToolDefinition {
    ToolDefinition::Function {
        function: FunctionDefinition {
            name: SEND_MESSAGE.to_string(),
            description: "Sends a task to a remote agent".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "The name of the agent to send the task to"
                    },
                    "task": {
                        "type": "string",
                        "description": "The comprehensive conversation context summary and goal to be achieved"
                    }
                },
                "required": ["agent_name", "task"]
            }),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendMessageArgs {
    pub agent_name: String,
    pub task: String,
}

/// Result of delegating one task to a remote agent.
///
/// Only `Task` carries a usable answer. The other variants are expected
/// outcomes that the model reads and reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SendMessageOutcome {
    Task(Box<Task>),
    Error(Value),
    NoUsableTask { agent: String },
}

impl SendMessageOutcome {
    pub fn no_agents() -> Self {
        SendMessageOutcome::Error(json!({
            "error": "No remote agents are currently available. The sports news and results agents are not running.",
            "message": "Please ensure the remote agents are started before trying to route requests."
        }))
    }

    pub fn agent_not_found(agent: &str, available: &[String]) -> Self {
        SendMessageOutcome::Error(json!({
            "error": format!("Agent '{agent}' not found. Available agents: {available:?}"),
            "available_agents": available,
        }))
    }

    pub fn unreachable(agent: &str, error: &str) -> Self {
        SendMessageOutcome::Error(json!({
            "error": format!("Failed to reach agent '{agent}': {error}"),
        }))
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, SendMessageOutcome::Task(_))
    }

    /// The JSON string handed back to the model as the tool output.
    pub fn to_tool_output(&self) -> String {
        match self {
            SendMessageOutcome::Task(task) => json!(task).to_string(),
            SendMessageOutcome::Error(error) => error.to_string(),
            SendMessageOutcome::NoUsableTask { agent } => json!({
                "error": format!("Agent '{agent}' returned no usable task result."),
            })
            .to_string(),
        }
    }
}

pub fn unknown_function(name: &str) -> String {
    json!({"error": format!("Unknown function: {name}")}).to_string()
}

pub fn invalid_arguments(error: &serde_json::Error) -> String {
    json!({"error": error.to_string()}).to_string()
}
