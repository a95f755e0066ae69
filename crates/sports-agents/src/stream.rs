//! Classification of the raw events a model backend streams back.
//!
//! Backends hand over `RawModelEvent`s exactly as they arrive. [`classify`]
//! turns each one into a closed [`StreamEvent`] so the executor can match on
//! it exhaustively. Events that carry nothing the executor cares about map to
//! `None`.

use serde_json::Value;

pub const TEXT_DELTA: &str = "response.output_text.delta";
pub const OUTPUT_ITEM_ADDED: &str = "response.output_item.added";
pub const OUTPUT_ITEM_DONE: &str = "response.output_item.done";
pub const AGENT_UPDATED: &str = "agent.updated";
pub const RESPONSE_COMPLETED: &str = "response.completed";
pub const RESPONSE_FAILED: &str = "response.failed";
pub const ERROR: &str = "error";

const TOOL_CALL_ITEMS: &[&str] = &[
    "web_search_call",
    "mcp_call",
    "function_call",
    "file_search_call",
    "code_interpreter_call",
    "computer_call",
];

/// One server-sent event from the model, untyped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelEvent {
    pub kind: String,
    pub data: Value,
}

impl RawModelEvent {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolStart { agent: String, tool: String },
    ToolResult { tool: String, output: String },
    Handoff { from: String, to: String },
    ToolError { tool: String, message: String },
    StreamEnd,
}

pub fn classify(event: RawModelEvent) -> Option<StreamEvent> {
    let data = &event.data;
    match event.kind.as_str() {
        TEXT_DELTA => data
            .get("delta")
            .and_then(Value::as_str)
            .filter(|delta| !delta.is_empty())
            .map(|delta| StreamEvent::TextDelta(delta.to_string())),
        OUTPUT_ITEM_ADDED => tool_item(data).map(|item| StreamEvent::ToolStart {
            agent: str_field(item, "server_label").unwrap_or("assistant").to_string(),
            tool: tool_name(item),
        }),
        OUTPUT_ITEM_DONE => tool_item(data).map(|item| {
            let tool = tool_name(item);
            match tool_error(item) {
                Some(message) => StreamEvent::ToolError { tool, message },
                None => StreamEvent::ToolResult {
                    tool,
                    output: tool_output(item),
                },
            }
        }),
        AGENT_UPDATED => {
            let to = agent_name(data.get("new_agent"))?;
            let from = agent_name(data.get("previous_agent")).unwrap_or_default();
            Some(StreamEvent::Handoff { from, to })
        }
        RESPONSE_COMPLETED => Some(StreamEvent::StreamEnd),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn tool_item(data: &Value) -> Option<&Value> {
    let item = data.get("item")?;
    let kind = str_field(item, "type")?;
    TOOL_CALL_ITEMS.contains(&kind).then_some(item)
}

fn tool_name(item: &Value) -> String {
    if let Some(name) = str_field(item, "name") {
        return name.to_string();
    }
    let kind = str_field(item, "type").unwrap_or("tool");
    kind.strip_suffix("_call").unwrap_or(kind).to_string()
}

fn tool_error(item: &Value) -> Option<String> {
    match item.get("error") {
        None | Some(Value::Null) => {
            (str_field(item, "status") == Some("failed")).then(|| "tool call failed".to_string())
        }
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(
            str_field(other, "message")
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

fn tool_output(item: &Value) -> String {
    if let Some(output) = str_field(item, "output") {
        return output.to_string();
    }
    if let Some(query) = item
        .get("action")
        .and_then(|action| str_field(action, "query"))
    {
        return format!("searched for \"{query}\"");
    }
    str_field(item, "status").unwrap_or_default().to_string()
}

fn agent_name(agent: Option<&Value>) -> Option<String> {
    match agent? {
        Value::String(name) => Some(name.clone()),
        other => str_field(other, "name").map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use serde_json::json;

        #[test]
        fn text_deltas_are_classified_and_empty_ones_dropped() {
            let delta = RawModelEvent::new(TEXT_DELTA, json!({"delta": "Lakers "}));
            assert_eq!(
                classify(delta),
                Some(StreamEvent::TextDelta("Lakers ".to_string()))
            );

            let empty = RawModelEvent::new(TEXT_DELTA, json!({"delta": ""}));
            assert_eq!(classify(empty), None);
        }

        #[test]
        fn mcp_call_lifecycle() {
            let added = RawModelEvent::new(
                OUTPUT_ITEM_ADDED,
                json!({"item": {"type": "mcp_call", "name": "latest_headlines", "server_label": "sports_news"}}),
            );
            assert_eq!(
                classify(added),
                Some(StreamEvent::ToolStart {
                    agent: "sports_news".to_string(),
                    tool: "latest_headlines".to_string(),
                })
            );

            let done = RawModelEvent::new(
                OUTPUT_ITEM_DONE,
                json!({"item": {"type": "mcp_call", "name": "latest_headlines", "output": "Headline: X", "error": null}}),
            );
            assert_eq!(
                classify(done),
                Some(StreamEvent::ToolResult {
                    tool: "latest_headlines".to_string(),
                    output: "Headline: X".to_string(),
                })
            );
        }

        #[test]
        fn web_search_uses_item_type_as_tool_name() {
            let added = RawModelEvent::new(
                OUTPUT_ITEM_ADDED,
                json!({"item": {"type": "web_search_call", "status": "in_progress"}}),
            );
            assert_eq!(
                classify(added),
                Some(StreamEvent::ToolStart {
                    agent: "assistant".to_string(),
                    tool: "web_search".to_string(),
                })
            );

            let done = RawModelEvent::new(
                OUTPUT_ITEM_DONE,
                json!({"item": {"type": "web_search_call", "status": "completed", "action": {"query": "pirates score"}}}),
            );
            assert_eq!(
                classify(done),
                Some(StreamEvent::ToolResult {
                    tool: "web_search".to_string(),
                    output: "searched for \"pirates score\"".to_string(),
                })
            );
        }

        #[test]
        fn failed_tool_call_is_a_tool_error() {
            let done = RawModelEvent::new(
                OUTPUT_ITEM_DONE,
                json!({"item": {"type": "mcp_call", "name": "scores", "error": {"message": "server down"}}}),
            );
            assert_eq!(
                classify(done),
                Some(StreamEvent::ToolError {
                    tool: "scores".to_string(),
                    message: "server down".to_string(),
                })
            );
        }

        #[test]
        fn message_items_and_unknown_events_are_ignored() {
            let message_item = RawModelEvent::new(
                OUTPUT_ITEM_ADDED,
                json!({"item": {"type": "message", "role": "assistant"}}),
            );
            assert_eq!(classify(message_item), None);
            assert_eq!(
                classify(RawModelEvent::new("response.created", json!({}))),
                None
            );
        }

        #[test]
        fn handoff_and_completion() {
            let handoff = RawModelEvent::new(
                AGENT_UPDATED,
                json!({"new_agent": {"name": "Scores"}, "previous_agent": {"name": "Triage"}}),
            );
            assert_eq!(
                classify(handoff),
                Some(StreamEvent::Handoff {
                    from: "Triage".to_string(),
                    to: "Scores".to_string(),
                })
            );
            assert_eq!(
                classify(RawModelEvent::new(RESPONSE_COMPLETED, json!({}))),
                Some(StreamEvent::StreamEnd)
            );
        }
    }
}
