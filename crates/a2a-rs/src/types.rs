use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{PartialSchema, ToSchema};

use crate::errors::A2aServerError;

pub type TaskId = String;
pub type ContextId = String;
pub type Metadata = Map<String, Value>;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "0.3.0";
pub const TRANSPORT_JSONRPC: &str = "JSONRPC";

/// Canonical capability card location, relative to an agent's base address.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";
/// Served as an alias of [`AGENT_CARD_PATH`] for older clients.
pub const LEGACY_AGENT_CARD_PATH: &str = "/.well-known/agent.json";

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn task_kind() -> String {
    "task".to_string()
}

fn message_kind() -> String {
    "message".to_string()
}

fn status_update_kind() -> String {
    "status-update".to_string()
}

fn artifact_update_kind() -> String {
    "artifact-update".to_string()
}

// ---------------------------------------------------------------------------
// Agent card
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_notifications: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_transition_history: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// Self-describing manifest an agent publishes at [`AGENT_CARD_PATH`].
///
/// `url` is the literal JSON-RPC endpoint of the agent. A card that declares a
/// `preferred_transport` other than [`TRANSPORT_JSONRPC`] cannot be dispatched to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_transport: Option<String>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    pub fn supports_jsonrpc(&self) -> bool {
        match self.preferred_transport.as_deref() {
            None => true,
            Some(transport) => transport.eq_ignore_ascii_case(TRANSPORT_JSONRPC),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages and parts
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPart {
    pub text: String,
    pub metadata: Option<Metadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataPart {
    pub data: Metadata,
    pub metadata: Option<Metadata>,
}

/// A unit of message or artifact content.
///
/// Serialised with a `kind` discriminator. Peers that still send the older
/// `type` discriminator are accepted on input.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "WirePart", into = "WirePart")]
pub enum Part {
    Text(TextPart),
    Data(DataPart),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart {
            text: text.into(),
            metadata: None,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(part) => Some(part.text.as_str()),
            Part::Data(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(rename = "type", default, skip_serializing)]
    legacy_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl TryFrom<WirePart> for Part {
    type Error = String;

    fn try_from(wire: WirePart) -> Result<Self, Self::Error> {
        let kind = wire.kind.or(wire.legacy_kind);
        match (kind.as_deref(), wire.text, wire.data) {
            (Some("text") | None, Some(text), _) => Ok(Part::Text(TextPart {
                text,
                metadata: wire.metadata,
            })),
            (Some("data") | None, None, Some(data)) => Ok(Part::Data(DataPart {
                data,
                metadata: wire.metadata,
            })),
            (Some(other), _, _) => Err(format!("unsupported part kind: {other}")),
            (None, None, None) => Err("part has neither text nor data".to_string()),
        }
    }
}

impl From<Part> for WirePart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(part) => WirePart {
                kind: Some("text".to_string()),
                legacy_kind: None,
                text: Some(part.text),
                data: None,
                metadata: part.metadata,
            },
            Part::Data(part) => WirePart {
                kind: Some("data".to_string()),
                legacy_kind: None,
                text: None,
                data: Some(part.data),
                metadata: part.metadata,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default = "message_kind")]
    pub kind: String,
}

impl Message {
    /// Builds a text message with a freshly minted message id.
    pub fn new_text(
        role: Role,
        text: impl Into<String>,
        task_id: Option<TaskId>,
        context_id: Option<ContextId>,
    ) -> Self {
        Message {
            role,
            parts: vec![Part::text(text)],
            message_id: uuid::Uuid::new_v4().to_string(),
            task_id,
            context_id,
            reference_task_ids: vec![],
            metadata: None,
            kind: message_kind(),
        }
    }

    pub fn agent_text(text: impl Into<String>, task_id: &str, context_id: &str) -> Self {
        Self::new_text(
            Role::Agent,
            text,
            Some(task_id.to_string()),
            Some(context_id.to_string()),
        )
    }

    /// Concatenation of all text parts, joined by `delimiter`.
    pub fn text(&self, delimiter: &str) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    #[serde(rename = "submitted")]
    Submitted,
    #[serde(rename = "working")]
    Working,
    #[serde(rename = "input-required", alias = "input_required")]
    InputRequired,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "canceled", alias = "cancelled")]
    Canceled,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "auth-required", alias = "auth_required")]
    AuthRequired,
    #[serde(rename = "unknown")]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed | TaskState::Rejected
        )
    }

    /// States in which the task pauses until the client sends more input.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskState::InputRequired | TaskState::AuthRequired)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        TaskStatus {
            state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Artifact {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default = "task_kind")]
    pub kind: String,
}

impl Task {
    /// Creates a `submitted` task seeded with the message that started it.
    /// Ids carried by the message are kept, missing ones are minted.
    pub fn from_message(message: &Message) -> Self {
        let id = message
            .task_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut first = message.clone();
        first.task_id = Some(id.clone());
        first.context_id = Some(context_id.clone());

        Task {
            id,
            context_id,
            status: TaskStatus::new(TaskState::Submitted, None),
            history: vec![first],
            artifacts: vec![],
            metadata: None,
            kind: task_kind(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(rename = "final")]
    pub final_: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default = "status_update_kind")]
    pub kind: String,
}

impl TaskStatusUpdateEvent {
    pub fn new(task_id: &str, context_id: &str, status: TaskStatus, final_: bool) -> Self {
        TaskStatusUpdateEvent {
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
            status,
            final_,
            metadata: None,
            kind: status_update_kind(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default = "artifact_update_kind")]
    pub kind: String,
}

impl TaskArtifactUpdateEvent {
    pub fn new(
        task_id: &str,
        context_id: &str,
        artifact: Artifact,
        append: bool,
        last_chunk: bool,
    ) -> Self {
        TaskArtifactUpdateEvent {
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
            artifact,
            append: Some(append),
            last_chunk: Some(last_chunk),
            metadata: None,
            kind: artifact_update_kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Method parameters and results
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_output_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MessageSendConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    pub id: TaskId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum SendMessageSuccessResponseResult {
    Task(Task),
    Message(Message),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum SendStreamingMessageSuccessResponseResult {
    Task(Task),
    Message(Message),
    TaskStatusUpdateEvent(TaskStatusUpdateEvent),
    TaskArtifactUpdateEvent(TaskArtifactUpdateEvent),
}

// ---------------------------------------------------------------------------
// JSON-RPC envelope
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum JsonrpcRequestId {
    String(String),
    Number(i64),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JsonrpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonrpcRequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonrpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        JsonrpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(JsonrpcRequestId::String(uuid::Uuid::new_v4().to_string())),
            method: method.to_string(),
            params,
        }
    }
}

// Schemas for the two hand-written envelope types are left opaque in the
// generated OpenAPI document.
impl ToSchema for AgentCard {}

impl PartialSchema for AgentCard {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::RefOr::T(utoipa::openapi::Schema::Object(
            utoipa::openapi::ObjectBuilder::new().build(),
        ))
    }
}

impl ToSchema for JsonrpcRequest {}

impl PartialSchema for JsonrpcRequest {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::RefOr::T(utoipa::openapi::Schema::Object(
            utoipa::openapi::ObjectBuilder::new().build(),
        ))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CustomJsonrpcError {
    ///A Number that indicates the error type that occurred.
    pub code: i32,
    ///A Primitive or Structured value that contains additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    ///A String providing a short description of the error.
    pub message: String,
}

impl From<A2aServerError> for CustomJsonrpcError {
    fn from(value: A2aServerError) -> Self {
        CustomJsonrpcError {
            code: value.json_rpc_code(),
            data: value.data(),
            message: value.message(),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub enum CustomJsonRpcPayload<Data> {
    #[serde(rename = "error")]
    Err(CustomJsonrpcError),
    #[serde(rename = "result")]
    Ok(Data),
}

/// Server-side response envelope: exactly one of `result` / `error` is written.
#[derive(Serialize, Clone, Debug)]
pub struct CustomJsonrpcResponse<Data> {
    pub id: Option<JsonrpcRequestId>,
    pub jsonrpc: String,
    #[serde(flatten)]
    pub data: CustomJsonRpcPayload<Data>,
}

impl<Data> CustomJsonrpcResponse<Data> {
    pub fn new_err(id: Option<JsonrpcRequestId>, error: CustomJsonrpcError) -> Self {
        Self::new(id, CustomJsonRpcPayload::Err(error))
    }

    pub fn new_ok(id: Option<JsonrpcRequestId>, data: Data) -> Self {
        Self::new(id, CustomJsonRpcPayload::Ok(data))
    }

    pub fn new(id: Option<JsonrpcRequestId>, data: CustomJsonRpcPayload<Data>) -> Self {
        CustomJsonrpcResponse {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            data,
        }
    }
}

impl<Result: Serialize> IntoResponse for CustomJsonrpcResponse<Result> {
    fn into_response(self) -> axum::response::Response {
        (http::StatusCode::OK, Json(self)).into_response()
    }
}

impl<Data> From<Result<Data, A2aServerError>> for CustomJsonRpcPayload<Data> {
    fn from(result: Result<Data, A2aServerError>) -> Self {
        match result {
            Ok(data) => CustomJsonRpcPayload::Ok(data),
            Err(err) => CustomJsonRpcPayload::Err(err.into()),
        }
    }
}

/// Client-side view of a response envelope.
#[derive(Deserialize, Clone, Debug)]
pub struct JsonrpcResponse<Data> {
    #[serde(default)]
    pub id: Option<JsonrpcRequestId>,
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default = "Option::default")]
    pub result: Option<Data>,
    #[serde(default)]
    pub error: Option<CustomJsonrpcError>,
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use serde_json::json;

        #[test]
        fn part_accepts_legacy_type_discriminator() {
            let part: Part = serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
            assert_eq!(part.as_text(), Some("hi"));

            let encoded = serde_json::to_value(&part).unwrap();
            assert_eq!(encoded, json!({"kind": "text", "text": "hi"}));
        }

        #[test]
        fn part_rejects_unknown_kind() {
            let res: Result<Part, _> =
                serde_json::from_value(json!({"kind": "file", "file": {"uri": "x"}}));
            assert!(res.is_err());
        }

        #[test]
        fn task_state_uses_kebab_case_and_accepts_snake_case() {
            assert_eq!(
                serde_json::to_value(TaskState::InputRequired).unwrap(),
                json!("input-required")
            );
            let state: TaskState = serde_json::from_value(json!("input_required")).unwrap();
            assert_eq!(state, TaskState::InputRequired);
            assert!(TaskState::Canceled.is_terminal());
            assert!(!TaskState::Working.is_terminal());
        }

        #[test]
        fn streaming_result_distinguishes_event_shapes() {
            let status = json!({
                "taskId": "t1",
                "contextId": "c1",
                "status": {"state": "working"},
                "final": false,
                "kind": "status-update"
            });
            let parsed: SendStreamingMessageSuccessResponseResult =
                serde_json::from_value(status).unwrap();
            assert!(matches!(
                parsed,
                SendStreamingMessageSuccessResponseResult::TaskStatusUpdateEvent(_)
            ));

            let artifact = json!({
                "taskId": "t1",
                "contextId": "c1",
                "artifact": {"artifactId": "a1", "parts": [{"kind": "text", "text": "x"}]},
                "append": true,
                "lastChunk": false,
                "kind": "artifact-update"
            });
            let parsed: SendStreamingMessageSuccessResponseResult =
                serde_json::from_value(artifact).unwrap();
            assert!(matches!(
                parsed,
                SendStreamingMessageSuccessResponseResult::TaskArtifactUpdateEvent(_)
            ));
        }

        #[test]
        fn task_from_message_keeps_client_ids() {
            let message = Message::new_text(
                Role::User,
                "scores?",
                Some("task-1".to_string()),
                None,
            );
            let task = Task::from_message(&message);
            assert_eq!(task.id, "task-1");
            assert!(!task.context_id.is_empty());
            assert_eq!(task.status.state, TaskState::Submitted);
            assert_eq!(task.history[0].context_id.as_deref(), Some(task.context_id.as_str()));
        }

        #[test]
        fn error_response_omits_result() {
            let response: CustomJsonrpcResponse<Task> = CustomJsonrpcResponse::new_err(
                Some(JsonrpcRequestId::Number(7)),
                CustomJsonrpcError {
                    code: -32601,
                    data: None,
                    message: "Method not found".to_string(),
                },
            );
            let encoded = serde_json::to_value(&response).unwrap();
            assert_eq!(encoded["id"], json!(7));
            assert_eq!(encoded["error"]["code"], json!(-32601));
            assert!(encoded.get("result").is_none());
        }
    }
}
