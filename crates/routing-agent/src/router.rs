use std::sync::Arc;
use std::time::Duration;

use a2a_rs::adapters::jsonrpc::utils::JsonResponse;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use tokio::sync::mpsc::UnboundedSender;
use tokio_stream::StreamExt as TokioStreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, trace};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::orchestrator::{
    RoutingOrchestrator, StatusEvent, StatusEventKind, StatusSink, UserTurn,
};
use crate::registry::AgentSummary;

pub const SERVICE_ROUTE_KEY: &str = "routing";
pub const API_VERSION: &str = "1.0.0";
pub const WORKING_STATUS: &str = "🤖 Agent working...";
pub const EMPTY_MESSAGE: &str = "Message cannot be empty";

pub struct RoutingService {
    pub orchestrator: Arc<RoutingOrchestrator>,
}

impl RoutingService {
    pub fn new(orchestrator: Arc<RoutingOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

pub fn create_router() -> OpenApiRouter<Arc<RoutingService>> {
    OpenApiRouter::new()
        .routes(routes!(route_root))
        .routes(routes!(route_health))
        .routes(routes!(route_list_agents))
        .routes(routes!(route_chat))
        .routes(routes!(route_chat_stream))
        .routes(routes!(route_reset))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl ChatRequest {
    fn into_turn(self) -> Result<UserTurn, CommonError> {
        if self.message.trim().is_empty() {
            return Err(CommonError::invalid_request(EMPTY_MESSAGE));
        }
        Ok(UserTurn {
            text: self.message,
            session_id: self.session_id,
            thread_id: self.thread_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentStatus {
    pub agent_id: String,
    pub available_remote_agents: usize,
    pub remote_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub agent_status: AgentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub agent_initialized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListAgentsResponse {
    pub remote_agents: Vec<AgentSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResetParams {
    /// Session to forget. All sessions are reset when omitted.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetResponse {
    pub status: String,
    pub thread_id: Option<String>,
}

/// One server-sent event of `/chat/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    Status { content: String },
    Response { content: String },
    Error { content: String },
    End,
}

impl From<StatusEvent> for ChatStreamEvent {
    fn from(event: StatusEvent) -> Self {
        let content = match event.kind {
            StatusEventKind::AgentStart => format!(
                "🤖 Delegating to <strong>{}</strong> agent...",
                event.agent_name
            ),
            StatusEventKind::AgentComplete => format!(
                "✅ <strong>{}</strong> agent completed processing",
                event.agent_name
            ),
        };
        ChatStreamEvent::Status { content }
    }
}

struct StreamStatusSink(UnboundedSender<ChatStreamEvent>);

impl StatusSink for StreamStatusSink {
    fn notify(&self, event: StatusEvent) {
        let _ = self.0.send(event.into());
    }
}

#[utoipa::path(
    get,
    path = "/",
    tags = [SERVICE_ROUTE_KEY],
    responses(
        (status = 200, description = "Service information", body = RootResponse),
    ),
    summary = "Service information",
    operation_id = "get-root",
)]
async fn route_root(State(ctx): State<Arc<RoutingService>>) -> Json<RootResponse> {
    let registry = ctx.orchestrator.registry();
    Json(RootResponse {
        message: "Sports Routing Agent API".to_string(),
        version: API_VERSION.to_string(),
        status: "running".to_string(),
        agent_status: AgentStatus {
            agent_id: ctx.orchestrator.agent_id().to_string(),
            available_remote_agents: registry.len(),
            remote_agents: registry.names(),
        },
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tags = [SERVICE_ROUTE_KEY],
    responses(
        (status = 200, description = "Health check", body = HealthResponse),
    ),
    summary = "Health check",
    operation_id = "get-health",
)]
async fn route_health(State(_ctx): State<Arc<RoutingService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_initialized: true,
    })
}

#[utoipa::path(
    get,
    path = "/agents",
    tags = [SERVICE_ROUTE_KEY],
    responses(
        (status = 200, description = "Registered remote agents", body = ListAgentsResponse),
    ),
    summary = "List remote agents",
    operation_id = "list-agents",
)]
async fn route_list_agents(State(ctx): State<Arc<RoutingService>>) -> Json<ListAgentsResponse> {
    let remote_agents = ctx.orchestrator.registry().list();
    Json(ListAgentsResponse {
        count: remote_agents.len(),
        remote_agents,
    })
}

#[utoipa::path(
    post,
    path = "/chat",
    tags = [SERVICE_ROUTE_KEY],
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Routing agent reply", body = ChatResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Chat",
    description = "Run one turn through the routing agent and return its reply",
    operation_id = "chat",
)]
async fn route_chat(
    State(ctx): State<Arc<RoutingService>>,
    Json(request): Json<ChatRequest>,
) -> JsonResponse<ChatResponse, CommonError> {
    let res = chat(&ctx, request).await;
    JsonResponse::from(res)
}

async fn chat(ctx: &RoutingService, request: ChatRequest) -> Result<ChatResponse, CommonError> {
    let turn = request.into_turn()?;
    let reply = ctx
        .orchestrator
        .process_user_message(turn, None)
        .await
        .map_err(|e| {
            error!(error = %e, "Chat turn failed");
            CommonError::internal(format!("An error occurred: {e}"))
        })?;
    Ok(ChatResponse {
        response: reply.response,
        session_id: reply.session_id,
        thread_id: reply.thread_id,
    })
}

#[utoipa::path(
    post,
    path = "/chat/stream",
    tags = [SERVICE_ROUTE_KEY],
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Server-sent events: status, response or error, then end", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Bad Request", body = CommonError),
    ),
    summary = "Chat (streaming)",
    description = "Run one turn through the routing agent, streaming delegation progress",
    operation_id = "chat-stream",
)]
async fn route_chat_stream(
    State(ctx): State<Arc<RoutingService>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let turn = match request.into_turn() {
        Ok(turn) => turn,
        Err(e) => return e.into_response(),
    };

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = ctx.orchestrator.clone();

    tokio::spawn(async move {
        let _ = tx.send(ChatStreamEvent::Status {
            content: WORKING_STATUS.to_string(),
        });

        let sink = Arc::new(StreamStatusSink(tx.clone()));
        let result = orchestrator.process_user_message(turn, Some(sink)).await;
        let last = match result {
            Ok(reply) => ChatStreamEvent::Response {
                content: reply.response,
            },
            Err(e) => {
                error!(error = %e, "Streaming chat turn failed");
                ChatStreamEvent::Error {
                    content: format!("An error occurred: {e}"),
                }
            }
        };
        let _ = tx.send(last);
        let _ = tx.send(ChatStreamEvent::End);
    });

    let stream = UnboundedReceiverStream::new(rx);
    let stream = TokioStreamExt::map(stream, |event| {
        trace!(?event, "Emitting chat SSE event");
        SseEvent::default().json_data(&event)
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/reset",
    tags = [SERVICE_ROUTE_KEY],
    params(ResetParams),
    responses(
        (status = 200, description = "Session reset", body = ResetResponse),
    ),
    summary = "Reset conversation",
    description = "Forget the session's thread so the next turn starts a new conversation",
    operation_id = "reset",
)]
async fn route_reset(
    State(ctx): State<Arc<RoutingService>>,
    Query(params): Query<ResetParams>,
) -> Json<ResetResponse> {
    ctx.orchestrator.sessions().reset(params.session_id.as_deref());
    info!(session_id = ?params.session_id, "Reset routing session");
    Json(ResetResponse {
        status: "reset".to_string(),
        thread_id: None,
    })
}
