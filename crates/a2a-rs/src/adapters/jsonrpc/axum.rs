use crate::adapters::jsonrpc::utils::map_optional_task_to_not_found;
use crate::errors::{A2aServerError, Error};
use crate::request_handlers::TaskSubscriptionStream;
use crate::service::{A2aServiceLike, HttpRequestContext};
use crate::types::{
    AgentCard, CustomJsonRpcPayload, CustomJsonrpcError, CustomJsonrpcResponse, JSONRPC_VERSION,
    JsonrpcRequest, JsonrpcRequestId, SendStreamingMessageSuccessResponseResult,
};

use super::utils::JsonResponse;
use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use http::{HeaderMap, Uri};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt as TokioStreamExt;
use tracing::{debug, info, warn};
use utoipa_axum::{router::OpenApiRouter, routes};

const API_VERSION_TAG: &str = "v1";

/// JSON-RPC endpoint at `/` plus the agent card at its current and legacy
/// well-known paths.
pub fn create_router<S: A2aServiceLike + Send + Sync + 'static>() -> OpenApiRouter<Arc<S>> {
    OpenApiRouter::new()
        .routes(routes!(json_rpc))
        .routes(routes!(agent_card))
        .routes(routes!(legacy_agent_card))
}

macro_rules! require_request_context {
    ($uri:expr, $headers:expr) => {
        HttpRequestContext {
            request_uri: $uri.clone(),
            headers: $headers.clone(),
        }
    };
}

#[utoipa::path(
    get,
    path = "/.well-known/agent-card.json",
    tags = ["a2a", API_VERSION_TAG],
    responses(
        (status = 200, description = "Successful response", body = AgentCard),
    ),
    summary = "Get agent card",
    description = "Get the agent card describing agent capabilities and skills",
    operation_id = "get-agent-card",
)]
async fn agent_card<S: A2aServiceLike + Send + Sync + 'static>(
    State(ctx): State<Arc<S>>,
    uri: Uri,
    headers: HeaderMap,
) -> JsonResponse<AgentCard, A2aServerError> {
    debug!("Received agent card request");
    let request_context = require_request_context!(uri, headers);
    JsonResponse::from(ctx.agent_card(request_context).await)
}

#[utoipa::path(
    get,
    path = "/.well-known/agent.json",
    tags = ["a2a", API_VERSION_TAG],
    responses(
        (status = 200, description = "Successful response", body = AgentCard),
    ),
    summary = "Get agent card (legacy path)",
    description = "Same card as /.well-known/agent-card.json, kept for older clients",
    operation_id = "get-agent-card-legacy",
)]
async fn legacy_agent_card<S: A2aServiceLike + Send + Sync + 'static>(
    State(ctx): State<Arc<S>>,
    uri: Uri,
    headers: HeaderMap,
) -> JsonResponse<AgentCard, A2aServerError> {
    debug!("Received legacy agent card request");
    let request_context = require_request_context!(uri, headers);
    JsonResponse::from(ctx.agent_card(request_context).await)
}

fn error_response(id: Option<JsonrpcRequestId>, error: A2aServerError) -> Response {
    warn!(code = error.json_rpc_code(), message = %error.message(), "JSON-RPC error");
    CustomJsonrpcResponse::<()>::new_err(id, CustomJsonrpcError::from(error)).into_response()
}

fn rpc_response<T: serde::Serialize>(
    id: Option<JsonrpcRequestId>,
    result: Result<T, A2aServerError>,
) -> Response {
    CustomJsonrpcResponse::new(id, CustomJsonRpcPayload::from(result)).into_response()
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, A2aServerError> {
    serde_json::from_value(params)
        .map_err(|e| A2aServerError::invalid_params(format!("Invalid params: {e}")))
}

fn error_stream(error: A2aServerError) -> TaskSubscriptionStream {
    Box::pin(futures::stream::once(async move {
        Err::<SendStreamingMessageSuccessResponseResult, _>(error)
    }))
}

/// Emits each stream item as one SSE `data:` line holding a JSON-RPC response.
fn sse_response(id: Option<JsonrpcRequestId>, stream: TaskSubscriptionStream) -> Response {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            if tx.send(item).is_err() {
                debug!("SSE client went away, stopping stream");
                break;
            }
        }
    });

    let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx);
    let stream = TokioStreamExt::map(stream, move |item| {
        let data: CustomJsonRpcPayload<SendStreamingMessageSuccessResponseResult> = item.into();
        Event::default().json_data(CustomJsonrpcResponse::new(id.clone(), data))
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(1))
                .text("keep-alive"),
        )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["a2a", API_VERSION_TAG],
    request_body = JsonrpcRequest,
    responses(
        (status = 200, description = "JSON-RPC response, or an SSE stream for streaming methods"),
    ),
    summary = "Handle JSON-RPC",
    description = "Handle JSON-RPC requests for agent-to-agent communication (messages and tasks)",
    operation_id = "handle-jsonrpc-request",
)]
async fn json_rpc<S: A2aServiceLike + Send + Sync + 'static>(
    State(ctx): State<Arc<S>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_context = require_request_context!(uri, headers);

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(
                None,
                A2aServerError::JsonParseError(Error::new(e.to_string())),
            );
        }
    };
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<JsonrpcRequestId>(id.clone()).ok());

    let request: JsonrpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return error_response(id, A2aServerError::InvalidRequest(Error::new(e.to_string())));
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return error_response(
            id,
            A2aServerError::InvalidRequest(Error::new(format!(
                "Unsupported jsonrpc version: {}",
                request.jsonrpc
            ))),
        );
    }

    info!(method = %request.method, "Received JSON-RPC request");
    let handler = ctx.request_handler(request_context);

    macro_rules! params_or_error {
        () => {
            match parse_params(request.params) {
                Ok(params) => params,
                Err(e) => return error_response(id, e),
            }
        };
    }

    match request.method.as_str() {
        "message/send" => {
            let params = params_or_error!();
            rpc_response(id, handler.on_message_send(params).await)
        }
        "tasks/get" => {
            let params = params_or_error!();
            let result = handler
                .on_get_task(params)
                .await
                .and_then(map_optional_task_to_not_found);
            rpc_response(id, result)
        }
        "tasks/cancel" => {
            let params = params_or_error!();
            let result = handler
                .on_cancel_task(params)
                .await
                .and_then(map_optional_task_to_not_found);
            rpc_response(id, result)
        }
        "message/stream" => {
            let params = params_or_error!();
            match handler.on_message_send_stream(params).await {
                Ok(stream) => sse_response(id, stream),
                Err(e) => sse_response(id, error_stream(e)),
            }
        }
        "tasks/resubscribe" => {
            let params = params_or_error!();
            match handler.on_resubscribe_to_task(params).await {
                Ok(stream) => sse_response(id, stream),
                Err(e) => sse_response(id, error_stream(e)),
            }
        }
        "tasks/pushNotificationConfig/set"
        | "tasks/pushNotificationConfig/get"
        | "tasks/pushNotificationConfig/list"
        | "tasks/pushNotificationConfig/delete" => error_response(
            id,
            A2aServerError::PushNotificationNotSupportedError(Error::new(
                "Push notifications are not supported",
            )),
        ),
        other => error_response(
            id,
            A2aServerError::MethodNotFoundError(Error::new(format!("Unknown method: {other}"))),
        ),
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::agent_execution::{AgentExecutor, BoxedFuture, RequestContext};
        use crate::events::{Event as AgentEvent, EventQueue};
        use crate::request_handlers::DefaultRequestHandler;
        use crate::service::A2aServiceBuilder;
        use crate::tasks::InMemoryTaskStore;
        use crate::types::{
            AgentCapabilities, Message, PROTOCOL_VERSION, TRANSPORT_JSONRPC, Task, TaskState,
            TaskStatus, TaskStatusUpdateEvent,
        };
        use serde_json::{Value, json};

        struct CompleteExecutor;

        impl AgentExecutor for CompleteExecutor {
            fn execute<'a>(
                &'a self,
                context: RequestContext,
                event_queue: EventQueue,
            ) -> BoxedFuture<'a> {
                Box::pin(async move {
                    if let Some(message) = context.message() {
                        event_queue
                            .enqueue_event(AgentEvent::Task(Task::from_message(message)))
                            .await;
                    }
                    event_queue
                        .enqueue_event(AgentEvent::TaskStatusUpdate(TaskStatusUpdateEvent::new(
                            context.task_id(),
                            context.context_id(),
                            TaskStatus::new(
                                TaskState::Completed,
                                Some(Message::agent_text(
                                    "done",
                                    context.task_id(),
                                    context.context_id(),
                                )),
                            ),
                            true,
                        )))
                        .await;
                    Ok(())
                })
            }

            fn cancel<'a>(&'a self, _: RequestContext, _: EventQueue) -> BoxedFuture<'a> {
                Box::pin(async { Ok(()) })
            }
        }

        fn card() -> AgentCard {
            AgentCard {
                name: "Echo".to_string(),
                description: "Echoes".to_string(),
                url: "http://localhost/".to_string(),
                version: "1.0.0".to_string(),
                protocol_version: PROTOCOL_VERSION.to_string(),
                preferred_transport: Some(TRANSPORT_JSONRPC.to_string()),
                capabilities: AgentCapabilities {
                    streaming: Some(true),
                    ..Default::default()
                },
                default_input_modes: vec!["text".to_string()],
                default_output_modes: vec!["text".to_string()],
                skills: vec![],
            }
        }

        async fn serve() -> String {
            let handler = Arc::new(DefaultRequestHandler::new(
                Arc::new(CompleteExecutor),
                Arc::new(InMemoryTaskStore::new()),
                None,
            ));
            let service = A2aServiceBuilder::default()
                .agent_card(Arc::new(card()))
                .request_handler(handler)
                .build()
                .unwrap();
            let (router, _) = create_router()
                .with_state(Arc::new(service))
                .split_for_parts();

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}")
        }

        async fn post(base: &str, body: &str) -> Value {
            reqwest::Client::new()
                .post(format!("{base}/"))
                .header("content-type", "application/json")
                .body(body.to_string())
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }

        #[tokio::test]
        async fn serves_card_on_both_paths() {
            let base = serve().await;
            for path in ["/.well-known/agent-card.json", "/.well-known/agent.json"] {
                let card: AgentCard = reqwest::get(format!("{base}{path}"))
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                assert_eq!(card.name, "Echo");
            }
        }

        #[tokio::test]
        async fn message_send_round_trip() {
            let base = serve().await;
            let body = json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "message/send",
                "params": {
                    "message": {
                        "role": "user",
                        "parts": [{"kind": "text", "text": "hi"}],
                        "messageId": "m1"
                    }
                }
            });
            let res = post(&base, &body.to_string()).await;
            assert_eq!(res["id"], json!(7));
            assert_eq!(res["result"]["status"]["state"], json!("completed"));
            assert!(res.get("error").is_none());
        }

        #[tokio::test]
        async fn protocol_errors_use_json_rpc_codes() {
            let base = serve().await;

            let res = post(&base, "{not json").await;
            assert_eq!(res["error"]["code"], json!(-32700));

            let res = post(&base, r#"{"jsonrpc":"2.0","id":"a","method":"nope","params":{}}"#).await;
            assert_eq!(res["error"]["code"], json!(-32601));
            assert_eq!(res["id"], json!("a"));

            let res = post(
                &base,
                r#"{"jsonrpc":"2.0","id":"b","method":"message/send","params":{"message":1}}"#,
            )
            .await;
            assert_eq!(res["error"]["code"], json!(-32602));

            let res = post(
                &base,
                r#"{"jsonrpc":"2.0","id":"c","method":"tasks/get","params":{"id":"missing"}}"#,
            )
            .await;
            assert_eq!(res["error"]["code"], json!(-32001));

            let res = post(
                &base,
                r#"{"jsonrpc":"2.0","id":"d","method":"tasks/pushNotificationConfig/get","params":{"id":"x"}}"#,
            )
            .await;
            assert_eq!(res["error"]["code"], json!(-32003));
        }

        #[tokio::test]
        async fn message_stream_uses_server_sent_events() {
            let base = serve().await;
            let body = json!({
                "jsonrpc": "2.0",
                "id": "s1",
                "method": "message/stream",
                "params": {
                    "message": {
                        "role": "user",
                        "parts": [{"kind": "text", "text": "hi"}],
                        "messageId": "m1"
                    }
                }
            });
            let text = reqwest::Client::new()
                .post(format!("{base}/"))
                .json(&body)
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();

            let events: Vec<Value> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data: "))
                .map(|data| serde_json::from_str(data).unwrap())
                .collect();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0]["result"]["kind"], json!("task"));
            assert_eq!(events[1]["result"]["final"], json!(true));
        }
    }
}
