use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use tracing::debug;

use crate::stream::{ERROR, RESPONSE_FAILED, RawModelEvent};

pub type ModelEventStream = BoxStream<'static, Result<RawModelEvent, ModelError>>;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to reach model endpoint {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model endpoint {url} returned status {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    #[error("{message}")]
    Stream {
        code: Option<String>,
        message: String,
    },
    #[error("malformed model event: {0}")]
    Decode(String),
}

impl ModelError {
    /// Short type label shown to users next to the raw error text.
    pub fn type_name(&self) -> &'static str {
        match self {
            ModelError::Connection { .. } => "ConnectionError",
            ModelError::Http { status: 429, .. } => "RateLimitError",
            ModelError::Http { .. } => "APIStatusError",
            ModelError::Stream { code: Some(code), .. } if code == "rate_limit_exceeded" => {
                "RateLimitError"
            }
            ModelError::Stream { .. } => "ResponseError",
            ModelError::Decode(_) => "DecodeError",
        }
    }
}

/// A streaming model that answers one input with a sequence of raw events.
///
/// The returned stream does no work until it is first polled.
pub trait ModelBackend: Send + Sync {
    fn stream(&self, input: &str, session_id: &str) -> ModelEventStream;
}

/// Hosted tool the model may call while answering.
#[derive(Debug, Clone, PartialEq)]
pub enum HostedTool {
    WebSearch,
    Mcp {
        server_label: String,
        server_url: String,
    },
}

impl HostedTool {
    pub fn definition(&self) -> Value {
        match self {
            HostedTool::WebSearch => json!({ "type": "web_search_preview" }),
            HostedTool::Mcp {
                server_label,
                server_url,
            } => json!({
                "type": "mcp",
                "server_label": server_label,
                "server_url": server_url,
                "require_approval": "never",
            }),
        }
    }
}

/// Streams answers from a Responses-style HTTP API (`POST {base}/responses`).
#[derive(Clone)]
pub struct ResponsesBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    instructions: String,
    tool: HostedTool,
}

impl ResponsesBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
        tool: HostedTool,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            instructions: instructions.into(),
            tool,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, input: &str, session_id: &str) -> Value {
        json!({
            "model": self.model,
            "instructions": self.instructions,
            "input": input,
            "tools": [self.tool.definition()],
            "stream": true,
            "metadata": { "session_id": session_id },
        })
    }
}

impl ModelBackend for ResponsesBackend {
    fn stream(&self, input: &str, session_id: &str) -> ModelEventStream {
        let url = self.endpoint();
        let model = self.model.clone();
        let mut request = self
            .client
            .post(&url)
            .json(&self.request_body(input, session_id));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        Box::pin(async_stream::try_stream! {
            debug!(url = %url, model = %model, "Opening model stream");
            let response = request
                .send()
                .await
                .map_err(|source| ModelError::Connection { url: url.clone(), source })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                Err::<(), _>(ModelError::Http {
                    url: url.clone(),
                    status: status.as_u16(),
                    body,
                })?;
                return;
            }

            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| ModelError::Decode(e.to_string()))?;
                if event.data == "[DONE]" {
                    break;
                }
                let data: Value = serde_json::from_str(&event.data)
                    .map_err(|e| ModelError::Decode(e.to_string()))?;
                let kind = data
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(event.event);
                if kind == RESPONSE_FAILED || kind == ERROR {
                    Err::<(), _>(stream_failure(&data))?;
                }
                yield RawModelEvent::new(kind, data);
            }
        })
    }
}

fn stream_failure(data: &Value) -> ModelError {
    let error = data
        .get("response")
        .and_then(|response| response.get("error"))
        .or_else(|| data.get("error"))
        .unwrap_or(data);
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "model response failed".to_string());
    ModelError::Stream { code, message }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::stream::{RESPONSE_COMPLETED, TEXT_DELTA};
        use axum::Router;
        use axum::http::StatusCode;
        use axum::response::IntoResponse;
        use axum::routing::post;

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}/v1")
        }

        fn backend(base: &str) -> ResponsesBackend {
            ResponsesBackend::new(
                reqwest::Client::new(),
                base,
                Some("sk-test".to_string()),
                "gpt-4o-mini",
                "You are a helpful agent that searches the web for sports results.",
                HostedTool::WebSearch,
            )
        }

        #[test]
        fn mcp_tool_never_asks_for_approval() {
            let tool = HostedTool::Mcp {
                server_label: "sports_news".to_string(),
                server_url: "http://localhost:9000/mcp".to_string(),
            };
            let definition = tool.definition();
            assert_eq!(definition["type"], "mcp");
            assert_eq!(definition["server_label"], "sports_news");
            assert_eq!(definition["require_approval"], "never");
        }

        #[test]
        fn request_body_streams_with_the_hosted_tool() {
            let body = backend("http://localhost/v1/").request_body("NBA scores", "ctx-1");
            assert_eq!(body["stream"], true);
            assert_eq!(body["input"], "NBA scores");
            assert_eq!(body["tools"][0]["type"], "web_search_preview");
            assert_eq!(body["metadata"]["session_id"], "ctx-1");
            assert_eq!(
                backend("http://localhost/v1/").endpoint(),
                "http://localhost/v1/responses"
            );
        }

        #[tokio::test]
        async fn parses_server_sent_events() {
            let sse = format!(
                "event: {TEXT_DELTA}\ndata: {{\"type\":\"{TEXT_DELTA}\",\"delta\":\"Pirates won\"}}\n\n\
                 event: {RESPONSE_COMPLETED}\ndata: {{\"type\":\"{RESPONSE_COMPLETED}\"}}\n\n"
            );
            let router = Router::new().route(
                "/v1/responses",
                post(move || {
                    let sse = sse.clone();
                    async move { ([("content-type", "text/event-stream")], sse) }
                }),
            );
            let base = serve(router).await;

            let events: Vec<_> = backend(&base).stream("score?", "ctx").collect().await;
            assert_eq!(events.len(), 2);
            let first = events[0].as_ref().unwrap();
            assert_eq!(first.kind, TEXT_DELTA);
            assert_eq!(first.data["delta"], "Pirates won");
            assert_eq!(events[1].as_ref().unwrap().kind, RESPONSE_COMPLETED);
        }

        #[tokio::test]
        async fn error_event_ends_the_stream_with_an_error() {
            let sse = "data: {\"type\":\"error\",\"code\":\"rate_limit_exceeded\",\"message\":\"Rate limit reached for requests\"}\n\n";
            let router = Router::new().route(
                "/v1/responses",
                post(move || async move { ([("content-type", "text/event-stream")], sse) }),
            );
            let base = serve(router).await;

            let events: Vec<_> = backend(&base).stream("score?", "ctx").collect().await;
            assert_eq!(events.len(), 1);
            let error = events[0].as_ref().unwrap_err();
            assert_eq!(error.type_name(), "RateLimitError");
            assert_eq!(error.to_string(), "Rate limit reached for requests");
        }

        #[tokio::test]
        async fn http_failures_carry_status_and_body() {
            let router = Router::new().route(
                "/v1/responses",
                post(|| async {
                    (StatusCode::TOO_MANY_REQUESTS, "quota exceeded").into_response()
                }),
            );
            let base = serve(router).await;

            let events: Vec<_> = backend(&base).stream("score?", "ctx").collect().await;
            assert_eq!(events.len(), 1);
            match events[0].as_ref().unwrap_err() {
                ModelError::Http { status, body, .. } => {
                    assert_eq!(*status, 429);
                    assert_eq!(body, "quota exceeded");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn unreachable_endpoint_is_a_connection_error() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let events: Vec<_> = backend(&format!("http://{addr}"))
                .stream("score?", "ctx")
                .collect()
                .await;
            assert!(matches!(
                events[0].as_ref().unwrap_err(),
                ModelError::Connection { .. }
            ));
        }
    }
}
