use std::sync::Arc;

use crate::{
    errors::A2aServerError, request_handlers::RequestHandler, types::AgentCard,
};
use async_trait::async_trait;
use derive_builder::Builder;

/// Transport details of the HTTP request being served.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    pub request_uri: http::Uri,
    pub headers: http::HeaderMap,
}

/// What the JSON-RPC transport needs from an agent server.
#[async_trait]
pub trait A2aServiceLike: Send + Sync {
    async fn agent_card(&self, context: HttpRequestContext) -> Result<AgentCard, A2aServerError>;

    fn request_handler(&self, context: HttpRequestContext) -> Arc<dyn RequestHandler>;
}

/// Serves one fixed card and one request handler.
#[derive(Builder, Clone)]
#[builder(pattern = "owned")]
pub struct A2aService {
    agent_card: Arc<AgentCard>,
    request_handler: Arc<dyn RequestHandler>,
}

#[async_trait]
impl A2aServiceLike for A2aService {
    async fn agent_card(&self, _context: HttpRequestContext) -> Result<AgentCard, A2aServerError> {
        Ok(self.agent_card.as_ref().clone())
    }

    fn request_handler(&self, _context: HttpRequestContext) -> Arc<dyn RequestHandler> {
        self.request_handler.clone()
    }
}
