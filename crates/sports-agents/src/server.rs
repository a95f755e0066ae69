use std::net::SocketAddr;
use std::sync::Arc;

use a2a_rs::adapters::jsonrpc::axum::create_router;
use a2a_rs::request_handlers::DefaultRequestHandler;
use a2a_rs::service::A2aServiceBuilder;
use a2a_rs::tasks::InMemoryTaskStore;
use axum::Router;
use shared::error::CommonError;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::adapter::ProtocolAdapter;
use crate::config::AgentSettings;
use crate::executor::StreamingTaskExecutor;
use crate::model::{ModelBackend, ResponsesBackend};

pub fn responses_backend(settings: &AgentSettings) -> ResponsesBackend {
    ResponsesBackend::new(
        reqwest::Client::new(),
        settings.model_endpoint.clone(),
        settings.api_key.clone(),
        settings.model.clone(),
        settings.kind.instructions(),
        settings.tool.clone(),
    )
}

/// JSON-RPC endpoint plus card routes for the agent described by `settings`.
pub fn build_router(
    settings: &AgentSettings,
    backend: Arc<dyn ModelBackend>,
) -> Result<Router, CommonError> {
    let executor = StreamingTaskExecutor::new(backend, settings.flush_threshold_bytes);
    let handler = DefaultRequestHandler::new(
        Arc::new(ProtocolAdapter::new(executor)),
        Arc::new(InMemoryTaskStore::new()),
        None,
    );
    let card = settings.kind.card(&settings.host, settings.port);
    let service = A2aServiceBuilder::default()
        .agent_card(Arc::new(card))
        .request_handler(Arc::new(handler))
        .build()
        .map_err(|e| CommonError::Unknown(anyhow::anyhow!(e)))?;

    let (router, _) = create_router()
        .with_state(Arc::new(service))
        .split_for_parts();
    Ok(router.layer(CorsLayer::permissive()))
}

pub async fn serve(settings: AgentSettings) -> Result<(), CommonError> {
    let backend = Arc::new(responses_backend(&settings));
    let router = build_router(&settings, backend)?;

    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(
        agent = ?settings.kind,
        address = %addr,
        model = %settings.model,
        "Sports agent listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down sports agent");
        })
        .await?;
    Ok(())
}
