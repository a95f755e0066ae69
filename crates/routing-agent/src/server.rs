use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use shared::error::CommonError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::RoutingParams;
use crate::orchestrator::RoutingOrchestrator;
use crate::router::{RoutingService, create_router};
use crate::runtime::AssistantsClient;

pub fn build_router(orchestrator: Arc<RoutingOrchestrator>) -> Router {
    let service = Arc::new(RoutingService::new(orchestrator));
    let (router, _) = create_router().split_for_parts();
    router.with_state(service).layer(CorsLayer::permissive())
}

pub async fn serve(params: RoutingParams) -> Result<(), anyhow::Error> {
    let runtime = Arc::new(AssistantsClient::new(
        reqwest::Client::new(),
        params.runtime_endpoint.clone(),
        params.api_key.clone(),
        params.api_version.clone(),
    ));
    let orchestrator = Arc::new(
        RoutingOrchestrator::create(params.orchestrator_config(), runtime).await?,
    );
    let router = build_router(orchestrator.clone());

    let listener = tokio::net::TcpListener::bind((params.host.as_str(), params.port))
        .await
        .map_err(CommonError::from)?;
    let addr: SocketAddr = listener.local_addr().map_err(CommonError::from)?;
    info!(
        address = %addr,
        agent_id = %orchestrator.agent_id(),
        remote_agents = ?orchestrator.registry().names(),
        "Routing agent listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down routing agent");
        })
        .await
        .map_err(CommonError::from)?;

    if let Err(e) = orchestrator.shutdown().await {
        warn!(error = %e, "Failed to delete routing agent");
    }
    Ok(())
}
