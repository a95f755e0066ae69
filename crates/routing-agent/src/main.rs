use clap::Parser;
use routing_agent::config::RoutingParams;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::env::configure_env()?;
    shared::logging::configure_logging()?;

    let params = RoutingParams::parse();
    routing_agent::server::serve(params).await
}
