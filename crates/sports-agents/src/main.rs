use clap::Parser;
use sports_agents::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::env::configure_env()?;
    shared::logging::configure_logging()?;

    let cli = Cli::parse();
    sports_agents::server::serve(cli.agent.into_settings()).await?;
    Ok(())
}
