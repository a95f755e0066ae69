use clap::{Args, Parser, Subcommand};

use crate::cards::{AgentKind, NEWS_SERVER_LABEL};
use crate::executor::DEFAULT_FLUSH_THRESHOLD_BYTES;
use crate::model::HostedTool;

#[derive(Debug, Parser)]
#[command(name = "sports-agent", about = "Serve one of the sports agents over JSON-RPC")]
pub struct Cli {
    #[command(subcommand)]
    pub agent: AgentCommand,
}

#[derive(Debug, Subcommand)]
pub enum AgentCommand {
    /// Sports results backed by hosted web search
    Results(ServerParams),
    /// Sports news headlines backed by an MCP tool server
    News(NewsParams),
}

#[derive(Debug, Clone, Args)]
pub struct ServerParams {
    #[arg(long, env = "SPORTS_AGENT_HOST", default_value = "localhost")]
    pub host: String,
    /// Defaults to 10001 for results and 10002 for news
    #[arg(long, env = "SPORTS_AGENT_PORT")]
    pub port: Option<u16>,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub model_endpoint: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,
    #[arg(long, default_value_t = DEFAULT_FLUSH_THRESHOLD_BYTES)]
    pub flush_threshold_bytes: usize,
}

#[derive(Debug, Clone, Args)]
pub struct NewsParams {
    #[command(flatten)]
    pub server: ServerParams,
    #[arg(long, env = "SPORTS_NEWS_MCP_URL")]
    pub mcp_url: String,
}

/// Everything needed to start one agent process.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub kind: AgentKind,
    pub host: String,
    pub port: u16,
    pub model_endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub flush_threshold_bytes: usize,
    pub tool: HostedTool,
}

impl AgentCommand {
    pub fn into_settings(self) -> AgentSettings {
        let (kind, server, tool) = match self {
            AgentCommand::Results(server) => (AgentKind::Results, server, HostedTool::WebSearch),
            AgentCommand::News(news) => (
                AgentKind::News,
                news.server,
                HostedTool::Mcp {
                    server_label: NEWS_SERVER_LABEL.to_string(),
                    server_url: news.mcp_url,
                },
            ),
        };

        AgentSettings {
            kind,
            port: server.port.unwrap_or_else(|| kind.default_port()),
            host: server.host,
            model_endpoint: server.model_endpoint,
            api_key: server.api_key.filter(|key| !key.is_empty()),
            model: server.model,
            flush_threshold_bytes: server.flush_threshold_bytes,
            tool,
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn results_defaults() {
            let cli = Cli::try_parse_from(["sports-agent", "results", "--api-key", "sk-1"]).unwrap();
            let settings = cli.agent.into_settings();
            assert_eq!(settings.kind, AgentKind::Results);
            assert_eq!(settings.port, 10001);
            assert_eq!(settings.tool, HostedTool::WebSearch);
            assert_eq!(settings.flush_threshold_bytes, 256);
            assert_eq!(settings.api_key.as_deref(), Some("sk-1"));
        }

        #[test]
        fn news_uses_mcp_tool_and_its_own_port() {
            let cli = Cli::try_parse_from([
                "sports-agent",
                "news",
                "--mcp-url",
                "http://localhost:9000/mcp",
                "--host",
                "0.0.0.0",
            ])
            .unwrap();
            let settings = cli.agent.into_settings();
            assert_eq!(settings.kind, AgentKind::News);
            assert_eq!(settings.port, 10002);
            assert_eq!(settings.host, "0.0.0.0");
            assert_eq!(
                settings.tool,
                HostedTool::Mcp {
                    server_label: "sports_news".to_string(),
                    server_url: "http://localhost:9000/mcp".to_string(),
                }
            );
        }
    }
}
