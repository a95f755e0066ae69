use std::time::Duration;

use clap::Parser;

use crate::orchestrator::OrchestratorConfig;

pub const DEFAULT_REMOTE_AGENTS: &str = "http://localhost:10001,http://localhost:10002";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "routing-agent",
    about = "Routes user requests to remote agents through a hosted LLM agent"
)]
pub struct RoutingParams {
    #[arg(long, env = "ROUTING_AGENT_HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "ROUTING_AGENT_PORT", default_value_t = 8083)]
    pub port: u16,
    /// Base address of a remote agent. Repeat the flag or separate with commas.
    #[arg(
        long = "remote-agent",
        env = "REMOTE_AGENT_ADDRESSES",
        default_value = DEFAULT_REMOTE_AGENTS,
        value_delimiter = ','
    )]
    pub remote_agents: Vec<String>,
    /// Assistants-style REST endpoint that hosts the routing agent.
    #[arg(long, env = "AGENTS_ENDPOINT")]
    pub runtime_endpoint: String,
    #[arg(long, env = "AGENTS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, env = "AGENTS_API_VERSION")]
    pub api_version: Option<String>,
    #[arg(long, env = "AGENTS_MODEL_DEPLOYMENT_NAME", default_value = "gpt-4.1-mini")]
    pub model: String,
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
    #[arg(long, default_value_t = 60)]
    pub max_poll_iterations: u32,
    #[arg(long, default_value_t = 30)]
    pub resolve_timeout_secs: u64,
    /// Sessions idle for longer than this are forgotten.
    #[arg(long, env = "SESSION_IDLE_TTL_SECS", default_value_t = 3600)]
    pub session_idle_ttl_secs: u64,
    #[arg(long, env = "MAX_SESSIONS", default_value_t = 10_000)]
    pub max_sessions: usize,
}

impl RoutingParams {
    /// Remote agent addresses with blanks removed, in the order given.
    pub fn remote_agent_addresses(&self) -> Vec<String> {
        self.remote_agents
            .iter()
            .flat_map(|value| shared::env::split_list(value))
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            remote_agents: self.remote_agent_addresses(),
            resolve_timeout: self.resolve_timeout(),
            poll_interval: self.poll_interval(),
            max_poll_iterations: self.max_poll_iterations,
            session_idle_ttl: Duration::from_secs(self.session_idle_ttl_secs),
            max_sessions: self.max_sessions,
        }
    }
}
