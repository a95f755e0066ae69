use serde_json::json;

use crate::registry::AgentSummary;

const WITH_AGENTS: &str = "\
- Delegate user inquiries to appropriate specialized remote agents
- Connect users with sports_news_agent for sports news requests
- Connect users with sports_results_agent for sports results requests
- Use the send_message function to route requests to the appropriate agent";

const WITHOUT_AGENTS: &str = "\
- No specialized remote agents are currently available
- Provide helpful general responses directly to users
- Inform users that specialized agents are currently unavailable
- Do NOT use the send_message function when no agents are available";

pub const NO_AGENTS_INFO: &str = "No remote agents currently available";

/// One JSON object per line, in registry order.
pub fn agents_info(agents: &[AgentSummary]) -> String {
    if agents.is_empty() {
        return NO_AGENTS_INFO.to_string();
    }
    agents
        .iter()
        .map(|agent| json!({"name": agent.name, "description": agent.description}).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// System instructions for the routing agent. `send_message` is only
/// mentioned when at least one remote agent is registered.
pub fn root_instruction(agents: &[AgentSummary]) -> String {
    let routing = if agents.is_empty() {
        WITHOUT_AGENTS
    } else {
        WITH_AGENTS
    };

    format!(
        "You are an expert Routing Delegator that helps users with sports information requests.\n\n\
         Your role:\n{routing}\n\n\
         Available Agents: {}\n\n\
         Always be helpful and provide useful responses to users.\n\n\
         Always respond in html format.",
        agents_info(agents)
    )
}

/// Per-run instructions naming the agent the conversation last went to.
pub fn active_agent_instruction(active_agent: &str) -> String {
    format!("Currently Active Agent: {active_agent}")
}
