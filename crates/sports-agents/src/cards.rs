use a2a_rs::types::{
    AgentCapabilities, AgentCard, AgentSkill, PROTOCOL_VERSION, TRANSPORT_JSONRPC,
};

pub const RESULTS_INSTRUCTIONS: &str =
    "You are a helpful agent that searches the web for sports results.";

pub const NEWS_INSTRUCTIONS: &str = "You are a helpful agent that generates sports news stories. \
You have available several MCP tools to assist you. Use the tool that best fits the user request. \
All tools will return their results in the following format: Headline: Link: \
You must use the tools to get the information, do not make up any news stories. \
Include the headline and link in your final response.";

pub const NEWS_SERVER_LABEL: &str = "sports_news";

/// Which of the sports agents a process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Results,
    News,
}

impl AgentKind {
    pub fn default_port(&self) -> u16 {
        match self {
            AgentKind::Results => 10001,
            AgentKind::News => 10002,
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            AgentKind::Results => RESULTS_INSTRUCTIONS,
            AgentKind::News => NEWS_INSTRUCTIONS,
        }
    }

    /// The card served at the well-known path. `url` is the JSON-RPC endpoint.
    pub fn card(&self, host: &str, port: u16) -> AgentCard {
        let (name, description, skill) = match self {
            AgentKind::Results => (
                "SportsResultsAgent",
                "Returns sports results across major leagues.",
                AgentSkill {
                    id: "sports_results_agent".to_string(),
                    name: "Sports Results Agent".to_string(),
                    description: "Provides sports results (scores, winner, notable stats) across MLB, NBA, NASCAR, golf, college football.".to_string(),
                    tags: to_strings(&["mlb", "nba", "nascar", "golf", "college football"]),
                    examples: to_strings(&[
                        "Show score for Pirates game last night",
                        "What was the final score of Game 7 NBA Finals and who won?",
                        "Who won the 2025 U.S. Open (golf) and where was it played?",
                    ]),
                },
            ),
            AgentKind::News => (
                "SportsNewsAgent",
                "Returns the latest sports news headlines with links.",
                AgentSkill {
                    id: "sports_news_agent".to_string(),
                    name: "Sports News Agent".to_string(),
                    description: "Provides the latest sports news headlines with links, using news tools rather than invented stories.".to_string(),
                    tags: to_strings(&["sports", "news", "headlines"]),
                    examples: to_strings(&[
                        "What are the latest NFL headlines?",
                        "Any news about the Pittsburgh Steelers today?",
                    ]),
                },
            ),
        };

        AgentCard {
            name: name.to_string(),
            description: description.to_string(),
            url: format!("http://{host}:{port}/"),
            version: "1.0.0".to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            preferred_transport: Some(TRANSPORT_JSONRPC.to_string()),
            capabilities: AgentCapabilities {
                streaming: Some(true),
                ..Default::default()
            },
            default_input_modes: to_strings(&["text"]),
            default_output_modes: to_strings(&["text"]),
            skills: vec![skill],
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
