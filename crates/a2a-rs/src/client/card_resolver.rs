use tracing::{debug, instrument};

use crate::client::error::ClientError;
use crate::types::{AGENT_CARD_PATH, AgentCard};

/// Fetches and validates the capability card published by an agent.
#[derive(Clone)]
pub struct CardResolver {
    client: reqwest::Client,
}

impl CardResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetches `<base_url>/.well-known/agent-card.json`.
    #[instrument(skip(self), fields(base_url = %base_url))]
    pub async fn resolve(&self, base_url: &str) -> Result<AgentCard, ClientError> {
        let card_url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        debug!(card_url = %card_url, "Fetching agent card");

        let response = self
            .client
            .get(&card_url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&card_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Resolution {
                url: card_url,
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(&card_url, e))?;
        let card: AgentCard =
            serde_json::from_slice(&body).map_err(|e| ClientError::Resolution {
                url: card_url.clone(),
                message: format!("malformed agent card: {e}"),
            })?;

        validate(&card).map_err(|message| ClientError::Resolution {
            url: card_url,
            message,
        })?;

        debug!(agent_name = %card.name, url = %card.url, "Resolved agent card");
        Ok(card)
    }
}

fn validate(card: &AgentCard) -> Result<(), String> {
    if card.name.trim().is_empty() {
        return Err("agent card has an empty name".to_string());
    }
    url::Url::parse(&card.url).map_err(|e| format!("agent card url {:?} is invalid: {e}", card.url))?;
    if !card.supports_jsonrpc() {
        return Err(format!(
            "agent card declares unsupported transport {:?}",
            card.preferred_transport.as_deref().unwrap_or_default()
        ));
    }
    Ok(())
}
