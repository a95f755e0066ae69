use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::client::error::ClientError;
use crate::types::{
    AgentCard, JsonrpcRequest, JsonrpcResponse, MessageSendParams,
    SendMessageSuccessResponseResult,
};

/// A resolved remote agent. The card's `url` is the JSON-RPC endpoint; no
/// other paths are tried.
#[derive(Clone)]
pub struct RemoteConnection {
    client: reqwest::Client,
    card: AgentCard,
}

impl RemoteConnection {
    pub fn new(client: reqwest::Client, card: AgentCard) -> Self {
        Self { client, card }
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// The card url with exactly one trailing slash.
    pub fn endpoint(&self) -> String {
        format!("{}/", self.card.url.trim_end_matches('/'))
    }

    /// Sends `message/send` and returns the agent's task or message.
    #[instrument(skip_all, fields(agent_name = %self.card.name))]
    pub async fn send_message(
        &self,
        params: MessageSendParams,
    ) -> Result<SendMessageSuccessResponseResult, ClientError> {
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, message_id = %params.message.message_id, "Sending message");
        let request = JsonrpcRequest::new("message/send", json!(params));

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %endpoint, status = status.as_u16(), "Remote agent returned HTTP error");
            return Err(ClientError::Http {
                url: endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(&endpoint, e))?;
        let envelope: JsonrpcResponse<SendMessageSuccessResponseResult> =
            serde_json::from_slice(&body).map_err(|e| ClientError::Protocol {
                url: endpoint.clone(),
                message: format!("invalid JSON-RPC response: {e}"),
            })?;

        if let Some(error) = envelope.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        if envelope.id != request.id {
            warn!(endpoint = %endpoint, "Response id does not match request id");
        }

        envelope.result.ok_or_else(|| ClientError::Protocol {
            url: endpoint,
            message: "response carries neither result nor error".to_string(),
        })
    }
}
