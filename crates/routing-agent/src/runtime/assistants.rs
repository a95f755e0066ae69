use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{instrument, trace, warn};

use super::{
    AgentDefinition, AgentsRuntime, CreateAgentRequest, Run, RuntimeError, SortOrder, Thread,
    ThreadMessage, ToolOutput,
};

const ASSISTANTS_BETA: &str = "assistants=v2";

#[derive(serde::Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

/// [`AgentsRuntime`] over an Assistants-style REST API.
///
/// The key is sent both as `api-key` and as a bearer token so the same client
/// works against Azure-hosted and OpenAI-hosted endpoints.
#[derive(Clone)]
pub struct AssistantsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_version: Option<String>,
}

impl AssistantsClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
            api_version: api_version.filter(|version| !version.is_empty()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header("OpenAI-Beta", ASSISTANTS_BETA);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key).bearer_auth(key);
        }
        if let Some(version) = &self.api_version {
            builder = builder.query(&[("api-version", version)]);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<T, RuntimeError> {
        let response = builder.send().await.map_err(|e| RuntimeError::Connection {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RuntimeError::Connection {
            url: url.to_string(),
            source: e,
        })?;

        if status == StatusCode::NOT_FOUND {
            return Err(RuntimeError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Agent runtime returned an error");
            return Err(RuntimeError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        trace!(url = %url, "Agent runtime response received");
        serde_json::from_str(&body).map_err(|e| RuntimeError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, RuntimeError> {
        let url = self.url(path);
        self.send(self.request(Method::POST, &url).json(body), &url)
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RuntimeError> {
        let url = self.url(path);
        self.send(self.request(Method::GET, &url), &url).await
    }
}

#[async_trait]
impl AgentsRuntime for AssistantsClient {
    #[instrument(skip_all, fields(name = %request.name, model = %request.model))]
    async fn create_agent(
        &self,
        request: &CreateAgentRequest,
    ) -> Result<AgentDefinition, RuntimeError> {
        self.post("/assistants", &json!(request)).await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), RuntimeError> {
        let url = self.url(&format!("/assistants/{agent_id}"));
        let _: Value = self
            .send(self.request(Method::DELETE, &url), &url)
            .await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<Thread, RuntimeError> {
        self.post("/threads", &json!({})).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError> {
        self.get(&format!("/threads/{thread_id}")).await
    }

    async fn create_message(&self, thread_id: &str, text: &str) -> Result<(), RuntimeError> {
        let _: Value = self
            .post(
                &format!("/threads/{thread_id}/messages"),
                &json!({"role": "user", "content": text}),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<Run, RuntimeError> {
        let mut body = json!({"assistant_id": agent_id});
        if let Some(instructions) = additional_instructions {
            body["additional_instructions"] = json!(instructions);
        }
        self.post(&format!("/threads/{thread_id}/runs"), &body).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError> {
        self.get(&format!("/threads/{thread_id}/runs/{run_id}"))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RuntimeError> {
        self.post(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &json!({"tool_outputs": outputs}),
        )
        .await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: SortOrder,
    ) -> Result<Vec<ThreadMessage>, RuntimeError> {
        let url = self.url(&format!("/threads/{thread_id}/messages"));
        let builder = self
            .request(Method::GET, &url)
            .query(&[("order", order.as_str())]);
        let list: MessageList = self.send(builder, &url).await?;
        Ok(list.data)
    }
}
