use std::collections::HashMap;
use std::time::Duration;

use a2a_rs::client::{CardResolver, RemoteConnection};
use a2a_rs::types::AgentCard;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Name and description of a registered remote agent, as listed to the LLM
/// and over `GET /agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
}

/// Remote agents resolved at startup, keyed by card name.
///
/// Built once and shared read-only afterwards. Listing order follows the
/// order in which names were first resolved.
#[derive(Clone, Default)]
pub struct RemoteAgentRegistry {
    connections: HashMap<String, RemoteConnection>,
    order: Vec<String>,
}

impl RemoteAgentRegistry {
    /// Resolves every address with one pooled client. Addresses that fail
    /// are logged and skipped, so the registry may end up empty.
    #[instrument(skip_all, fields(addresses = addresses.len()))]
    pub async fn initialize(
        addresses: &[String],
        timeout: Duration,
    ) -> Result<Self, CommonError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let resolver = CardResolver::new(client.clone());

        let mut registry = Self::default();
        for address in addresses {
            match resolver.resolve(address).await {
                Ok(card) => {
                    info!(agent_name = %card.name, address = %address, "Registered remote agent");
                    registry.insert(RemoteConnection::new(client.clone(), card));
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Failed to resolve remote agent, skipping");
                }
            }
        }

        info!(count = registry.len(), names = ?registry.names(), "Remote agent registry ready");
        Ok(registry)
    }

    pub fn from_connections(connections: impl IntoIterator<Item = RemoteConnection>) -> Self {
        let mut registry = Self::default();
        for connection in connections {
            registry.insert(connection);
        }
        registry
    }

    /// Adds a connection. A duplicate name replaces the earlier card but keeps
    /// its listing position.
    fn insert(&mut self, connection: RemoteConnection) {
        let name = connection.card().name.clone();
        if self.connections.insert(name.clone(), connection).is_some() {
            warn!(agent_name = %name, "Duplicate remote agent name, keeping latest card");
        } else {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&RemoteConnection> {
        self.connections.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn list(&self) -> Vec<AgentSummary> {
        self.cards()
            .map(|card| AgentSummary {
                name: card.name.clone(),
                description: card.description.clone(),
            })
            .collect()
    }

    pub fn cards(&self) -> impl Iterator<Item = &AgentCard> {
        self.order
            .iter()
            .filter_map(|name| self.connections.get(name))
            .map(RemoteConnection::card)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
