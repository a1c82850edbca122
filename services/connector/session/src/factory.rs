//! Client construction from configuration.

use connector_catalog::{Endpoint, Network};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::client::Client;
use crate::error::ConnectorError;
use crate::establisher::ConnectionEstablisher;

/// Network used when nothing else is configured
pub const DEFAULT_NETWORK: &str = "akira";

/// Where to connect: an explicit endpoint or a catalog network
///
/// An explicit endpoint wins when both are set. Empty strings count as unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Explicit `host:port` of a chain node
    #[serde(default)]
    pub chain_endpoint: Option<String>,
    /// Catalog network name
    #[serde(default)]
    pub network: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_endpoint: None,
            network: Some(DEFAULT_NETWORK.to_string()),
        }
    }
}

impl ChainConfig {
    /// Config selecting a network
    pub fn for_network(network: impl Into<String>) -> Self {
        Self {
            chain_endpoint: None,
            network: Some(network.into()),
        }
    }

    /// Config selecting an explicit endpoint
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            chain_endpoint: Some(endpoint.into()),
            network: None,
        }
    }

    fn endpoint(&self) -> Option<&str> {
        non_empty(self.chain_endpoint.as_deref())
    }

    fn network(&self) -> Option<&str> {
        non_empty(self.network.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Builds clients bound to sessions from one establisher
#[derive(Debug, Clone)]
pub struct ClientFactory {
    establisher: Arc<ConnectionEstablisher>,
}

impl ClientFactory {
    /// Create a factory over an establisher
    pub fn new(establisher: Arc<ConnectionEstablisher>) -> Self {
        Self { establisher }
    }

    /// Establisher used for resolution
    pub fn establisher(&self) -> &Arc<ConnectionEstablisher> {
        &self.establisher
    }

    /// Create a client from `config`
    pub async fn create_by_config(&self, config: &ChainConfig) -> Result<Arc<Client>, ConnectorError> {
        if let Some(endpoint) = config.endpoint() {
            let endpoint = Endpoint::parse(endpoint)?;
            return self.create_by_endpoint(&endpoint).await;
        }

        if let Some(network) = config.network() {
            return self.create_by_network(&Network::from(network)).await;
        }

        error!("Invalid chain config: chain_endpoint and network not defined");
        Err(ConnectorError::InvalidConfig(
            "chain_endpoint and network not defined".to_string(),
        ))
    }

    /// Create a client that reconnects within `network`
    pub async fn create_by_network(&self, network: &Network) -> Result<Arc<Client>, ConnectorError> {
        let session = self.establisher.resolve_by_network(network).await?;
        Ok(Client::bind(session, Some(network.clone())).await)
    }

    /// Create a client for one explicit endpoint
    pub async fn create_by_endpoint(&self, endpoint: &Endpoint) -> Result<Arc<Client>, ConnectorError> {
        let session = self.establisher.resolve_by_endpoint(endpoint).await?;
        Ok(Client::bind(session, None).await)
    }

    /// Create a client from the default config
    pub async fn create_default(&self) -> Result<Arc<Client>, ConnectorError> {
        self.create_by_config(&ChainConfig::default()).await
    }
}
