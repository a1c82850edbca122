//! Configuration handling for the chain connector.
//!
//! Settings come from the shared YAML config file, then environment
//! variables, then command line flags, each layer overriding the previous.

use anyhow::{Context, Result};
use connector_catalog::{Endpoint, EndpointCatalog, Network};
use connector_session::{BlacklistScope, ChainConfig, EstablisherConfig, RetryDelay};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Connector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    /// Endpoint or network to connect to
    pub chain: ChainConfig,
    /// Bound on a single connection attempt
    pub connect_timeout: Duration,
    /// Delay before the next candidate after a failure
    pub retry_delay: Duration,
    /// Cap for a doubling retry delay; fixed delay when unset
    pub retry_max_delay: Option<Duration>,
    /// Blacklist sharing across networks
    pub blacklist_scope: BlacklistScope,
    /// Extra catalog networks, replacing built-in ones of the same name
    pub networks: BTreeMap<String, Vec<String>>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            connect_timeout: connector_session::DEFAULT_CONNECT_TIMEOUT,
            retry_delay: Duration::ZERO,
            retry_max_delay: None,
            blacklist_scope: BlacklistScope::Shared,
            networks: BTreeMap::new(),
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    connector: Option<ConnectorSection>,
}

#[derive(Debug, Deserialize)]
struct ConnectorSection {
    chain_endpoint: Option<String>,
    network: Option<String>,
    /// Seconds
    connect_timeout: Option<u64>,
    retry_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    blacklist_scope: Option<BlacklistScope>,
    networks: Option<BTreeMap<String, Vec<String>>>,
}

impl ConnectorConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            ),
        }

        config.apply_environment_overrides(|key| std::env::var(key).ok());

        info!(
            "Connector configuration: chain_endpoint={:?}, network={:?}, connect_timeout={:?}",
            config.chain.chain_endpoint, config.chain.network, config.connect_timeout
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(section) = root_config.connector else {
            return;
        };

        // A file that names either target replaces the default target entirely
        if section.chain_endpoint.is_some() || section.network.is_some() {
            self.chain = ChainConfig {
                chain_endpoint: section.chain_endpoint,
                network: section.network,
            };
        }
        if let Some(secs) = section.connect_timeout {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = section.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = section.retry_max_delay_ms {
            self.retry_max_delay = Some(Duration::from_millis(ms));
        }
        if let Some(scope) = section.blacklist_scope {
            self.blacklist_scope = scope;
        }
        if let Some(networks) = section.networks {
            self.networks = networks;
        }
    }

    /// Apply environment variable overrides read through `var`
    fn apply_environment_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = var("CONNECTOR_CHAIN_ENDPOINT") {
            info!("Chain endpoint overridden by environment: {}", endpoint);
            self.chain.chain_endpoint = Some(endpoint);
        }

        if let Some(network) = var("CONNECTOR_NETWORK") {
            info!("Network overridden by environment: {}", network);
            self.chain.network = Some(network);
        }

        if let Some(timeout) = var("CONNECTOR_CONNECT_TIMEOUT") {
            match humantime::parse_duration(&timeout) {
                Ok(timeout) => {
                    self.connect_timeout = timeout;
                    info!("Connect timeout overridden by environment: {:?}", timeout);
                }
                Err(e) => warn!("Ignoring invalid CONNECTOR_CONNECT_TIMEOUT {:?}: {}", timeout, e),
            }
        }
    }

    /// Reject settings no connection attempt could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            anyhow::bail!("connect timeout must be greater than zero");
        }
        Ok(())
    }

    /// Establisher settings derived from this configuration
    pub fn establisher_config(&self) -> EstablisherConfig {
        let retry_delay = match (self.retry_delay.is_zero(), self.retry_max_delay) {
            (true, _) => RetryDelay::Immediate,
            (false, None) => RetryDelay::Fixed(self.retry_delay),
            (false, Some(max)) => RetryDelay::Exponential {
                initial: self.retry_delay,
                max,
            },
        };

        EstablisherConfig {
            connect_timeout: self.connect_timeout,
            retry_delay,
            blacklist_scope: self.blacklist_scope,
        }
    }

    /// Built-in catalog with the configured networks layered on top
    pub fn catalog(&self) -> Result<EndpointCatalog> {
        let mut extra = Vec::with_capacity(self.networks.len());
        for (network, endpoints) in &self.networks {
            let endpoints = endpoints
                .iter()
                .map(|addr| Endpoint::parse(addr))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Invalid endpoint in network {}", network))?;
            extra.push((Network::from(network.as_str()), endpoints));
        }

        Ok(EndpointCatalog::builtin().with_networks(extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = ConnectorConfig::default();
        assert_eq!(config.chain, ChainConfig::for_network("akira"));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.establisher_config().retry_delay, RetryDelay::Immediate);
        assert_eq!(config.blacklist_scope, BlacklistScope::Shared);
    }

    #[test]
    fn test_load_from_file() {
        let temp_file = write_config(
            r#"
connector:
  network: staging
  connect_timeout: 2
  retry_delay_ms: 100
  retry_max_delay_ms: 1600
  blacklist_scope: per-network
  networks:
    staging:
      - 10.1.0.5:9944
      - 10.1.0.6:9944
"#,
        );

        let config = ConnectorConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.chain, ChainConfig::for_network("staging"));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.blacklist_scope, BlacklistScope::PerNetwork);

        let establisher = config.establisher_config();
        assert_eq!(
            establisher.retry_delay,
            RetryDelay::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_millis(1600),
            }
        );

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.lookup(&Network::from("staging")).unwrap().len(), 2);
        assert!(catalog.contains(&Network::from("kusanagi")));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ConnectorConfig::load_from_file("/nonexistent/connector.yaml").unwrap();
        assert_eq!(config.chain, ChainConfig::default());
    }

    #[test]
    fn test_unparsable_file_uses_defaults() {
        let temp_file = write_config("connector: [not, a, map");
        let config = ConnectorConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config, ConnectorConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CONNECTOR_CHAIN_ENDPOINT", "10.9.9.9:9944"),
            ("CONNECTOR_CONNECT_TIMEOUT", "750ms"),
        ]);

        let mut config = ConnectorConfig::default();
        config.apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.chain.chain_endpoint.as_deref(), Some("10.9.9.9:9944"));
        assert_eq!(config.chain.network.as_deref(), Some("akira"));
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let temp_file = write_config("connector:\n  connect_timeout: 0\n");
        let config = ConnectorConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.connect_timeout, Duration::ZERO);
        assert!(config.validate().is_err());

        let env: HashMap<&str, &str> = HashMap::from([("CONNECTOR_CONNECT_TIMEOUT", "0s")]);
        let mut config = ConnectorConfig::default();
        assert!(config.validate().is_ok());
        config.apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_catalog_endpoint() {
        let mut config = ConnectorConfig::default();
        config
            .networks
            .insert("broken".to_string(), vec!["no-port".to_string()]);
        assert!(config.catalog().is_err());
    }
}
