//! Blacklist-aware random endpoint selection.

use crate::catalog::EndpointCatalog;
use crate::endpoint::{Endpoint, Network};
use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Reasons a selection can produce no endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// Network is not in the catalog
    #[error("network {0} is not in the endpoint catalog")]
    UnknownNetwork(Network),

    /// Every endpoint of the network is blacklisted
    #[error("no more endpoints available for network {0}")]
    Exhausted(Network),
}

/// Picks a candidate endpoint for a network, skipping blacklisted ones
///
/// Selection is uniformly random among the remaining candidates so that
/// independent processes spread across the nodes of a network instead of
/// converging on the first one.
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    catalog: Arc<EndpointCatalog>,
}

impl EndpointSelector {
    /// Create a selector over a catalog
    pub fn new(catalog: Arc<EndpointCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog this selector draws from
    pub fn catalog(&self) -> &Arc<EndpointCatalog> {
        &self.catalog
    }

    /// Candidates of `network` that are not in `blacklist`
    pub fn available<'a>(
        &'a self,
        network: &Network,
        blacklist: &[Endpoint],
    ) -> Result<Vec<&'a Endpoint>, SelectError> {
        let candidates = self.catalog.lookup(network).ok_or_else(|| {
            debug!("Network {} not in endpoint catalog", network);
            SelectError::UnknownNetwork(network.clone())
        })?;

        Ok(candidates
            .iter()
            .filter(|endpoint| !blacklist.contains(endpoint))
            .collect())
    }

    /// Select one endpoint of `network` not contained in `blacklist`
    pub fn select(&self, network: &Network, blacklist: &[Endpoint]) -> Result<Endpoint, SelectError> {
        let available = self.available(network, blacklist)?;

        let endpoint = available
            .choose(&mut rand::thread_rng())
            .map(|endpoint| (*endpoint).clone())
            .ok_or_else(|| SelectError::Exhausted(network.clone()))?;

        debug!(
            "Selected endpoint {} for network {} ({} candidates left)",
            endpoint,
            network,
            available.len()
        );
        Ok(endpoint)
    }
}
