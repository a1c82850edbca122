//! Static network to endpoint catalog.

use crate::endpoint::{Endpoint, Network};
use std::collections::HashMap;
use tracing::debug;

/// Built-in entry points, all serving on the default chain port
const BUILTIN_NETWORKS: &[(&str, &[&str])] = &[
    (
        "akira",
        &[
            "104.248.52.148:9944",
            "142.93.194.110:9944",
            "162.243.175.73:9944",
            "165.227.92.237:9944",
            "167.172.141.223:9944",
            "174.138.32.166:9944",
            "206.189.194.236:9944",
            "68.183.130.145:9944",
            "68.183.140.221:9944",
            "68.183.140.251:9944",
        ],
    ),
    (
        "kusanagi",
        &[
            "142.93.203.149:9944",
            "157.230.11.1:9944",
            "157.230.11.116:9944",
            "157.230.11.31:9944",
            "157.230.11.36:9944",
            "157.230.11.53:9944",
            "157.230.3.108:9944",
            "159.65.236.189:9944",
            "165.227.81.42:9944",
            "206.189.207.173:9944",
        ],
    ),
    (
        "boltzmann",
        &["feynman.boltzmann.bittensor.com:9944", "157.230.223.68:9944"],
    ),
    ("local", &["127.0.0.1:9944"]),
];

/// Read-only mapping from network name to its candidate endpoints
///
/// Endpoints within a network are unique; the order they were given in is
/// kept but carries no meaning for selection.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    networks: HashMap<Network, Vec<Endpoint>>,
}

impl EndpointCatalog {
    /// Create a catalog from explicit network entries
    pub fn new<I, E>(networks: I) -> Self
    where
        I: IntoIterator<Item = (Network, E)>,
        E: IntoIterator<Item = Endpoint>,
    {
        let mut catalog = Self::default();
        for (network, endpoints) in networks {
            catalog.insert(network, endpoints);
        }
        catalog
    }

    /// Catalog seeded with the well-known public networks and `local`
    pub fn builtin() -> Self {
        Self::new(BUILTIN_NETWORKS.iter().map(|(network, endpoints)| {
            (
                Network::from(*network),
                endpoints.iter().map(|addr| Endpoint::from(*addr)),
            )
        }))
    }

    /// Layer extra networks on top of this catalog
    ///
    /// A network that already exists is replaced entirely.
    pub fn with_networks<I, E>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = (Network, E)>,
        E: IntoIterator<Item = Endpoint>,
    {
        for (network, endpoints) in networks {
            if self.networks.contains_key(&network) {
                debug!("Replacing catalog entry for network {}", network);
            }
            self.insert(network, endpoints);
        }
        self
    }

    fn insert<E>(&mut self, network: Network, endpoints: E)
    where
        E: IntoIterator<Item = Endpoint>,
    {
        let mut unique: Vec<Endpoint> = Vec::new();
        for endpoint in endpoints {
            if !unique.contains(&endpoint) {
                unique.push(endpoint);
            }
        }
        self.networks.insert(network, unique);
    }

    /// Candidate endpoints for a network, `None` if the network is unknown
    pub fn lookup(&self, network: &Network) -> Option<&[Endpoint]> {
        self.networks.get(network).map(Vec::as_slice)
    }

    /// Whether the catalog knows this network
    pub fn contains(&self, network: &Network) -> bool {
        self.networks.contains_key(network)
    }

    /// Known network names, sorted
    pub fn networks(&self) -> Vec<&Network> {
        let mut names: Vec<&Network> = self.networks.keys().collect();
        names.sort();
        names
    }

    /// Number of networks
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Whether the catalog has no networks
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
