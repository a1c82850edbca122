//! Resolution of a network name or explicit address into a live session.
//!
//! Network resolution walks the catalog in random order, blacklisting each
//! candidate before it is attempted, until one connects within the timeout
//! or no candidates remain. The blacklist lives as long as the establisher:
//! an endpoint that failed once is never retried through the same instance.

use connector_catalog::{Endpoint, EndpointSelector, Network};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{ConnectorError, TransportError};
use crate::events::ConnectionEvent;
use crate::observer::{Observer, ReconnectObserver};
use crate::retry::RetryDelay;
use crate::session::Session;
use crate::transport::Transport;

/// Default bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which resolutions share blacklist entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlacklistScope {
    /// One blacklist for every network resolved through the establisher
    #[default]
    Shared,
    /// A separate blacklist per network
    PerNetwork,
}

/// Establisher settings
#[derive(Debug, Clone)]
pub struct EstablisherConfig {
    /// Bound on a single connection attempt
    pub connect_timeout: Duration,
    /// Delay before trying the next candidate
    pub retry_delay: RetryDelay,
    /// Blacklist sharing across networks
    pub blacklist_scope: BlacklistScope,
}

impl Default for EstablisherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_delay: RetryDelay::Immediate,
            blacklist_scope: BlacklistScope::Shared,
        }
    }
}

/// Endpoints excluded from selection, in the order they were attempted
#[derive(Debug, Default)]
struct Blacklist {
    scope: BlacklistScope,
    /// Keyed by network when scoped per network, `None` when shared
    entries: HashMap<Option<Network>, Vec<Endpoint>>,
}

impl Blacklist {
    fn new(scope: BlacklistScope) -> Self {
        Self {
            scope,
            entries: HashMap::new(),
        }
    }

    fn key(&self, network: &Network) -> Option<Network> {
        match self.scope {
            BlacklistScope::Shared => None,
            BlacklistScope::PerNetwork => Some(network.clone()),
        }
    }

    fn entries(&self, network: &Network) -> &[Endpoint] {
        self.entries
            .get(&self.key(network))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn insert(&mut self, network: &Network, endpoint: Endpoint) {
        let entries = self.entries.entry(self.key(network)).or_default();
        if !entries.contains(&endpoint) {
            entries.push(endpoint);
        }
    }

    fn snapshot(&self) -> Vec<Endpoint> {
        match self.scope {
            BlacklistScope::Shared => self.entries.get(&None).cloned().unwrap_or_default(),
            BlacklistScope::PerNetwork => {
                let mut all: Vec<Endpoint> = self.entries.values().flatten().cloned().collect();
                all.sort();
                all.dedup();
                all
            }
        }
    }
}

/// Turns network names and addresses into established sessions
///
/// Resolution calls on one instance run one at a time; the blacklist lock is
/// held for a whole resolution.
#[derive(Debug)]
pub struct ConnectionEstablisher {
    selector: EndpointSelector,
    transport: Arc<dyn Transport>,
    config: EstablisherConfig,
    blacklist: Mutex<Blacklist>,
    events: Option<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl ConnectionEstablisher {
    /// Create an establisher with an empty blacklist
    pub fn new(
        selector: EndpointSelector,
        transport: Arc<dyn Transport>,
        config: EstablisherConfig,
    ) -> Self {
        let blacklist = Mutex::new(Blacklist::new(config.blacklist_scope));
        Self {
            selector,
            transport,
            config,
            blacklist,
            events: None,
        }
    }

    /// Publish connection events on `tx`
    pub fn set_event_sender(&mut self, tx: mpsc::UnboundedSender<ConnectionEvent>) {
        self.events = Some(tx);
    }

    /// Establisher settings
    pub fn config(&self) -> &EstablisherConfig {
        &self.config
    }

    /// Endpoint selector
    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    /// Blacklisted endpoints
    pub async fn blacklist(&self) -> Vec<Endpoint> {
        self.blacklist.lock().await.snapshot()
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("Connection event receiver dropped");
            }
        }
    }

    /// Resolve a live session for `network`
    ///
    /// The returned session carries a reconnect observer for the same
    /// network. Fails once the selector reports the network unknown or
    /// exhausted; individual connect failures are retried with the next
    /// candidate.
    pub async fn resolve_by_network(
        self: &Arc<Self>,
        network: &Network,
    ) -> Result<Arc<Session>, ConnectorError> {
        let mut blacklist = self.blacklist.lock().await;
        let mut retries: u32 = 0;

        loop {
            let endpoint = match self.selector.select(network, blacklist.entries(network)) {
                Ok(endpoint) => endpoint,
                Err(cause) => {
                    let attempted = blacklist.entries(network).to_vec();
                    error!(
                        "No more endpoints available for network {}, attempted: {:?}",
                        network,
                        attempted.iter().map(Endpoint::as_str).collect::<Vec<_>>()
                    );
                    self.emit(ConnectionEvent::Exhausted {
                        network: network.clone(),
                        cause: cause.clone(),
                        attempted: attempted.clone(),
                    });
                    return Err(ConnectorError::ResolutionFailed {
                        network: network.clone(),
                        cause,
                        attempted,
                    });
                }
            };

            if retries > 0 {
                let delay = self.config.retry_delay.delay_for(retries);
                if !delay.is_zero() {
                    debug!("Waiting {:?} before trying {}", delay, endpoint);
                    tokio::time::sleep(delay).await;
                }
            }

            blacklist.insert(network, endpoint.clone());

            let observer =
                Observer::Reconnect(ReconnectObserver::new(Arc::clone(self), network.clone()));
            match self.open(&endpoint, Some(observer)).await {
                Ok(session) => return Ok(session),
                Err(_) => retries += 1,
            }
        }
    }

    /// Open a session to one explicit endpoint, without failover
    pub async fn resolve_by_endpoint(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<Session>, ConnectorError> {
        self.open(endpoint, None)
            .await
            .map_err(|reason| ConnectorError::ConnectFailed {
                endpoint: endpoint.clone(),
                reason,
            })
    }

    /// Single connection attempt under the connect timeout
    ///
    /// `observer` is registered before the link is watched, so a connection
    /// that drops right away still reaches it.
    async fn open(
        &self,
        endpoint: &Endpoint,
        observer: Option<Observer>,
    ) -> Result<Arc<Session>, TransportError> {
        let session = Session::connecting(endpoint.clone());
        debug!("Connecting to chain endpoint {}", endpoint);

        let result = match tokio::time::timeout(
            self.config.connect_timeout,
            self.transport.connect(endpoint),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.config.connect_timeout)),
        };

        match result {
            Ok(link) => {
                let (closed, close) = link.into_parts();
                let session = Arc::new(session);
                if let Some(observer) = observer {
                    session.register_observer(observer).await;
                }
                session.establish(close).await;
                watch_link(Arc::downgrade(&session), closed);

                info!("Successfully connected to endpoint: {}", endpoint);
                self.emit(ConnectionEvent::Connected {
                    session: session.id(),
                    endpoint: endpoint.clone(),
                });
                Ok(session)
            }
            Err(e) => {
                warn!("Error while connecting to the chain endpoint {}: {}", endpoint, e);
                self.emit(ConnectionEvent::AttemptFailed {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Forward the transport's disconnect signal to the session, if it still exists
fn watch_link(session: Weak<Session>, closed: oneshot::Receiver<String>) {
    tokio::spawn(async move {
        let reason = closed
            .await
            .unwrap_or_else(|_| "transport dropped the connection".to_string());

        if let Some(session) = session.upgrade() {
            session.disconnect(&reason).await;
        }
    });
}
