//! Scripted transport for tests.

use async_trait::async_trait;
use connector_catalog::{Endpoint, EndpointCatalog, EndpointSelector, Network};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::establisher::{ConnectionEstablisher, EstablisherConfig};
use crate::events::ConnectionEvent;
use crate::transport::{Link, LinkHandle, Transport};

/// How the mock answers a connect to an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Accept,
    Refuse,
    Hang,
    /// Accept, but the remote side has already gone when the link is returned
    DropAfterAccept,
}

/// Transport answering from a per-endpoint script; unknown endpoints refuse
#[derive(Debug, Default)]
pub struct MockTransport {
    behaviours: Mutex<HashMap<Endpoint, Behaviour>>,
    attempts: Mutex<Vec<Endpoint>>,
    links: Mutex<Vec<(Endpoint, LinkHandle)>>,
}

impl MockTransport {
    pub fn accepting(endpoints: &[&str]) -> Self {
        let transport = Self::default();
        for endpoint in endpoints {
            transport.set(endpoint, Behaviour::Accept);
        }
        transport
    }

    pub fn set(&self, endpoint: &str, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(Endpoint::from(endpoint), behaviour);
    }

    pub fn attempts(&self) -> Vec<Endpoint> {
        self.attempts.lock().unwrap().clone()
    }

    /// Simulate the remote side of the most recent link to `endpoint` going away
    pub fn drop_link(&self, endpoint: &str) -> bool {
        let mut links = self.links.lock().unwrap();
        let target = Endpoint::from(endpoint);
        match links.iter().rposition(|(e, _)| *e == target) {
            Some(index) => {
                let (_, handle) = links.remove(index);
                handle.disconnect("remote closed the connection");
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        self.attempts.lock().unwrap().push(endpoint.clone());
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(Behaviour::Refuse);

        match behaviour {
            Behaviour::Accept => {
                let (link, handle) = Link::pair();
                self.links.lock().unwrap().push((endpoint.clone(), handle));
                Ok(link)
            }
            Behaviour::DropAfterAccept => {
                let (link, handle) = Link::pair();
                handle.disconnect("remote closed right after accepting");
                Ok(link)
            }
            Behaviour::Refuse => Err(TransportError::Refused(endpoint.to_string())),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

pub fn catalog(networks: &[(&str, &[&str])]) -> Arc<EndpointCatalog> {
    Arc::new(EndpointCatalog::new(networks.iter().map(|(network, endpoints)| {
        (
            Network::from(*network),
            endpoints.iter().map(|addr| Endpoint::from(*addr)),
        )
    })))
}

/// Establisher over `catalog` and `transport`, with its event receiver
pub fn establisher(
    catalog: Arc<EndpointCatalog>,
    transport: Arc<MockTransport>,
    config: EstablisherConfig,
) -> (
    Arc<ConnectionEstablisher>,
    mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut establisher = ConnectionEstablisher::new(EndpointSelector::new(catalog), transport, config);
    establisher.set_event_sender(tx);
    (Arc::new(establisher), rx)
}

/// Drain events received so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
