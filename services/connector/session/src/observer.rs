//! Disconnect observers.
//!
//! Reconnection is the only behaviour attached to a session's disconnect, so
//! observers are a closed enum rather than a trait object.

use connector_catalog::Network;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::establisher::ConnectionEstablisher;
use crate::events::ConnectionEvent;
use crate::session::Session;

/// Reaction registered on a session's disconnect
#[derive(Debug, Clone)]
pub enum Observer {
    /// Re-resolve the network and rebind the client
    Reconnect(ReconnectObserver),
}

impl Observer {
    /// Network a reconnecting observer resolves against
    pub fn network(&self) -> Option<&Network> {
        match self {
            Observer::Reconnect(observer) => Some(observer.network()),
        }
    }

    /// Run the observer for a disconnected session
    pub fn notify(&self, session: Arc<Session>) -> BoxFuture<'static, ()> {
        match self {
            Observer::Reconnect(observer) => {
                let observer = observer.clone();
                async move { observer.notify(&session).await }.boxed()
            }
        }
    }
}

/// Replaces a lost session with a fresh one from the same network
#[derive(Clone)]
pub struct ReconnectObserver {
    establisher: Arc<ConnectionEstablisher>,
    network: Network,
}

impl fmt::Debug for ReconnectObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectObserver")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl ReconnectObserver {
    /// Create an observer bound to an establisher and network
    pub fn new(establisher: Arc<ConnectionEstablisher>, network: Network) -> Self {
        Self {
            establisher,
            network,
        }
    }

    /// Network this observer reconnects to
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Handle the disconnect of `session`
    ///
    /// Never fails: a failed re-resolution leaves the client unbound and is
    /// reported through logs and the event channel.
    pub async fn notify(&self, session: &Arc<Session>) {
        let Some(client) = session.client().await else {
            debug!("No client bound to session {}, nothing to reconnect", session.id());
            return;
        };

        self.establisher.emit(ConnectionEvent::Disconnected {
            session: session.id(),
            endpoint: session.endpoint().clone(),
        });

        info!(
            "Reconnecting client to network {} after losing {}",
            self.network,
            session.endpoint()
        );

        match self.establisher.resolve_by_network(&self.network).await {
            Ok(replacement) => {
                let id = replacement.id();
                let endpoint = replacement.endpoint().clone();
                client.rebind(replacement).await;

                info!("Client rebound to {} (session {})", endpoint, id);
                self.establisher.emit(ConnectionEvent::Reconnected {
                    network: self.network.clone(),
                    previous: session.id(),
                    session: id,
                    endpoint,
                });
            }
            Err(e) => {
                client.unbind().await;

                error!("Reconnection to network {} failed: {}", self.network, e);
                self.establisher.emit(ConnectionEvent::ReconnectFailed {
                    network: self.network.clone(),
                    previous: session.id(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::establisher::EstablisherConfig;
    use crate::factory::ClientFactory;
    use crate::client::Client;
    use crate::session::SessionState;
    use crate::testing::{catalog, drain, establisher, Behaviour, MockTransport};
    use connector_catalog::{Endpoint, SelectError};
    use std::time::Duration;

    const AKIRA: &[&str] = &["10.0.0.1:9944", "10.0.0.2:9944", "10.0.0.3:9944"];

    #[tokio::test]
    async fn test_disconnect_rebinds_client() {
        let transport = Arc::new(MockTransport::accepting(AKIRA));
        let (establisher, mut events) = establisher(
            catalog(&[("akira", AKIRA)]),
            transport.clone(),
            EstablisherConfig::default(),
        );
        let client = ClientFactory::new(establisher)
            .create_by_network(&Network::from("akira"))
            .await
            .unwrap();
        drain(&mut events);

        let first = client.session().await.unwrap();
        assert!(first.disconnect("remote closed").await);

        let second = client.session().await.unwrap();
        assert_ne!(second.id(), first.id());
        assert_ne!(second.endpoint(), first.endpoint());
        assert!(second.is_established().await);

        // Old observer is gone, the replacement carries its own
        assert!(first.observers().await.is_empty());
        let observers = second.observers().await;
        assert_eq!(observers.len(), 1);
        assert_eq!(observers[0].network(), Some(&Network::from("akira")));

        let bound = second.client().await.unwrap();
        assert!(Arc::ptr_eq(&bound, &client));

        assert_eq!(
            drain(&mut events),
            vec![
                ConnectionEvent::Disconnected {
                    session: first.id(),
                    endpoint: first.endpoint().clone(),
                },
                ConnectionEvent::Connected {
                    session: second.id(),
                    endpoint: second.endpoint().clone(),
                },
                ConnectionEvent::Reconnected {
                    network: Network::from("akira"),
                    previous: first.id(),
                    session: second.id(),
                    endpoint: second.endpoint().clone(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_reconnect_exhaustion_unbinds_client() {
        let transport = Arc::new(MockTransport::accepting(&["127.0.0.1:9944"]));
        let (establisher, mut events) = establisher(
            catalog(&[("local", &["127.0.0.1:9944"])]),
            transport.clone(),
            EstablisherConfig::default(),
        );
        let client = ClientFactory::new(establisher)
            .create_by_network(&Network::from("local"))
            .await
            .unwrap();

        let session = client.session().await.unwrap();
        assert!(session.disconnect("remote closed").await);

        assert!(matches!(client.session().await, Err(ConnectorError::NotConnected)));
        assert!(!client.is_connected().await);

        let seen = drain(&mut events);
        assert!(seen.iter().any(|event| matches!(
            event,
            ConnectionEvent::Exhausted { cause: SelectError::Exhausted(_), attempted, .. }
                if attempted == &vec![Endpoint::from("127.0.0.1:9944")]
        )));
        assert!(matches!(
            seen.last(),
            Some(ConnectionEvent::ReconnectFailed { previous, .. }) if *previous == session.id()
        ));

        // The discarded session does not deliver a second disconnect
        assert!(!session.disconnect("remote closed").await);
        assert_eq!(transport.attempts().len(), 1);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_notify_without_client_is_noop() {
        let transport = Arc::new(MockTransport::accepting(AKIRA));
        let (establisher, mut events) = establisher(
            catalog(&[("akira", AKIRA)]),
            transport.clone(),
            EstablisherConfig::default(),
        );

        let session = establisher.resolve_by_network(&Network::from("akira")).await.unwrap();
        drain(&mut events);

        assert!(session.disconnect("remote closed").await);
        assert_eq!(transport.attempts().len(), 1);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_transport_disconnect_triggers_reconnect() {
        let transport = Arc::new(MockTransport::accepting(AKIRA));
        let (establisher, _events) = establisher(
            catalog(&[("akira", AKIRA)]),
            transport.clone(),
            EstablisherConfig::default(),
        );
        let client = ClientFactory::new(establisher)
            .create_by_network(&Network::from("akira"))
            .await
            .unwrap();

        let first = client.endpoint().await.unwrap();
        assert!(transport.drop_link(first.as_str()));

        let second = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match client.endpoint().await {
                    Some(endpoint) if endpoint != first => return endpoint,
                    _ => tokio::task::yield_now().await,
                }
            }
        })
        .await
        .unwrap();

        assert!(AKIRA.contains(&second.as_str()));
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_repeated_failover_until_exhausted() {
        let transport = Arc::new(MockTransport::accepting(AKIRA));
        let (establisher, _events) = establisher(
            catalog(&[("akira", AKIRA)]),
            transport.clone(),
            EstablisherConfig::default(),
        );
        let client = ClientFactory::new(establisher.clone())
            .create_by_network(&Network::from("akira"))
            .await
            .unwrap();

        for _ in 0..2 {
            let session = client.session().await.unwrap();
            assert!(session.disconnect("remote closed").await);
            assert!(client.is_connected().await);
        }

        // Every endpoint has now been used once
        let session = client.session().await.unwrap();
        assert!(session.disconnect("remote closed").await);
        assert!(!client.is_connected().await);
        assert_eq!(establisher.blacklist().await.len(), 3);
        assert_eq!(transport.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_before_bind_reconnects_on_bind() {
        let transport = Arc::new(MockTransport::accepting(&AKIRA[..2]));
        let (establisher, mut events) = establisher(
            catalog(&[("akira", &AKIRA[..2])]),
            transport.clone(),
            EstablisherConfig::default(),
        );

        let session = establisher.resolve_by_network(&Network::from("akira")).await.unwrap();
        assert!(session.disconnect("remote closed").await);
        assert_eq!(transport.attempts().len(), 1);

        let client = Client::bind(Arc::clone(&session), Some(Network::from("akira"))).await;

        let current = client.session().await.unwrap();
        assert_ne!(current.id(), session.id());
        assert_ne!(current.endpoint(), session.endpoint());
        assert_eq!(current.state().await, SessionState::Established);
        assert_eq!(transport.attempts().len(), 2);
        assert!(drain(&mut events)
            .iter()
            .any(|event| matches!(event, ConnectionEvent::Reconnected { previous, .. } if *previous == session.id())));

        // Held back observers run once only
        assert!(session.observers().await.is_empty());
        client.rebind(Arc::clone(&session)).await;
        assert_eq!(transport.attempts().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_link_dropped_right_after_connect_is_recovered() {
        for _ in 0..100 {
            let transport = Arc::new(MockTransport::accepting(&["10.0.0.2:9944"]));
            transport.set("10.0.0.1:9944", Behaviour::DropAfterAccept);
            let (establisher, _events) = establisher(
                catalog(&[("akira", &AKIRA[..2])]),
                transport.clone(),
                EstablisherConfig::default(),
            );

            let client = ClientFactory::new(establisher)
                .create_by_network(&Network::from("akira"))
                .await
                .unwrap();

            tokio::time::timeout(Duration::from_secs(2), async {
                loop {
                    if client.endpoint().await == Some(Endpoint::from("10.0.0.2:9944"))
                        && client.is_connected().await
                    {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_link_dropped_right_after_connect_on_last_endpoint_unbinds() {
        for _ in 0..50 {
            let transport = Arc::new(MockTransport::default());
            transport.set("127.0.0.1:9944", Behaviour::DropAfterAccept);
            let (establisher, _events) = establisher(
                catalog(&[("local", &["127.0.0.1:9944"])]),
                transport.clone(),
                EstablisherConfig::default(),
            );

            let client = ClientFactory::new(establisher)
                .create_by_network(&Network::from("local"))
                .await
                .unwrap();

            tokio::time::timeout(Duration::from_secs(2), async {
                while client.session().await.is_ok() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .unwrap();

            assert!(!client.is_connected().await);
            assert_eq!(transport.attempts().len(), 1);
        }
    }
}
