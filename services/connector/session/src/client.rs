//! Long-lived client bound to a replaceable session.

use connector_catalog::{Endpoint, Network};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ConnectorError;
use crate::session::Session;

/// Handle the rest of the application holds on to
///
/// The session slot is swapped in place on reconnection, so holders of the
/// client never need a new reference. An empty slot means the last
/// reconnection failed.
#[derive(Debug)]
pub struct Client {
    network: Option<Network>,
    session: RwLock<Option<Arc<Session>>>,
}

impl Client {
    /// Wrap `session` in a new client and point the session back at it
    pub async fn bind(session: Arc<Session>, network: Option<Network>) -> Arc<Self> {
        let client = Arc::new(Self {
            network,
            session: RwLock::new(Some(Arc::clone(&session))),
        });
        session.bind_client(&client).await;
        client
    }

    /// Network this client was resolved from, `None` for an explicit endpoint
    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    /// Current session
    pub async fn session(&self) -> Result<Arc<Session>, ConnectorError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ConnectorError::NotConnected)
    }

    /// Endpoint of the current session
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.endpoint().clone())
    }

    /// Whether the client holds an established session
    pub async fn is_connected(&self) -> bool {
        let session = self.session.read().await.clone();
        match session {
            Some(session) => session.is_established().await,
            None => false,
        }
    }

    /// Replace the current session, returning the previous one
    ///
    /// The slot is updated before the session learns about the client, so a
    /// disconnect the new session already saw can rebind again on top.
    pub async fn rebind(self: &Arc<Self>, session: Arc<Session>) -> Option<Arc<Session>> {
        let previous = self.session.write().await.replace(Arc::clone(&session));
        if let Some(previous) = &previous {
            debug!("Client released session {}", previous.id());
        }
        session.bind_client(self).await;
        previous
    }

    /// Drop the current session, leaving the client unbound
    pub async fn unbind(&self) -> Option<Arc<Session>> {
        self.session.write().await.take()
    }

    /// Close and release the current session
    pub async fn close(&self) {
        if let Some(session) = self.unbind().await {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tokio::sync::oneshot;

    async fn established(addr: &str) -> (Arc<Session>, oneshot::Receiver<()>) {
        let session = Arc::new(Session::connecting(Endpoint::from(addr)));
        let (guard, closed) = oneshot::channel();
        session.establish(guard).await;
        (session, closed)
    }

    #[tokio::test]
    async fn test_rebind_swaps_session() {
        let (first, _first_link) = established("10.0.0.1:9944").await;
        let (second, _second_link) = established("10.0.0.2:9944").await;

        let client = Client::bind(Arc::clone(&first), Some(Network::from("akira"))).await;
        assert_eq!(client.endpoint().await, Some(Endpoint::from("10.0.0.1:9944")));
        assert_eq!(client.network(), Some(&Network::from("akira")));

        let previous = client.rebind(Arc::clone(&second)).await.unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(client.session().await.unwrap().id(), second.id());
        assert!(Arc::ptr_eq(&second.client().await.unwrap(), &client));
    }

    #[tokio::test]
    async fn test_unbind_reports_not_connected() {
        let (session, _link) = established("10.0.0.1:9944").await;
        let client = Client::bind(session, None).await;
        assert!(client.is_connected().await);

        assert!(client.unbind().await.is_some());
        assert!(!client.is_connected().await);
        assert!(client.endpoint().await.is_none());
        assert!(matches!(client.session().await, Err(ConnectorError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_releases_link() {
        let (session, mut link) = established("10.0.0.1:9944").await;
        let client = Client::bind(Arc::clone(&session), None).await;

        client.close().await;
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert!(matches!(
            link.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(!client.is_connected().await);
    }
}
