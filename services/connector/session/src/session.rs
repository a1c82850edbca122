//! Live session to a single chain endpoint.
//!
//! A session moves through `Connecting -> Established -> Disconnected`. The
//! disconnect transition happens at most once and is the only point where
//! registered observers run. The session refers back to its client only
//! weakly, so a superseded session is freed as soon as the client lets go.

use connector_catalog::Endpoint;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::observer::Observer;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connection attempt in progress
    Connecting,
    /// Connected and usable
    Established,
    /// Connection lost or closed
    Disconnected,
}

/// Connection to one endpoint
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    state: RwLock<SessionState>,
    /// Back-reference used by observers to find the client to rebind
    client: RwLock<Weak<Client>>,
    observers: RwLock<Vec<Observer>>,
    /// Dropping the guard closes the transport connection
    link: Mutex<Option<oneshot::Sender<()>>>,
}

impl Session {
    /// Create a session that is still connecting
    pub fn connecting(endpoint: Endpoint) -> Self {
        Self {
            id: SessionId::next(),
            endpoint,
            state: RwLock::new(SessionState::Connecting),
            client: RwLock::new(Weak::new()),
            observers: RwLock::new(Vec::new()),
            link: Mutex::new(None),
        }
    }

    /// Mark the session established, taking ownership of the link guard
    pub async fn establish(&self, link: oneshot::Sender<()>) {
        *self.link.lock().await = Some(link);
        *self.state.write().await = SessionState::Established;
        debug!("Session {} established to {}", self.id, self.endpoint);
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Endpoint this session is connected to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Whether the session is established
    pub async fn is_established(&self) -> bool {
        self.state().await == SessionState::Established
    }

    /// Client currently bound to this session, if it is still alive
    pub async fn client(&self) -> Option<Arc<Client>> {
        self.client.read().await.upgrade()
    }

    /// Record the client that owns this session
    ///
    /// A disconnect that arrived before any client was bound is delivered
    /// now, so the new owner still gets its reconnection.
    pub async fn bind_client(self: &Arc<Self>, client: &Arc<Client>) {
        let pending = {
            let mut slot = self.client.write().await;
            *slot = Arc::downgrade(client);
            if *self.state.read().await == SessionState::Disconnected {
                std::mem::take(&mut *self.observers.write().await)
            } else {
                Vec::new()
            }
        };

        if !pending.is_empty() {
            debug!(
                "Delivering disconnect of session {} held back until a client was bound",
                self.id
            );
            self.notify_all(pending).await;
        }
    }

    /// Register an observer for the disconnect transition
    pub async fn register_observer(&self, observer: Observer) {
        self.observers.write().await.push(observer);
    }

    /// Snapshot of the registered observers
    pub async fn observers(&self) -> Vec<Observer> {
        self.observers.read().await.clone()
    }

    /// Deliver a disconnect event
    ///
    /// Only the first disconnect of an established session is accepted and
    /// observers are consumed by it. With no client bound yet the observers
    /// are kept until [`Session::bind_client`] runs them. Returns whether the
    /// event was accepted.
    pub async fn disconnect(self: &Arc<Self>, reason: &str) -> bool {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Established {
                debug!(
                    "Ignoring disconnect of session {} in state {:?}",
                    self.id, *state
                );
                return false;
            }
            *state = SessionState::Disconnected;
        }

        self.link.lock().await.take();
        warn!(
            "Session {} to {} disconnected: {}",
            self.id, self.endpoint, reason
        );

        let observers = std::mem::take(&mut *self.observers.write().await);
        if observers.is_empty() {
            return true;
        }

        // The client lock orders this check against bind_client
        {
            let slot = self.client.write().await;
            if slot.upgrade().is_none() {
                debug!("Session {} has no client yet, holding back its observers", self.id);
                self.observers.write().await.extend(observers);
                return true;
            }
        }

        self.notify_all(observers).await;
        true
    }

    async fn notify_all(self: &Arc<Self>, observers: Vec<Observer>) {
        for observer in observers {
            observer.notify(Arc::clone(self)).await;
        }
    }

    /// Close the session on purpose, without notifying observers
    pub async fn close(&self) {
        let was = std::mem::replace(&mut *self.state.write().await, SessionState::Disconnected);
        self.observers.write().await.clear();
        if self.link.lock().await.take().is_some() {
            info!("Closed session {} to {}", self.id, self.endpoint);
        } else {
            debug!("Session {} to {} already closed ({:?})", self.id, self.endpoint, was);
        }
    }
}
