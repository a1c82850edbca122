//! Connection events published for observers outside the connector.

use connector_catalog::{Endpoint, Network, SelectError};

use crate::session::SessionId;

/// State changes of the connector, mirrored from its log output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A session was established
    Connected {
        /// New session
        session: SessionId,
        /// Endpoint it is connected to
        endpoint: Endpoint,
    },
    /// A single connection attempt failed or timed out
    AttemptFailed {
        /// Endpoint that was attempted
        endpoint: Endpoint,
        /// Failure description
        reason: String,
    },
    /// Resolution stopped without a session
    Exhausted {
        /// Network being resolved
        network: Network,
        /// Why selection stopped
        cause: SelectError,
        /// Endpoints attempted so far
        attempted: Vec<Endpoint>,
    },
    /// A client's session was lost
    Disconnected {
        /// Lost session
        session: SessionId,
        /// Endpoint it was connected to
        endpoint: Endpoint,
    },
    /// A client was rebound to a replacement session
    Reconnected {
        /// Network that was re-resolved
        network: Network,
        /// Session that was lost
        previous: SessionId,
        /// Replacement session
        session: SessionId,
        /// Endpoint of the replacement
        endpoint: Endpoint,
    },
    /// A client could not be reconnected and is now unbound
    ReconnectFailed {
        /// Network that was re-resolved
        network: Network,
        /// Session that was lost
        previous: SessionId,
        /// Failure description
        reason: String,
    },
}
