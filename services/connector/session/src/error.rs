//! Connector error types.

use connector_catalog::{Endpoint, EndpointParseError, Network, SelectError};
use std::time::Duration;
use thiserror::Error;

/// Failures of a single connection attempt
#[derive(Error, Debug)]
pub enum TransportError {
    /// No session within the connect timeout
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote side refused the session
    #[error("connection refused: {0}")]
    Refused(String),
}

/// Errors surfaced to callers of the connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Network resolution ended without a live session
    #[error(
        "resolution failed for network {network}: {cause} (attempted: [{}])",
        join_endpoints(.attempted)
    )]
    ResolutionFailed {
        /// Network being resolved
        network: Network,
        /// Why selection stopped
        cause: SelectError,
        /// Endpoints already attempted through this establisher
        attempted: Vec<Endpoint>,
    },

    /// The single explicit endpoint could not be connected
    #[error("failed to connect to chain endpoint {endpoint}: {reason}")]
    ConnectFailed {
        /// Endpoint that was attempted
        endpoint: Endpoint,
        /// Underlying transport failure
        #[source]
        reason: TransportError,
    },

    /// Neither an endpoint nor a network was configured
    #[error("invalid chain config: {0}")]
    InvalidConfig(String),

    /// Configured endpoint is not a valid `host:port`
    #[error("invalid chain endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointParseError),

    /// Client has no usable session
    #[error("client is not connected")]
    NotConnected,
}

impl ConnectorError {
    /// Endpoints attempted before this error was raised
    pub fn attempted(&self) -> Vec<Endpoint> {
        match self {
            ConnectorError::ResolutionFailed { attempted, .. } => attempted.clone(),
            ConnectorError::ConnectFailed { endpoint, .. } => vec![endpoint.clone()],
            _ => Vec::new(),
        }
    }

    /// Whether every endpoint of the network has been tried
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            ConnectorError::ResolutionFailed {
                cause: SelectError::Exhausted(_),
                ..
            }
        )
    }
}

fn join_endpoints(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(Endpoint::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
