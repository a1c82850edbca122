//! Session establishment, disconnect observers and transparent failover.
//!
//! This crate turns a network name or an explicit address into a live
//! session and keeps a client bound to a working session for as long as the
//! network has endpoints left to try.
//!
//! ## Features
//!
//! - **Failover resolution**: random candidate selection with a per-establisher blacklist
//! - **Bounded attempts**: every connection attempt runs under a connect timeout
//! - **Disconnect observers**: sessions notify their observers exactly once when lost
//! - **Client rebinding**: the client's session is swapped in place on reconnection
//! - **Pluggable transport**: plain TCP by default, anything implementing [`Transport`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use connector_catalog::{EndpointCatalog, EndpointSelector};
//! use connector_session::{
//!     ChainConfig, ClientFactory, ConnectionEstablisher, EstablisherConfig, TcpTransport,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let selector = EndpointSelector::new(Arc::new(EndpointCatalog::builtin()));
//! let establisher = ConnectionEstablisher::new(
//!     selector,
//!     Arc::new(TcpTransport::new()),
//!     EstablisherConfig::default(),
//! );
//! let factory = ClientFactory::new(Arc::new(establisher));
//!
//! let client = factory.create_by_config(&ChainConfig::for_network("local")).await?;
//! println!("Connected to {:?}", client.endpoint().await);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod establisher;
pub mod events;
pub mod factory;
pub mod observer;
pub mod retry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use client::Client;
pub use error::{ConnectorError, TransportError};
pub use establisher::{
    BlacklistScope, ConnectionEstablisher, EstablisherConfig, DEFAULT_CONNECT_TIMEOUT,
};
pub use events::ConnectionEvent;
pub use factory::{ChainConfig, ClientFactory, DEFAULT_NETWORK};
pub use observer::{Observer, ReconnectObserver};
pub use retry::RetryDelay;
pub use session::{Session, SessionId, SessionState};
pub use transport::{connect_tcp, Link, LinkHandle, TcpTransport, Transport};
