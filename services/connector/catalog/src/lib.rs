//! Network catalog and endpoint selection for chain connections.
//!
//! This crate holds the static mapping from a logical network name to the
//! set of interchangeable node endpoints serving it, and the selector that
//! picks a random candidate while skipping blacklisted addresses.
//!
//! ## Example
//!
//! ```rust
//! use connector_catalog::{Endpoint, EndpointCatalog, EndpointSelector, Network};
//! use std::sync::Arc;
//!
//! let selector = EndpointSelector::new(Arc::new(EndpointCatalog::builtin()));
//! let local = Network::from("local");
//!
//! let endpoint = selector.select(&local, &[]).unwrap();
//! assert_eq!(endpoint, Endpoint::from("127.0.0.1:9944"));
//!
//! // Once the only candidate is blacklisted the network is exhausted
//! assert!(selector.select(&local, &[endpoint]).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod endpoint;
pub mod selector;

pub use catalog::EndpointCatalog;
pub use endpoint::{Endpoint, EndpointParseError, Network};
pub use selector::{EndpointSelector, SelectError};
