//! Network and endpoint identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of a logical cluster of interchangeable endpoints
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(String);

impl Network {
    /// Create a network name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Network name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Network {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Network {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Errors from parsing a user supplied endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    /// No `:port` suffix
    #[error("endpoint {0:?} is missing a port (expected host:port)")]
    MissingPort(String),

    /// Empty host part
    #[error("endpoint {0:?} has an empty host")]
    EmptyHost(String),

    /// Port is not a valid u16
    #[error("endpoint {0:?} has an invalid port")]
    InvalidPort(String),
}

/// Address of a candidate node in `host:port` form
///
/// Endpoints are compared by their exact address string, which makes them
/// usable as blacklist keys.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wrap an address without validating it
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Parse and validate a `host:port` address
    pub fn parse(addr: &str) -> Result<Self, EndpointParseError> {
        let addr = addr.trim();
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(addr.to_string()))?;

        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(addr.to_string()));
        }
        if port.parse::<u16>().is_err() {
            return Err(EndpointParseError::InvalidPort(addr.to_string()));
        }

        Ok(Self(addr.to_string()))
    }

    /// Address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part of the address
    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map(|(host, _)| host).unwrap_or(&self.0)
    }

    /// Port part of the address, if present and numeric
    pub fn port(&self) -> Option<u16> {
        self.0.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for Endpoint {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}
