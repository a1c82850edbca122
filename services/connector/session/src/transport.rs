//! Transport seam for opening sessions to chain endpoints.
//!
//! The connector only needs two things from a transport: open a connection
//! to an address, and learn when that connection goes away. A [`Link`] is the
//! connector's half of that contract; the transport keeps the matching
//! [`LinkHandle`] inside whatever task drives the connection.

use async_trait::async_trait;
use connector_catalog::Endpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::TransportError;

/// Capability to open a connection to an endpoint
///
/// Implementations do not need to enforce the connect timeout themselves;
/// the establisher bounds every call.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Open a connection to `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError>;
}

/// Connector side of an open connection
#[derive(Debug)]
pub struct Link {
    /// Resolves with a reason once the remote side goes away
    closed: oneshot::Receiver<String>,
    /// Dropping this tells the transport to close the connection
    close: oneshot::Sender<()>,
}

/// Transport side of an open connection
#[derive(Debug)]
pub struct LinkHandle {
    closed: oneshot::Sender<String>,
    close: oneshot::Receiver<()>,
}

impl Link {
    /// Create a connected link / handle pair
    pub fn pair() -> (Link, LinkHandle) {
        let (closed_tx, closed_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();
        (
            Link {
                closed: closed_rx,
                close: close_tx,
            },
            LinkHandle {
                closed: closed_tx,
                close: close_rx,
            },
        )
    }

    /// Split into the disconnect signal and the close guard
    pub fn into_parts(self) -> (oneshot::Receiver<String>, oneshot::Sender<()>) {
        (self.closed, self.close)
    }
}

impl LinkHandle {
    /// Report that the remote side went away
    pub fn disconnect(self, reason: impl Into<String>) {
        // The owner may already be gone, in which case nobody is listening
        let _ = self.closed.send(reason.into());
    }

    /// Wait until the owner of the link closes it
    pub async fn closed_by_owner(&mut self) {
        let _ = (&mut self.close).await;
    }

    /// Whether the owner has already closed the link
    pub fn is_closed_by_owner(&mut self) -> bool {
        !matches!(self.close.try_recv(), Err(oneshot::error::TryRecvError::Empty))
    }
}

/// Plain TCP transport
///
/// A background task owns the socket and reads until the remote closes it,
/// which is reported as a disconnect. Payload bytes are discarded; protocol
/// handling lives above this layer.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create a TCP transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        let stream = connect_tcp(endpoint).await?;
        debug!("TCP connection established to {}", endpoint);

        let (link, handle) = Link::pair();
        tokio::spawn(drive_tcp(endpoint.clone(), stream, handle));
        Ok(link)
    }
}

/// Connect to a `host:port` address, resolving host names
pub async fn connect_tcp(endpoint: &Endpoint) -> tokio::io::Result<TcpStream> {
    TcpStream::connect(endpoint.as_str()).await
}

async fn drive_tcp(endpoint: Endpoint, mut stream: TcpStream, mut handle: LinkHandle) {
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            _ = handle.closed_by_owner() => {
                debug!("Closing TCP connection to {}", endpoint);
                let _ = stream.shutdown().await;
                return;
            }

            read = stream.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        handle.disconnect("remote closed the connection");
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        handle.disconnect(format!("read error: {}", e));
                        return;
                    }
                }
            }
        }
    }
}
