use crate::network::error::ConnectError;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};

/// Which side of the connection a manager plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Resolves a remote address and connects to it
    Initiator,
    /// Binds a local port and waits for one peer
    Acceptor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Acceptor => write!(f, "acceptor"),
        }
    }
}

/// A fully specified place to establish a connection from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Initiator { address: String, port: u16 },
    Acceptor { bind_address: String, port: u16 },
}

impl Endpoint {
    pub fn role(&self) -> Role {
        match self {
            Endpoint::Initiator { .. } => Role::Initiator,
            Endpoint::Acceptor { .. } => Role::Acceptor,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Initiator { port, .. } | Endpoint::Acceptor { port, .. } => *port,
        }
    }

    /// Establish one connection in this endpoint's role
    pub async fn establish(&self, connect_timeout: Duration) -> Result<Connection, ConnectError> {
        match self {
            Endpoint::Initiator { address, port } => {
                establish_initiator(address, *port, connect_timeout).await
            }
            Endpoint::Acceptor { bind_address, port } => {
                establish_acceptor(bind_address, *port).await
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Initiator { address, port } => write!(f, "{}:{}", address, port),
            Endpoint::Acceptor { bind_address, port } => {
                write!(f, "listening on {}:{}", bind_address, port)
            }
        }
    }
}

/// A live TCP connection plus the address of the far end
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
}

/// Resolve `address` and connect to the first endpoint that accepts.
///
/// Every resolved candidate is tried in order; the error of the last
/// attempt is returned when none succeed.
#[instrument(level = "debug", skip(connect_timeout))]
pub async fn establish_initiator(
    address: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<Connection, ConnectError> {
    let target = format!("{}:{}", address, port);
    debug!("Resolving {}", target);

    let candidates: Vec<SocketAddr> = lookup_host((address, port))
        .await
        .map_err(|e| ConnectError::Resolution {
            address: target.clone(),
            reason: e.to_string(),
        })?
        .collect();

    if candidates.is_empty() {
        return Err(ConnectError::Resolution {
            address: target,
            reason: "no addresses found".to_string(),
        });
    }

    let mut last_error = None;
    for candidate in candidates {
        debug!("Attempting to connect to {}", candidate);
        match tokio::time::timeout(connect_timeout, TcpStream::connect(candidate)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to disable Nagle on connection to {}: {}", candidate, e);
                }
                info!("Connected to {}", candidate);
                return Ok(Connection {
                    stream,
                    peer_addr: candidate,
                });
            }
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", candidate, e);
                last_error = Some(ConnectError::from_connect(&target, e, connect_timeout));
            }
            Err(_elapsed) => {
                debug!("Connection to {} timed out", candidate);
                last_error = Some(ConnectError::Timeout {
                    address: target.clone(),
                    timeout: connect_timeout,
                });
            }
        }
    }

    Err(last_error.unwrap_or(ConnectError::Resolution {
        address: target,
        reason: "no addresses found".to_string(),
    }))
}

/// Bind `port` and wait for exactly one peer.
///
/// The listener is dropped as soon as a peer connects, so a later call
/// binds afresh.
#[instrument(level = "debug")]
pub async fn establish_acceptor(bind_address: &str, port: u16) -> Result<Connection, ConnectError> {
    let listener = TcpListener::bind((bind_address, port))
        .await
        .map_err(|source| ConnectError::BindFailed { port, source })?;

    info!("Waiting for a peer on {}:{}", bind_address, port);
    let (stream, peer_addr) = listener.accept().await?;
    drop(listener);

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to disable Nagle on connection from {}: {}", peer_addr, e);
    }
    info!("Accepted connection from {}", peer_addr);
    Ok(Connection { stream, peer_addr })
}
