use crate::messages::WireProtocolError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a connection in either role
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to resolve {address}: {reason}")]
    Resolution { address: String, reason: String },

    #[error("Connection to {address} refused")]
    Refused { address: String },

    #[error("Connection to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("Failed to bind port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Transport error while establishing connection: {0}")]
    Transport(#[from] io::Error),
}

impl ConnectError {
    /// Map an I/O error from a connect attempt onto the taxonomy
    pub fn from_connect(address: &str, err: io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::Refused {
                address: address.to_string(),
            },
            io::ErrorKind::TimedOut => ConnectError::Timeout {
                address: address.to_string(),
                timeout,
            },
            _ => ConnectError::Transport(err),
        }
    }
}

/// Errors surfaced synchronously to the owner of a connection manager
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection handler already started")]
    AlreadyStarted,

    #[error("Connection handler has not been started")]
    NotStarted,

    #[error("No tokio runtime available to run the connection handler")]
    NoRuntime,

    #[error("Connection handler has exited{}", format_reason(.reason))]
    HandlerExited { reason: Option<String> },

    #[error("No acknowledgment received within {timeout:?}")]
    AckTimeout { timeout: Duration },
}

fn format_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

/// Why a ready connection was dropped
#[derive(Debug, Error)]
pub enum DisconnectReason {
    #[error("peer closed the connection")]
    PeerClosedCleanly,

    #[error("peer said goodbye")]
    Goodbye,

    #[error("transport error: {0}")]
    Transport(#[from] WireProtocolError),
}

/// Why the connection handler stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// `request_exit()` was called
    Requested,
    /// The first connection could not be established
    InitialConnectFailed(String),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Requested => write!(f, "exit requested"),
            ExitReason::InitialConnectFailed(reason) => {
                write!(f, "initial connection failed: {}", reason)
            }
        }
    }
}
