pub mod ack;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod queue;

pub use config::{ConnectionSettings, ManagerConfig, QueuePolicy, RetryConfig};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStats};
pub use endpoint::{Endpoint, Role};
pub use error::{ConnectError, ConnectionError, DisconnectReason, ExitReason};
pub use queue::MessageQueue;
