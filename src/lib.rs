pub mod cli;
pub mod messages;
pub mod network;

// Re-export key types for easy testing
pub use messages::{FrameCodec, Framing, Message};
pub use network::{
    ConnectionError, ConnectionManager, ConnectionSettings, ConnectionState, ManagerConfig, Role,
};
