pub mod control;
pub mod types;
pub mod wire;

pub use control::{ControlKind, ACK_TOKEN, CLIENT_GOODBYE, PEER_GOODBYE};
pub use types::Message;
pub use wire::{
    FrameCodec, Framing, WireProtocolError, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_WRITE_TIMEOUT,
    LEGACY_CHUNK_SIZE, LENGTH_PREFIX_SIZE,
};
