//! Reserved application-level tokens.
//!
//! Acknowledgments and goodbyes are plain payloads on the wire; nothing
//! distinguishes them from chat text except their exact contents.

use super::Message;

/// Literal acknowledgment sent back for every received message
pub const ACK_TOKEN: &str = "ACK";

/// Single-byte acknowledgment used by older peers
pub const ACK_BYTE: u8 = 0x06;

/// Goodbye sent by a client that is leaving on purpose
pub const CLIENT_GOODBYE: &str = "CLIENTGOODBYE";

/// Goodbye sent by either side of a peer-to-peer session
pub const PEER_GOODBYE: &str = "PEERGOODBYE";

/// Default set of goodbye tokens recognised by the connection manager
pub const DEFAULT_GOODBYE_TOKENS: [&str; 2] = [CLIENT_GOODBYE, PEER_GOODBYE];

/// Classification of a received payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Ack,
    Goodbye,
    Data,
}

/// Returns true if the message is an acknowledgment in either form
pub fn is_ack(message: &Message) -> bool {
    message.is_text(ACK_TOKEN) || message.as_bytes() == [ACK_BYTE]
}

/// Returns true if the message matches any of the given goodbye tokens
pub fn is_goodbye<S: AsRef<str>>(message: &Message, tokens: &[S]) -> bool {
    tokens.iter().any(|token| message.is_text(token.as_ref()))
}

/// Classify a message against the acknowledgment and goodbye tokens
pub fn classify<S: AsRef<str>>(message: &Message, goodbye_tokens: &[S]) -> ControlKind {
    if is_goodbye(message, goodbye_tokens) {
        ControlKind::Goodbye
    } else if is_ack(message) {
        ControlKind::Ack
    } else {
        ControlKind::Data
    }
}

/// Returns true if the text would be interpreted as a control token by a peer
///
/// Chat input matching one of these must not be sent as a user message.
pub fn is_reserved_text(text: &str) -> bool {
    text == ACK_TOKEN
        || text.as_bytes() == [ACK_BYTE]
        || DEFAULT_GOODBYE_TOKENS.contains(&text)
}
