use crate::messages::Message;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, instrument, trace, warn};

// Wire protocol constants
pub const LENGTH_PREFIX_SIZE: usize = 4; // 4 bytes for u32 length prefix
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64KB, chat messages are small
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

// Legacy raw-chunk framing
pub const LEGACY_CHUNK_SIZE: usize = 128;
pub const LEGACY_PADDING: u8 = b'#';

// Socket read size for length-prefixed streams
const READ_CHUNK_SIZE: usize = 4096;

/// How messages are delimited on the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 4-byte big-endian length followed by the payload
    LengthPrefixed { max_message_size: usize },
    /// No framing: every socket read of at most `chunk_size` bytes is one
    /// message. Trailing `padding` bytes are stripped when set.
    Raw {
        chunk_size: usize,
        padding: Option<u8>,
    },
}

impl Default for Framing {
    fn default() -> Self {
        Framing::LengthPrefixed {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Framing {
    /// Raw framing with the historical 128-byte read buffer
    pub fn legacy() -> Self {
        Framing::Raw {
            chunk_size: LEGACY_CHUNK_SIZE,
            padding: None,
        }
    }

    /// Raw framing for peers that pad fixed-size buffers with `#`
    pub fn legacy_padded() -> Self {
        Framing::Raw {
            chunk_size: LEGACY_CHUNK_SIZE,
            padding: Some(LEGACY_PADDING),
        }
    }

    fn read_size(&self) -> usize {
        match self {
            Framing::LengthPrefixed { .. } => READ_CHUNK_SIZE,
            Framing::Raw { chunk_size, .. } => (*chunk_size).max(1),
        }
    }
}

/// Custom error types for wire protocol operations
#[derive(Error, Debug)]
pub enum WireProtocolError {
    #[error("Message too large: {size} bytes exceeds maximum of {max_size} bytes")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Invalid length prefix: {length}")]
    InvalidLength { length: u64 },

    #[error("Write operation timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },

    #[error("Connection closed with {buffered} bytes of an incomplete frame buffered")]
    UnexpectedEof { buffered: usize },

    #[error("Writer closed after {written} of {total} bytes")]
    WriterClosed { written: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoder and incremental decoder for one connection.
///
/// Decoding keeps partial frames in an internal buffer, so a
/// `read_message` future dropped by a timeout loses nothing: the only
/// suspension point is a single socket read whose bytes are stored
/// before any frame is parsed.
#[derive(Debug)]
pub struct FrameCodec {
    framing: Framing,
    buffer: Vec<u8>,
    ready: VecDeque<Message>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}

impl FrameCodec {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            ready: VecDeque::new(),
        }
    }

    /// Number of bytes held for a frame that has not completed yet
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Encode a message into its on-wire bytes
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, WireProtocolError> {
        match self.framing {
            Framing::LengthPrefixed { max_message_size } => {
                validate_message_size(message.len(), max_message_size)?;
                let length = u32::try_from(message.len()).map_err(|_| {
                    WireProtocolError::InvalidLength {
                        length: message.len() as u64,
                    }
                })?;

                let mut bytes = Vec::with_capacity(LENGTH_PREFIX_SIZE + message.len());
                bytes.extend_from_slice(&length.to_be_bytes());
                bytes.extend_from_slice(message.as_bytes());
                Ok(bytes)
            }
            Framing::Raw { chunk_size, .. } => {
                if message.len() > chunk_size {
                    warn!(
                        size = message.len(),
                        chunk_size, "Raw message exceeds the peer read size and may arrive split"
                    );
                }
                Ok(message.as_bytes().to_vec())
            }
        }
    }

    /// Feed bytes read from the socket into the decoder
    pub fn feed(&mut self, bytes: &[u8]) {
        match self.framing {
            Framing::LengthPrefixed { .. } => self.buffer.extend_from_slice(bytes),
            Framing::Raw { padding, .. } => {
                let end = match padding {
                    Some(pad) => bytes
                        .iter()
                        .rposition(|b| *b != pad)
                        .map_or(0, |last| last + 1),
                    None => bytes.len(),
                };
                if end == 0 {
                    trace!("Discarding chunk made only of padding");
                    return;
                }
                self.ready.push_back(Message::from(&bytes[..end]));
            }
        }
    }

    /// Take the next complete message out of the decoder, if any
    pub fn next_frame(&mut self) -> Result<Option<Message>, WireProtocolError> {
        if let Some(message) = self.ready.pop_front() {
            return Ok(Some(message));
        }

        let Framing::LengthPrefixed { max_message_size } = self.framing else {
            return Ok(None);
        };

        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let length = u32::from_be_bytes(prefix) as usize;
        validate_message_size(length, max_message_size)?;

        let frame_end = LENGTH_PREFIX_SIZE + length;
        if self.buffer.len() < frame_end {
            trace!(
                have = self.buffer.len(),
                need = frame_end,
                "Waiting for the rest of the frame"
            );
            return Ok(None);
        }

        let payload = self.buffer[LENGTH_PREFIX_SIZE..frame_end].to_vec();
        self.buffer.drain(..frame_end);
        debug!("Decoded {} byte frame", length);
        Ok(Some(Message::new(payload)))
    }

    /// Read until one whole message is available.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly between
    /// frames. Cancel-safe.
    #[instrument(level = "trace", skip(self, reader))]
    pub async fn read_message(
        &mut self,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<Option<Message>, WireProtocolError> {
        let mut chunk = vec![0u8; self.framing.read_size()];

        loop {
            if let Some(message) = self.next_frame()? {
                return Ok(Some(message));
            }

            let read = reader.read(&mut chunk).await?;
            if read == 0 {
                if self.buffer.is_empty() {
                    debug!("Peer closed the stream cleanly");
                    return Ok(None);
                }
                error!(
                    buffered = self.buffer.len(),
                    "Stream ended in the middle of a frame"
                );
                return Err(WireProtocolError::UnexpectedEof {
                    buffered: self.buffer.len(),
                });
            }

            trace!(read, "Read bytes from stream");
            self.feed(&chunk[..read]);
        }
    }

    /// Write one message and flush the writer
    #[instrument(level = "debug", skip(self, writer, message), fields(size = message.len()))]
    pub async fn write_message(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        message: &Message,
    ) -> Result<(), WireProtocolError> {
        let bytes = self.encode(message)?;
        write_all_with_recovery(writer, &bytes).await?;
        writer.flush().await?;
        debug!("Wrote {} bytes to stream", bytes.len());
        Ok(())
    }

    /// Write one message, giving up after `timeout`
    pub async fn write_message_with_timeout(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        message: &Message,
        timeout: Duration,
    ) -> Result<(), WireProtocolError> {
        match tokio::time::timeout(timeout, self.write_message(writer, message)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                error!(timeout = ?timeout, "Write operation timed out");
                Err(WireProtocolError::WriteTimeout { timeout })
            }
        }
    }
}

fn validate_message_size(size: usize, max_size: usize) -> Result<(), WireProtocolError> {
    if size > max_size {
        error!(size, max_size, "Message size exceeds maximum allowed size");
        return Err(WireProtocolError::MessageTooLarge { size, max_size });
    }
    Ok(())
}

/// Write the whole buffer, continuing across partial writes
async fn write_all_with_recovery(
    writer: &mut (impl AsyncWrite + Unpin),
    data: &[u8],
) -> Result<(), WireProtocolError> {
    let mut total_written = 0;

    while total_written < data.len() {
        let written = writer.write(&data[total_written..]).await?;
        if written == 0 {
            error!(
                total_written,
                remaining = data.len() - total_written,
                "Write returned 0 bytes, writer is closed"
            );
            return Err(WireProtocolError::WriterClosed {
                written: total_written,
                total: data.len(),
            });
        }
        total_written += written;
        if total_written < data.len() {
            trace!(written, total_written, "Partial write, continuing");
        }
    }

    Ok(())
}
