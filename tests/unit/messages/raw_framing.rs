//! Legacy unframed mode: each socket read is one message

use crate::common::mock_streams::{ChunkedReadStream, MockStream};
use lanchat::messages::wire::{FrameCodec, Framing, LEGACY_CHUNK_SIZE};
use lanchat::Message;

#[tokio::test]
async fn test_each_read_is_a_message() {
    let mut stream = ChunkedReadStream::new(b"helloworld".to_vec(), vec![5, 5]);
    let mut codec = FrameCodec::new(Framing::legacy());

    let first = codec.read_message(&mut stream).await.unwrap().unwrap();
    let second = codec.read_message(&mut stream).await.unwrap().unwrap();
    assert!(first.is_text("hello"));
    assert!(second.is_text("world"));
    assert!(codec.read_message(&mut stream).await.unwrap().is_none());
}

#[tokio::test]
async fn test_long_payload_split_at_chunk_size() {
    let text = "x".repeat(LEGACY_CHUNK_SIZE + 10);
    let mut stream = MockStream::with_data(text.clone().into_bytes());
    let mut codec = FrameCodec::new(Framing::legacy());

    let first = codec.read_message(&mut stream).await.unwrap().unwrap();
    let second = codec.read_message(&mut stream).await.unwrap().unwrap();
    assert_eq!(first.len(), LEGACY_CHUNK_SIZE);
    assert_eq!(second.len(), 10);
}

#[tokio::test]
async fn test_padded_buffer_is_trimmed() {
    let mut padded = b"Hi there".to_vec();
    padded.resize(LEGACY_CHUNK_SIZE, b'#');
    let mut stream = MockStream::with_data(padded);
    let mut codec = FrameCodec::new(Framing::legacy_padded());

    let message = codec.read_message(&mut stream).await.unwrap().unwrap();
    assert!(message.is_text("Hi there"));
}

#[tokio::test]
async fn test_raw_write_has_no_prefix() {
    let codec = FrameCodec::new(Framing::legacy());
    let mut stream = MockStream::new();

    codec
        .write_message(&mut stream, &Message::from("ACK"))
        .await
        .unwrap();
    assert_eq!(stream.get_written_data(), b"ACK");
}
