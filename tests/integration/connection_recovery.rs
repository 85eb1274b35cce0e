//! Connection Recovery Tests
//!
//! - Reconnection after a goodbye token, without building a new manager
//! - Reconnection after the peer drops the socket
//! - Queue handling across a reconnect under both policies
//! - Goodbye tokens are never delivered to the caller

use crate::common::port_utils::get_unique_test_port;
use crate::common::test_helpers::{
    connected_pair, fast_config, initiator, initiator_with, next_message, preserving_config,
    raw_accept, raw_listener, retrying_config, shutdown, wait_for_state, wait_ready,
};
use lanchat::messages::{FrameCodec, Framing, CLIENT_GOODBYE, PEER_GOODBYE};
use lanchat::network::ConnectionState;
use lanchat::Message;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn send_frame(stream: &mut TcpStream, text: &str) {
    let codec = FrameCodec::new(Framing::default());
    codec
        .write_message(stream, &Message::from(text))
        .await
        .expect("raw peer write should succeed");
}

/// Test that a goodbye from the client moves both sides through a
/// reconnect and traffic resumes on the same managers
#[tokio::test]
async fn test_reconnect_after_goodbye() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    client.write(PEER_GOODBYE);

    wait_for_state(&server, ConnectionState::LostPendingReconnect).await;
    wait_ready(&server).await;
    wait_ready(&client).await;

    // The goodbye itself is never queued
    assert!(!server.has_pending_data());
    assert_eq!(server.stats().reconnects, 1);
    assert_eq!(server.stats().connections, 2);
    assert!(server.just_reconnected());
    assert!(!server.just_reconnected(), "flag clears once read");

    client.write("back again");
    assert!(next_message(&server).await.is_text("back again"));

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test that a peer closing its socket triggers a reconnect to the same address
#[tokio::test]
async fn test_reconnect_after_peer_disconnect() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let mut manager = initiator(port);
    manager.start().unwrap();
    let first_peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    drop(first_peer);
    let mut second_peer = raw_accept(&listener).await;
    wait_ready(&manager).await;
    assert!(manager.just_reconnected());
    assert_eq!(manager.stats().reconnects, 1);

    send_frame(&mut second_peer, "hello again").await;
    assert!(next_message(&manager).await.is_text("hello again"));

    shutdown(&mut manager).await;
}

/// Test that unread messages are discarded on reconnect by default
#[tokio::test]
async fn test_default_policy_discards_queues() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let mut manager = initiator(port);
    manager.start().unwrap();
    let mut peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    send_frame(&mut peer, "unread").await;
    manager.wait_for_message().await.unwrap();
    peer.shutdown().await.unwrap();
    drop(peer);

    let _peer = raw_accept(&listener).await;
    wait_ready(&manager).await;
    assert!(!manager.has_pending_data());

    shutdown(&mut manager).await;
}

/// Test that unread messages survive a reconnect when preservation is on
#[tokio::test]
async fn test_preserve_policy_keeps_unread_messages() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let mut manager = initiator_with(port, preserving_config());
    manager.start().unwrap();
    let mut peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    send_frame(&mut peer, "keep me").await;
    manager.wait_for_message().await.unwrap();
    drop(peer);

    let _peer = raw_accept(&listener).await;
    wait_ready(&manager).await;
    assert!(manager.just_reconnected());
    assert!(manager.pop().unwrap().is_text("keep me"));

    shutdown(&mut manager).await;
}

/// Test that a client goodbye from a raw peer is consumed, not delivered
#[tokio::test]
async fn test_goodbye_token_not_delivered() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let mut manager = initiator(port);
    manager.start().unwrap();
    let mut peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    send_frame(&mut peer, CLIENT_GOODBYE).await;
    wait_for_state(&manager, ConnectionState::LostPendingReconnect).await;
    assert!(!manager.has_pending_data());
    assert!(!manager.is_ready());

    let _peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    shutdown(&mut manager).await;
}

/// Test that an acceptor whose client vanished waits for the next one
#[tokio::test]
async fn test_acceptor_serves_successive_clients() {
    let port = get_unique_test_port();
    let (mut server, mut first) = connected_pair(port).await;

    shutdown(&mut first).await;
    wait_for_state(&server, ConnectionState::LostPendingReconnect).await;

    let mut second = initiator_with(port, retrying_config());
    second.start().unwrap();
    wait_ready(&second).await;
    wait_ready(&server).await;

    second.write("second client");
    assert!(next_message(&server).await.is_text("second client"));

    shutdown(&mut second).await;
    shutdown(&mut server).await;
}

/// Test that a lost connection keeps retrying with back-off until the
/// peer returns
#[tokio::test]
async fn test_retries_until_peer_returns() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let mut manager = initiator_with(port, fast_config());
    manager.start().unwrap();
    let peer = raw_accept(&listener).await;
    wait_ready(&manager).await;

    // Nobody is listening for a while
    drop(peer);
    drop(listener);
    wait_for_state(&manager, ConnectionState::LostPendingReconnect).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(manager.state(), ConnectionState::LostPendingReconnect);

    let listener = raw_listener(port).await;
    let _peer = raw_accept(&listener).await;
    wait_ready(&manager).await;
    assert!(!manager.handler_has_exited());

    shutdown(&mut manager).await;
}
