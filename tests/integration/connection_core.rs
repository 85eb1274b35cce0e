//! Core connection tests
//!
//! Two managers on loopback: establishment, message flow in both
//! directions, ordering, stop and join, and a quiet connection staying
//! ready.

use crate::common::port_utils::get_unique_test_port;
use crate::common::test_helpers::{
    connected_pair, connected_pair_with, next_message, preserving_config, retrying_config,
    shutdown, TEST_TIMEOUT,
};
use lanchat::network::{ConnectionState, Role};
use std::time::Duration;

/// Test that a message written by the initiator reaches the acceptor
#[tokio::test]
async fn test_hello_world_reaches_acceptor() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    assert_eq!(server.role(), Some(Role::Acceptor));
    assert_eq!(client.role(), Some(Role::Initiator));

    client.write("Hello, World!");
    let received = next_message(&server).await;
    assert!(
        received.is_text("Hello, World!"),
        "unexpected payload {:?}",
        received.to_text()
    );
    assert!(!server.has_pending_data());

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test that messages arrive in the order they were written
#[tokio::test]
async fn test_messages_delivered_in_order() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    for i in 0..50 {
        client.write(format!("message {}", i));
    }

    for i in 0..50 {
        let message = next_message(&server).await;
        assert_eq!(message.to_text(), format!("message {}", i));
    }

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test traffic in both directions at once
#[tokio::test]
async fn test_bidirectional_exchange() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    client.write("ping");
    server.write("pong");

    assert!(next_message(&server).await.is_text("ping"));
    assert!(next_message(&client).await.is_text("pong"));

    let client_stats = client.stats();
    assert_eq!(client_stats.messages_sent, 1);
    assert_eq!(client_stats.messages_received, 1);
    assert_eq!(client_stats.connections, 1);
    assert_eq!(client_stats.reconnects, 0);

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test that read peeks and pop removes
#[tokio::test]
async fn test_read_then_pop() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    client.write("first");
    client.write("second");

    let mut states = server.subscribe_state();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while server.pending_incoming() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both messages should arrive");

    assert!(server.read().unwrap().is_text("first"));
    assert!(server.read().unwrap().is_text("first"));
    assert!(server.pop().unwrap().is_text("first"));
    assert!(server.read().unwrap().is_text("second"));
    assert!(server.pop().is_some());
    assert!(server.pop().is_none());
    assert!(!states.has_changed().unwrap());

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test that an idle connection does not flap out of the ready state
#[tokio::test]
async fn test_idle_connection_stays_ready() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;

    let mut client_states = client.subscribe_state();
    let mut server_states = server.subscribe_state();
    client_states.borrow_and_update();
    server_states.borrow_and_update();

    // Many poll intervals with no traffic
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(!client_states.has_changed().unwrap());
    assert!(!server_states.has_changed().unwrap());
    assert!(client.is_ready());
    assert!(server.is_ready());
    assert!(!client.just_reconnected());

    shutdown(&mut client).await;
    shutdown(&mut server).await;
}

/// Test that stop plus join ends both handlers and releases the socket
#[tokio::test]
async fn test_stop_and_join() {
    let port = get_unique_test_port();
    let (mut server, mut client) = connected_pair(port).await;
    assert!(client.peer_addr().is_some());

    shutdown(&mut client).await;
    assert_eq!(client.state(), ConnectionState::Exited);
    assert!(client.peer_addr().is_none());

    // Joining twice is harmless
    client.wait_for_exit().await;

    shutdown(&mut server).await;
    assert_eq!(server.state(), ConnectionState::Exited);

    // Queue operations still work on a stopped manager
    client.write("late");
    assert!(client.pop().is_none());
}

/// Test that messages queued just before exit are flushed to the peer
#[tokio::test]
async fn test_pending_messages_flushed_on_exit() {
    let port = get_unique_test_port();
    // The server keeps what it read even after the client hangs up
    let (mut server, mut client) =
        connected_pair_with(port, preserving_config(), retrying_config()).await;

    client.write("last words");
    client.request_exit();
    client.wait_for_exit().await;

    let message = next_message(&server).await;
    assert!(message.is_text("last words"));

    shutdown(&mut server).await;
}
