//! Interactive client session tests
//!
//! Scripted input driving `ClientSession` against the acknowledging
//! server loop or a hand-rolled peer.

use crate::common::port_utils::get_unique_test_port;
use crate::common::test_helpers::{
    initiator_with, raw_accept, raw_listener, retrying_config, spawn_server, stop_server,
    TEST_TIMEOUT,
};
use lanchat::cli::{ClientSession, SessionEnd};
use lanchat::messages::{FrameCodec, Framing, PEER_GOODBYE};
use lanchat::Message;
use tokio::time::timeout;

async fn run_script(port: u16, script: &'static str) -> (SessionEnd, String) {
    let manager = initiator_with(port, retrying_config());
    let mut session = ClientSession::new(manager, script.as_bytes(), Vec::new());
    let end = timeout(TEST_TIMEOUT, session.run())
        .await
        .expect("session should finish")
        .expect("session should not fail");
    assert!(session.manager().handler_has_exited());
    let output = String::from_utf8(session.output().clone()).unwrap();
    (end, output)
}

#[tokio::test]
async fn test_scripted_session_against_server() {
    let port = get_unique_test_port();
    let (shutdown_tx, server) = spawn_server(port);

    let (end, output) = run_script(
        port,
        "SEND Hello there\nhistory\nSTATUS\nLSMSG\nQUIT\n",
    )
    .await;

    assert_eq!(end, SessionEnd::Quit);
    assert!(output.contains("Connecting to server..."));
    assert!(output.contains("Connected!"));
    assert!(output.contains("\tSEND Hello there\n"));
    assert!(output.contains("\thistory\n"));
    assert!(output.contains("\tConnection: ready"));
    assert!(output.contains("\tConnected To Server: Yes"));
    assert!(output.contains("\tMessages sent: 1"));
    // The acknowledgment was consumed by SEND
    assert!(output.contains("No messages."));
    assert!(output.contains("Bye!"));
    assert!(output.ends_with("Exiting...\n"));

    let (summary, server_output) = stop_server(shutdown_tx, server).await;
    assert_eq!(summary.messages, 1);
    assert_eq!(summary.acknowledged, 1);
    assert!(server_output.contains("Message from client: Hello there"));
}

#[tokio::test]
async fn test_control_tokens_refused() {
    let port = get_unique_test_port();
    let (shutdown_tx, server) = spawn_server(port);

    let (end, output) = run_script(port, "SEND ACK\nSEND PEERGOODBYE\nSEND\nQ\n").await;

    assert_eq!(end, SessionEnd::Quit);
    assert_eq!(output.matches("You cannot send control messages.").count(), 2);
    assert!(output.contains("Usage: SEND <message>"));

    let (summary, _) = stop_server(shutdown_tx, server).await;
    assert_eq!(summary.messages, 0);
}

#[tokio::test]
async fn test_unknown_command_and_end_of_input() {
    let port = get_unique_test_port();
    let (shutdown_tx, server) = spawn_server(port);

    // No QUIT: running out of input ends the session too
    let (end, output) = run_script(port, "DANCE\n\nhelp\n").await;

    assert_eq!(end, SessionEnd::Quit);
    assert!(output.contains("ERROR: Command not recognised. Type \"HELP\" for commands."));
    assert!(output.contains("Help (all commands are case-insensitive):"));
    assert!(output.contains("Bye!"));

    stop_server(shutdown_tx, server).await;
}

/// A reply that is not an acknowledgment is shown to the user
#[tokio::test]
async fn test_non_ack_reply_is_printed() {
    let port = get_unique_test_port();
    let listener = raw_listener(port).await;

    let peer = tokio::spawn(async move {
        let mut stream = raw_accept(&listener).await;
        let mut codec = FrameCodec::new(Framing::default());
        let request = codec.read_message(&mut stream).await.unwrap().unwrap();
        codec
            .write_message(&mut stream, &Message::from("not an ack"))
            .await
            .unwrap();
        let farewell = codec.read_message(&mut stream).await.unwrap().unwrap();
        (request, farewell)
    });

    let (end, output) = run_script(port, "SEND question\nQUIT\n").await;
    assert_eq!(end, SessionEnd::Quit);
    assert!(output.contains("\nnot an ack\n"));

    let (request, farewell) = timeout(TEST_TIMEOUT, peer).await.unwrap().unwrap();
    assert!(request.is_text("question"));
    assert!(farewell.is_text(PEER_GOODBYE));
}
