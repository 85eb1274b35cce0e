use crate::messages::control::is_ack;
use crate::network::{ConnectionManager, ConnectionState};
use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::io::Write;
use tracing::{debug, error, info};

/// Totals reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub messages: u64,
    pub acknowledged: u64,
    pub clients: u64,
}

/// Print every message from the connected client and acknowledge each one
/// that is not itself an acknowledgment.
///
/// Runs until `shutdown` resolves. Clients may leave and new ones connect
/// in between; the manager handles that. Fails only if the handler exits
/// on its own, e.g. because the port cannot be bound.
pub async fn serve_until<W: Write>(
    manager: &mut ConnectionManager,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<ServeSummary> {
    manager
        .start()
        .context("Failed to start connection handler")?;
    let mut states = manager.subscribe_state();
    let mut summary = ServeSummary::default();
    tokio::pin!(shutdown);

    writeln!(out, "Waiting for a client...")?;

    let outcome = loop {
        enum Event {
            Shutdown,
            State,
            Message(bool),
        }

        let event = tokio::select! {
            biased;
            _ = &mut shutdown => Event::Shutdown,
            _ = states.changed() => Event::State,
            message = manager.wait_for_message() => Event::Message(message.is_ok()),
        };

        match event {
            Event::Shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
            Event::State => {
                let state = current_state(&mut states);
                // A client that came and went between wake-ups still counts
                let connections = manager.stats().connections;
                if connections > summary.clients {
                    summary.clients = connections;
                    match manager.peer_addr() {
                        Some(addr) => writeln!(out, "Client connected from {}.", addr)?,
                        None => writeln!(out, "Client connected.")?,
                    }
                }

                match state {
                    ConnectionState::LostPendingReconnect => {
                        writeln!(out, "Client gone. Waiting for a new client...")?;
                    }
                    ConnectionState::Exited => {
                        let reason = manager
                            .exit_reason()
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "unknown reason".to_string());
                        error!("Connection handler exited: {}", reason);
                        break Err(anyhow!("Connection handler exited: {}", reason));
                    }
                    ConnectionState::Idle
                    | ConnectionState::Connecting
                    | ConnectionState::Ready => {}
                }
            }
            Event::Message(false) => {
                break Err(anyhow!("Connection handler exited"));
            }
            Event::Message(true) => {
                while let Some(message) = manager.pop() {
                    summary.messages += 1;
                    writeln!(out, "Message from client: {}", message)?;
                    if is_ack(&message) {
                        debug!("Not acknowledging an acknowledgment");
                        continue;
                    }
                    manager.acknowledge();
                    summary.acknowledged += 1;
                }
            }
        }
    };

    manager.request_exit();
    manager.wait_for_exit().await;
    summary.clients = manager.stats().connections;
    writeln!(out, "Exiting...")?;
    info!(
        "Server stopped after {} messages from {} clients",
        summary.messages, summary.clients
    );

    outcome.map(|()| summary)
}

fn current_state(states: &mut tokio::sync::watch::Receiver<ConnectionState>) -> ConnectionState {
    *states.borrow_and_update()
}
