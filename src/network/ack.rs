//! Request/response on top of the connection queues.
//!
//! Correlation is positional only: the reply is whatever message arrives
//! next, so a peer that interleaves unrelated traffic can satisfy a wait
//! with the wrong message.

use crate::messages::control::ACK_TOKEN;
use crate::messages::Message;
use crate::network::connection::{ConnectionManager, ConnectionState};
use crate::network::error::ConnectionError;
use std::time::Duration;
use tracing::{debug, warn};

impl ConnectionManager {
    /// Queue `message` and wait for the next received message, which is
    /// removed from the incoming queue and returned.
    ///
    /// Waits indefinitely while the handler is reconnecting. Errors if the
    /// handler exits before a reply arrives.
    pub async fn send_and_wait(
        &self,
        message: impl Into<Message>,
    ) -> Result<Message, ConnectionError> {
        self.ensure_started()?;
        self.write(message);
        debug!("Waiting for a reply");

        tokio::select! {
            biased;
            reply = self.incoming().wait_pop() => {
                debug!("Received reply of {} bytes", reply.len());
                Ok(reply)
            }
            _ = self.wait_for_state(|s| s == ConnectionState::Exited) => {
                match self.incoming().pop() {
                    Some(reply) => Ok(reply),
                    None => Err(self.exited_error()),
                }
            }
        }
    }

    /// [`send_and_wait`](Self::send_and_wait) with an upper bound on the wait
    pub async fn send_and_wait_timeout(
        &self,
        message: impl Into<Message>,
        timeout: Duration,
    ) -> Result<Message, ConnectionError> {
        match tokio::time::timeout(timeout, self.send_and_wait(message)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!("No reply within {:?}", timeout);
                Err(ConnectionError::AckTimeout { timeout })
            }
        }
    }

    /// Queue the literal acknowledgment token
    pub fn acknowledge(&self) {
        self.write(ACK_TOKEN);
    }
}
