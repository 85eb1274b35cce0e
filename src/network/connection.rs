use crate::messages::control::{classify, ControlKind};
use crate::messages::{FrameCodec, Message, WireProtocolError};
use crate::network::config::{ConnectionSettings, ManagerConfig, QueuePolicy};
use crate::network::endpoint::{Endpoint, Role};
use crate::network::error::{ConnectionError, DisconnectReason, ExitReason};
use crate::network::queue::MessageQueue;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Lifecycle of the connection owned by a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Ready,
    LostPendingReconnect,
    Exited,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::LostPendingReconnect => "reconnecting",
            ConnectionState::Exited => "exited",
        };
        write!(f, "{}", name)
    }
}

/// Traffic counters of one manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Connections established, the first one included
    pub connections: u64,
    pub reconnects: u64,
}

impl fmt::Display for ConnectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Messages sent: {}, Messages received: {}, Reconnects: {}",
            self.messages_sent, self.messages_received, self.reconnects
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    connections: AtomicU64,
    reconnects: AtomicU64,
}

/// Everything the caller and the handler task both touch.
/// The socket is deliberately absent: only the handler owns it.
#[derive(Debug)]
struct Shared {
    incoming: MessageQueue,
    outgoing: MessageQueue,
    state: watch::Sender<ConnectionState>,
    stop: watch::Sender<bool>,
    reconnected: AtomicBool,
    exit_reason: Mutex<Option<ExitReason>>,
    peer_addr: Mutex<Option<SocketAddr>>,
    counters: Counters,
}

impl Shared {
    fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (stop, _) = watch::channel(false);
        Self {
            incoming: MessageQueue::new(),
            outgoing: MessageQueue::new(),
            state,
            stop,
            reconnected: AtomicBool::new(false),
            exit_reason: Mutex::new(None),
            peer_addr: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    fn set_peer_addr(&self, addr: Option<SocketAddr>) {
        *self.peer_addr.lock().unwrap_or_else(|e| e.into_inner()) = addr;
    }

    fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Owns one TCP connection in a fixed role and keeps it alive.
///
/// A background handler task performs all socket I/O, moving messages
/// between the socket and two queues and reconnecting after a peer
/// disconnects. Callers interact only with the queues and status flags.
///
/// Teardown must go through [`request_exit`](Self::request_exit) followed
/// by [`wait_for_exit`](Self::wait_for_exit).
pub struct ConnectionManager {
    settings: ConnectionSettings,
    shared: Arc<Shared>,
    handler: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared::new()),
            handler: None,
        }
    }

    /// Manager that connects to `address:port`
    pub fn initiator(address: impl Into<String>, port: u16) -> Self {
        Self::new(ConnectionSettings::initiator(address, port))
    }

    /// Manager that waits for a peer on `port`
    pub fn acceptor(port: u16) -> Self {
        Self::new(ConnectionSettings::acceptor(port))
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn role(&self) -> Option<Role> {
        self.settings.role
    }

    /// Spawn the handler task and return immediately.
    ///
    /// Fails with `Configuration` when the settings are incomplete and with
    /// `NoRuntime` outside a tokio runtime. A manager starts at most once.
    pub fn start(&mut self) -> Result<(), ConnectionError> {
        if self.handler.is_some() || self.shared.state() != ConnectionState::Idle {
            return Err(ConnectionError::AlreadyStarted);
        }

        let endpoint = self.settings.endpoint()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;

        info!("Starting {} connection handler for {}", endpoint.role(), endpoint);
        self.shared.set_state(ConnectionState::Connecting);

        let handler = Handler {
            endpoint,
            config: self.settings.config.clone(),
            stop: self.shared.stop.subscribe(),
            shared: Arc::clone(&self.shared),
        };
        self.handler = Some(runtime.spawn(handler.run()));
        Ok(())
    }

    /// Queue a message for the handler to send. Never blocks.
    pub fn write(&self, message: impl Into<Message>) {
        let message = message.into();
        debug!("Queueing {} byte message for sending", message.len());
        self.shared.outgoing.push(message);
    }

    /// True when at least one received message is waiting
    pub fn has_pending_data(&self) -> bool {
        !self.shared.incoming.is_empty()
    }

    /// The oldest received message, left in the queue
    pub fn read(&self) -> Option<Message> {
        self.shared.incoming.front()
    }

    /// Remove the oldest received message. Does nothing when empty.
    pub fn pop(&self) -> Option<Message> {
        self.shared.incoming.pop()
    }

    /// Number of received messages not yet popped
    pub fn pending_incoming(&self) -> usize {
        self.shared.incoming.len()
    }

    /// Number of messages not yet written to the socket
    pub fn pending_outgoing(&self) -> usize {
        self.shared.outgoing.len()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state() == ConnectionState::Ready
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that observes every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// True once after each successful reconnect; reading clears it
    pub fn just_reconnected(&self) -> bool {
        self.shared.reconnected.swap(false, Ordering::AcqRel)
    }

    /// Address of the current peer while connected
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self
            .shared
            .peer_addr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> ConnectionStats {
        let counters = &self.shared.counters;
        ConnectionStats {
            messages_sent: counters.sent.load(Ordering::Relaxed),
            messages_received: counters.received.load(Ordering::Relaxed),
            connections: counters.connections.load(Ordering::Relaxed),
            reconnects: counters.reconnects.load(Ordering::Relaxed),
        }
    }

    /// Ask the handler to stop. Idempotent.
    pub fn request_exit(&self) {
        if !self.shared.stop.send_replace(true) {
            info!("Requesting connection handler exit");
        }
    }

    pub fn handler_has_exited(&self) -> bool {
        self.shared.state() == ConnectionState::Exited
    }

    /// Why the handler stopped, once it has
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.shared.exit_reason()
    }

    /// Wait for the handler task to finish.
    ///
    /// After this returns the socket is closed and no longer touched.
    pub async fn wait_for_exit(&mut self) {
        if let Some(handler) = self.handler.take() {
            if let Err(e) = handler.await {
                error!("Connection handler task failed: {}", e);
                self.shared.set_state(ConnectionState::Exited);
            }
        }
    }

    /// Resolves once the connection is ready, or errors if the handler
    /// exits first
    pub async fn wait_until_ready(&self) -> Result<(), ConnectionError> {
        self.ensure_started()?;
        let state = self
            .wait_for_state(|s| matches!(s, ConnectionState::Ready | ConnectionState::Exited))
            .await;
        match state {
            ConnectionState::Ready => Ok(()),
            _ => Err(self.exited_error()),
        }
    }

    /// Resolves with the oldest received message without removing it.
    ///
    /// Messages still queued after the handler exits are returned before
    /// the exit is reported.
    pub async fn wait_for_message(&self) -> Result<Message, ConnectionError> {
        self.ensure_started()?;
        tokio::select! {
            biased;
            message = self.shared.incoming.wait_front() => Ok(message),
            _ = self.wait_for_state(|s| s == ConnectionState::Exited) => {
                self.read().ok_or_else(|| self.exited_error())
            }
        }
    }

    pub(crate) fn incoming(&self) -> &MessageQueue {
        &self.shared.incoming
    }

    pub(crate) fn ensure_started(&self) -> Result<(), ConnectionError> {
        if self.shared.state() == ConnectionState::Idle {
            return Err(ConnectionError::NotStarted);
        }
        Ok(())
    }

    pub(crate) async fn wait_for_state(
        &self,
        predicate: impl Fn(ConnectionState) -> bool,
    ) -> ConnectionState {
        let mut receiver = self.shared.state.subscribe();
        let state = match receiver.wait_for(|s| predicate(*s)).await {
            Ok(state) => *state,
            Err(_) => self.shared.state(),
        };
        state
    }

    pub(crate) fn exited_error(&self) -> ConnectionError {
        ConnectionError::HandlerExited {
            reason: self.exit_reason().map(|r| r.to_string()),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            warn!("Connection manager dropped without wait_for_exit, aborting handler");
            self.shared.stop.send_replace(true);
            handler.abort();
        }
    }
}

/// Result of serving one established connection
enum Served {
    Stopped,
    Lost(DisconnectReason),
}

enum Wake {
    Stop,
    Outgoing,
    Read(Result<Result<Option<Message>, WireProtocolError>, tokio::time::error::Elapsed>),
}

/// The background task; sole owner of the socket
struct Handler {
    endpoint: Endpoint,
    config: ManagerConfig,
    shared: Arc<Shared>,
    stop: watch::Receiver<bool>,
}

async fn stop_signalled(stop: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which also means stop
    let _ = stop.wait_for(|requested| *requested).await;
}

impl Handler {
    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    #[instrument(name = "connection_handler", skip(self), fields(endpoint = %self.endpoint))]
    async fn run(mut self) {
        debug!("Connection handler running");
        let mut connected_once = false;
        let mut attempt: u32 = 0;
        let mut pause: Option<Duration> = None;

        let reason = loop {
            if self.stop_requested() {
                break ExitReason::Requested;
            }

            if let Some(delay) = pause.take() {
                trace!("Waiting {:?} before the next connection attempt", delay);
                tokio::select! {
                    _ = stop_signalled(&mut self.stop) => break ExitReason::Requested,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let established = tokio::select! {
                _ = stop_signalled(&mut self.stop) => break ExitReason::Requested,
                result = self.endpoint.establish(self.config.connect_timeout) => result,
            };

            let connection = match established {
                Ok(connection) => connection,
                Err(e) => {
                    if !connected_once && !self.config.retry_initial_connect {
                        error!("Error connecting: {}. Exiting", e);
                        break ExitReason::InitialConnectFailed(e.to_string());
                    }
                    attempt = attempt.saturating_add(1);
                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    warn!(
                        "Failed to establish connection (attempt {}): {}. Retrying in {:?}",
                        attempt, e, delay
                    );
                    pause = Some(delay);
                    continue;
                }
            };

            attempt = 0;
            if connected_once {
                self.shared.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                self.shared.reconnected.store(true, Ordering::Release);
                info!("Reconnected to peer {}", connection.peer_addr);
            }
            connected_once = true;
            self.shared.counters.connections.fetch_add(1, Ordering::Relaxed);
            self.shared.set_peer_addr(Some(connection.peer_addr));
            self.shared.set_state(ConnectionState::Ready);

            match self.serve(connection.stream).await {
                Served::Stopped => break ExitReason::Requested,
                Served::Lost(reason) => {
                    warn!("Lost connection to peer ({}). Attempting to reconnect", reason);
                    self.shared.set_state(ConnectionState::LostPendingReconnect);
                    self.reset_after_loss();
                    pause = Some(self.config.reconnect.delay_for_attempt(1));
                }
            }
        };

        self.shared.set_peer_addr(None);
        info!("Connection handler exiting: {}", reason);
        *self
            .shared
            .exit_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(reason);
        self.shared.set_state(ConnectionState::Exited);
    }

    /// Move messages between the socket and the queues until the
    /// connection is lost or stop is requested
    async fn serve(&mut self, stream: TcpStream) -> Served {
        let (mut reader, mut writer) = stream.into_split();
        let mut codec = FrameCodec::new(self.config.framing);
        let poll_interval = self.config.poll_interval;
        let write_timeout = self.config.write_timeout;

        let served = loop {
            if self.stop_requested() {
                // One last flush, bounded as a whole by the poll interval
                let flush = send_pending(&self.shared, &codec, &mut writer, write_timeout);
                match tokio::time::timeout(poll_interval, flush).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("Could not flush outgoing messages before exit: {}", e),
                    Err(_elapsed) => debug!(
                        "Exit flush incomplete, {} messages left unsent",
                        self.shared.outgoing.len()
                    ),
                }
                break Served::Stopped;
            }

            let sent = tokio::select! {
                biased;
                _ = stop_signalled(&mut self.stop) => None,
                result = send_pending(&self.shared, &codec, &mut writer, write_timeout) => Some(result),
            };
            match sent {
                Some(Ok(())) => {}
                Some(Err(e)) => break Served::Lost(e.into()),
                None => {
                    // A frame may be half written, so nothing more goes out
                    debug!("Stop requested while writing to a stalled peer");
                    break Served::Stopped;
                }
            }

            let wake = tokio::select! {
                biased;
                _ = stop_signalled(&mut self.stop) => Wake::Stop,
                _ = self.shared.outgoing.notified() => Wake::Outgoing,
                read = tokio::time::timeout(poll_interval, codec.read_message(&mut reader)) => Wake::Read(read),
            };

            match wake {
                Wake::Stop | Wake::Outgoing => continue,
                Wake::Read(Err(_elapsed)) => trace!("No data within poll interval"),
                Wake::Read(Ok(Ok(Some(message)))) => {
                    match classify(&message, &self.config.goodbye_tokens) {
                        ControlKind::Goodbye => {
                            info!("Peer said goodbye");
                            break Served::Lost(DisconnectReason::Goodbye);
                        }
                        ControlKind::Ack => trace!("Received acknowledgment"),
                        ControlKind::Data => debug!("Received {} byte message", message.len()),
                    }
                    self.shared.counters.received.fetch_add(1, Ordering::Relaxed);
                    self.shared.incoming.push(message);
                }
                Wake::Read(Ok(Ok(None))) => break Served::Lost(DisconnectReason::PeerClosedCleanly),
                Wake::Read(Ok(Err(e))) => {
                    error!("Error reading from socket: {}", e);
                    break Served::Lost(e.into());
                }
            }
        };

        if let Err(e) = writer.shutdown().await {
            trace!("Socket shutdown failed: {}", e);
        }
        served
    }

    fn reset_after_loss(&self) {
        self.shared.set_peer_addr(None);
        if self.config.queue_policy == QueuePolicy::Discard {
            let unread = self.shared.incoming.clear();
            let unsent = self.shared.outgoing.clear();
            if unread + unsent > 0 {
                warn!(
                    "Discarded {} unread and {} unsent messages on reconnect",
                    unread, unsent
                );
            }
        }
    }
}

/// Write queued messages in order, popping each only once written
async fn send_pending(
    shared: &Shared,
    codec: &FrameCodec,
    writer: &mut OwnedWriteHalf,
    write_timeout: Duration,
) -> Result<(), WireProtocolError> {
    while let Some(message) = shared.outgoing.front() {
        match codec
            .write_message_with_timeout(writer, &message, write_timeout)
            .await
        {
            Ok(()) => {
                shared.outgoing.pop();
                shared.counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!("Sent {} byte message", message.len());
            }
            Err(e @ WireProtocolError::MessageTooLarge { .. })
            | Err(e @ WireProtocolError::InvalidLength { .. }) => {
                // Nothing was written; the message can never be sent
                error!("Dropping unsendable message: {}", e);
                shared.outgoing.pop();
            }
            Err(e) => {
                error!("Error writing to socket: {}", e);
                return Err(e);
            }
        }
    }
    Ok(())
}
