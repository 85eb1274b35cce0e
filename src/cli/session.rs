use crate::cli::display::{
    display_greeting, display_help, display_history, display_messages,
    display_new_messages_notice, display_servers, display_status,
};
use crate::cli::repl::{Command, History};
use crate::messages::control::{is_ack, is_reserved_text, PEER_GOODBYE};
use crate::network::{ConnectionError, ConnectionManager, ConnectionState};
use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, error, info, warn};

/// How long `SEND` waits for the server to acknowledge
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// How an interactive session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user quit or closed the input
    Quit,
    /// The connection could not be established or re-established
    ConnectionFailed,
}

impl SessionEnd {
    pub fn exit_code(self) -> i32 {
        match self {
            SessionEnd::Quit => 0,
            SessionEnd::ConnectionFailed => 1,
        }
    }
}

/// Interactive chat client driving one initiator connection
pub struct ClientSession<R, W> {
    manager: ConnectionManager,
    input: Lines<R>,
    out: W,
    history: History,
    send_timeout: Duration,
}

impl<R, W> ClientSession<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(manager: ConnectionManager, input: R, out: W) -> Self {
        Self {
            manager,
            input: input.lines(),
            out,
            history: History::new(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Connect, then read and execute commands until the user quits or the
    /// connection is gone for good
    pub async fn run(&mut self) -> Result<SessionEnd> {
        writeln!(self.out)?;
        writeln!(self.out, "Connecting to server...")?;
        self.manager
            .start()
            .context("Failed to start connection handler")?;

        if self.manager.wait_until_ready().await.is_err() {
            error!("Couldn't connect to server! Exiting...");
            writeln!(self.out, "Couldn't connect to server!")?;
            return self.finish(SessionEnd::ConnectionFailed).await;
        }

        info!("Connected to server");
        writeln!(self.out, "Connected!")?;
        display_greeting(&mut self.out)?;

        loop {
            if !self.manager.is_ready() {
                info!("Server has disconnected. Waiting for the connection to come back");
                writeln!(self.out)?;
                writeln!(self.out, "Lost connection to server. Reconnecting...")?;
                if self.manager.wait_until_ready().await.is_err() {
                    error!("Couldn't reconnect to server! Exiting...");
                    writeln!(self.out, "Couldn't reconnect to server!")?;
                    return self.finish(SessionEnd::ConnectionFailed).await;
                }
                // The reconnect was already announced here
                self.manager.just_reconnected();
                writeln!(self.out, "Reconnected!")?;
            }

            if self.manager.has_pending_data() {
                display_new_messages_notice(&mut self.out)?;
            }

            write!(self.out, ">>>")?;
            self.out.flush()?;

            let input = tokio::select! {
                line = self.input.next_line() => Some(line),
                _ = self.manager.wait_for_state(|s| s == ConnectionState::Exited) => None,
            };

            let Some(line) = input else {
                error!("Connection handler exited while waiting for input");
                writeln!(self.out)?;
                writeln!(self.out, "Couldn't reconnect to server!")?;
                return self.finish(SessionEnd::ConnectionFailed).await;
            };

            let Some(line) = line.context("Failed to read input")? else {
                info!("End of input");
                writeln!(self.out)?;
                break;
            };

            if self.manager.handler_has_exited() {
                error!("Couldn't reconnect to server! Exiting...");
                return self.finish(SessionEnd::ConnectionFailed).await;
            }
            if self.manager.just_reconnected() {
                // The server changed under the user; make them re-enter the command
                writeln!(self.out, "Reconnected to server. Please enter your command again.")?;
                continue;
            }

            match Command::parse(&line) {
                Command::Empty => continue,
                Command::Quit => {
                    info!("User requested an exit");
                    break;
                }
                command => {
                    self.history.record(&line);
                    self.execute(command).await?;
                }
            }
        }

        info!("Saying goodbye to server");
        self.manager.write(PEER_GOODBYE);
        writeln!(self.out, "Bye!")?;
        self.finish(SessionEnd::Quit).await
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        debug!("Executing {:?}", command);
        match command {
            Command::Help => display_help(&mut self.out)?,
            Command::History => display_history(&mut self.out, &self.history)?,
            Command::Status => display_status(
                &mut self.out,
                self.manager.state(),
                self.manager.peer_addr(),
                &self.manager.stats(),
            )?,
            Command::ListServers => {
                warn!("Listing connected servers is not implemented");
                display_servers(&mut self.out)?
            }
            Command::ListMessages => {
                display_messages(&mut self.out, &self.manager)?;
            }
            Command::Send(text) => self.send(text).await?,
            Command::Unknown(word) => {
                debug!("Unrecognised command {}", word);
                writeln!(
                    self.out,
                    "ERROR: Command not recognised. Type \"HELP\" for commands."
                )?;
            }
            Command::Empty | Command::Quit => {}
        }
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<()> {
        if text.is_empty() {
            writeln!(self.out, "Usage: SEND <message>")?;
            return Ok(());
        }
        if is_reserved_text(&text) {
            error!("Refusing to send control message {}", text);
            writeln!(self.out)?;
            writeln!(self.out, "You cannot send control messages.")?;
            writeln!(self.out)?;
            return Ok(());
        }

        info!("Sending a {} byte message", text.len());
        match self
            .manager
            .send_and_wait_timeout(text, self.send_timeout)
            .await
        {
            Ok(reply) if is_ack(&reply) => debug!("Server acknowledged the message"),
            Ok(reply) => {
                warn!("Expected an acknowledgment, got a message instead");
                writeln!(self.out)?;
                writeln!(self.out, "{}", reply)?;
            }
            Err(ConnectionError::AckTimeout { timeout }) => {
                writeln!(
                    self.out,
                    "The server did not acknowledge the message within {} seconds.",
                    timeout.as_secs()
                )?;
            }
            Err(e) => {
                warn!("Message was not acknowledged: {}", e);
                writeln!(self.out, "Message could not be confirmed: {}", e)?;
            }
        }
        Ok(())
    }

    async fn finish(&mut self, end: SessionEnd) -> Result<SessionEnd> {
        self.manager.request_exit();
        self.manager.wait_for_exit().await;
        info!("Connection handler has exited");
        writeln!(self.out, "Exiting...")?;
        self.out.flush()?;
        Ok(end)
    }
}
