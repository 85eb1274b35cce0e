use crate::cli::repl::{History, HISTORY_LIMIT};
use crate::network::{ConnectionManager, ConnectionState, ConnectionStats};
use std::io::{self, Write};

pub fn display_greeting(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Welcome to lanchat, the local network chat client!")?;
    writeln!(out, "For help, type \"HELP\"")?;
    writeln!(out, "To quit, type \"QUIT\", \"Q\", \"EXIT\", or press CTRL-D")?;
    writeln!(out)
}

pub fn display_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Help (all commands are case-insensitive):")?;
    writeln!(out)?;
    writeln!(out, "        HELP:                     Shows this help text.")?;
    writeln!(
        out,
        "        HISTORY:                  Shows command history (up to {} commands).",
        HISTORY_LIMIT
    )?;
    writeln!(out, "        STATUS:                   Shows connection status and statistics.")?;
    writeln!(out, "        LISTSERV:                 Lists all connected servers.")?;
    writeln!(out, "        LSMSG or LISTMSG:         Lists all messages, and clears them.")?;
    writeln!(out, "        SEND <message>:           Sends a message to the server.")?;
    writeln!(out, "        Q, QUIT, EXIT:            Exits the program.")?;
    writeln!(out)
}

pub fn display_history(out: &mut impl Write, history: &History) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "History:")?;
    writeln!(out)?;
    for entry in history.entries() {
        writeln!(out, "\t{}", entry)?;
    }
    writeln!(out)
}

/// Live connection state plus traffic counters
pub fn display_status(
    out: &mut impl Write,
    state: ConnectionState,
    peer: Option<std::net::SocketAddr>,
    stats: &ConnectionStats,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Status:")?;
    writeln!(out)?;
    writeln!(out, "\tConnection: {}", state)?;
    match peer {
        Some(addr) => writeln!(out, "\tConnected To Server: Yes ({})", addr)?,
        None => writeln!(out, "\tConnected To Server: No")?,
    }
    writeln!(out, "\tMessages sent: {}", stats.messages_sent)?;
    writeln!(out, "\tMessages received: {}", stats.messages_received)?;
    writeln!(out, "\tReconnects: {}", stats.reconnects)?;
    display_servers(out)
}

pub fn display_servers(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Other Connected Servers:")?;
    writeln!(out)?;
    writeln!(out, "\tNot yet implemented!")?;
    writeln!(out)
}

/// Print every queued message, removing each as it is shown
pub fn display_messages(out: &mut impl Write, manager: &ConnectionManager) -> io::Result<usize> {
    if !manager.has_pending_data() {
        writeln!(out, "No messages.")?;
        return Ok(0);
    }

    let mut shown = 0;
    while let Some(message) = manager.pop() {
        writeln!(out)?;
        writeln!(out, "{}", message)?;
        shown += 1;
    }
    writeln!(out, "End of messages.")?;
    writeln!(out)?;
    Ok(shown)
}

pub fn display_new_messages_notice(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "You have new messages.")?;
    writeln!(out)
}
