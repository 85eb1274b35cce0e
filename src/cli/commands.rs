use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lanchat")]
#[command(about = "Chat with a peer over a resilient LAN TCP connection")]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to a server and start an interactive chat session
    ///
    /// Commands inside the session: HELP, HISTORY, STATUS, LISTSERV,
    /// LSMSG, SEND <message>, QUIT.
    ///
    /// Examples:
    ///   lanchat connect
    ///   lanchat connect --address 192.168.1.20 --port 50000
    Connect {
        /// Server address (defaults to the configured address)
        #[arg(short, long)]
        address: Option<String>,
        /// Server port (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Wait for clients and acknowledge every message they send
    ///
    /// Runs until interrupted with Ctrl-C.
    ///
    /// Example: lanchat serve --port 50000
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Verbosity and log destination flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct LoggingArgs {
    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Log lifecycle events (default)
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub verbose: bool,

    /// Log every message and state change
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs here instead of the default file in the temp directory
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}
