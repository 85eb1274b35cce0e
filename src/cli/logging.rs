use crate::cli::commands::LoggingArgs;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Which program is logging; selects the default log file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Client,
    Server,
}

impl Program {
    fn log_file_name(self) -> &'static str {
        match self {
            Program::Client => "lanchat-client.log",
            Program::Server => "lanchat-server.log",
        }
    }
}

impl LoggingArgs {
    /// Filter directive selected by the verbosity flags
    pub fn level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn log_path(&self, program: Program) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(program.log_file_name()))
    }
}

/// Initialize tracing into a log file so output never mixes with the
/// interactive prompt. `RUST_LOG` overrides the verbosity flags.
pub fn init_tracing(args: &LoggingArgs, program: Program) -> Result<PathBuf> {
    let path = args.log_path(program);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.level()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false),
        )
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(path)
}
