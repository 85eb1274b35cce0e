pub mod app;
pub mod commands;
pub mod display;
pub mod logging;
pub mod repl;
pub mod server;
pub mod session;

pub use app::{Config, ConfigError, FramingKind};
pub use commands::{Cli, Commands, LoggingArgs};
pub use logging::{init_tracing, Program};
pub use repl::{Command, History, HISTORY_LIMIT};
pub use server::{serve_until, ServeSummary};
pub use session::{ClientSession, SessionEnd, DEFAULT_SEND_TIMEOUT};
