use anyhow::{Context, Result};
use clap::Parser;
use lanchat::cli::{
    init_tracing, serve_until, ClientSession, Cli, Commands, Config, Program, SessionEnd,
};
use lanchat::ConnectionManager;
use tracing::{error, info, warn};

/// Load the configuration selected on the command line, or the default one
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_create_default().context("Failed to initialize configuration")?,
    };
    Ok(config)
}

async fn run_client(config: &Config, address: Option<String>, port: Option<u16>) -> Result<SessionEnd> {
    let settings = config.client_settings(address, port);
    info!(
        "Starting client for {}:{}",
        settings.address.as_deref().unwrap_or_default(),
        settings.port.unwrap_or_default()
    );

    let manager = ConnectionManager::new(settings);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut session = ClientSession::new(manager, input, std::io::stdout());
    session.run().await
}

async fn run_server(config: &Config, port: Option<u16>) -> Result<()> {
    let settings = config.server_settings(port);
    println!(
        "lanchat server starting on port {}...",
        settings.port.unwrap_or_default()
    );

    let mut manager = ConnectionManager::new(settings);
    let mut stdout = std::io::stdout();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler the server can only be stopped externally
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let summary = serve_until(&mut manager, &mut stdout, shutdown).await?;
    info!(
        "Served {} messages ({} acknowledged)",
        summary.messages, summary.acknowledged
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let program = match cli.command {
        Commands::Connect { .. } => Program::Client,
        Commands::Serve { .. } => Program::Server,
    };
    let log_path = init_tracing(&cli.logging, program)?;
    info!("lanchat {} starting", env!("CARGO_PKG_VERSION"));
    info!("Logging to {}", log_path.display());

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Connect { address, port } => {
            let end = run_client(&config, address, port).await?;
            if end != SessionEnd::Quit {
                error!("Client exiting after losing the server");
                std::process::exit(end.exit_code());
            }
        }
        Commands::Serve { port } => {
            if let Err(e) = run_server(&config, port).await {
                error!("Server failed: {:#}", e);
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
