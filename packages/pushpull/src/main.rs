use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use pushpull::cli;
use pushpull::config::{self, ClientConfig, ReplyMode, ServerConfig};
use pushpull::server::{self, AppState};
use pushpull::ws;

#[derive(Parser)]
#[command(name = "pushpull")]
#[command(about = "Share one piece of state over long-poll, event stream and websocket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config_dir>/pushpull/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL for the client commands
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in the foreground
    Server(ServerArgs),

    /// Replace the shared state
    Publish(PublishArgs),

    /// Long-poll and print every update
    Poll,

    /// Print server-sent events
    Stream,

    /// Interactive request/reply session
    Duplex,
}

#[derive(Parser)]
struct ServerArgs {
    /// Port for the web server (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Where duplex replies come from
    #[arg(long, value_enum)]
    reply: Option<ReplyMode>,
}

#[derive(Parser)]
struct PublishArgs {
    /// New message
    message: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_file_config(&config_path)?;

    init_logging(matches!(cli.command, Commands::Server(_)), cli.debug);

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(stop.clone()));

    let mut client_config = ClientConfig::from_file(&file_config);
    if let Some(url) = cli.url {
        client_config.base_url = url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Server(args) => {
            let mut server_config = ServerConfig::from_file(&file_config);
            if let Some(host) = args.host {
                server_config.host = host;
            }
            if let Some(port) = args.port {
                server_config.port = port;
            }
            if let Some(reply) = args.reply {
                server_config.reply = reply;
            }
            run_server(server_config, stop).await
        }
        Commands::Publish(args) => cli::publish_command(&client_config, &args.message).await,
        Commands::Poll => cli::poll_command(&client_config, &stop).await,
        Commands::Stream => cli::stream_command(&client_config, &stop).await,
        Commands::Duplex => cli::duplex_command(&client_config, &stop).await,
    }
}

fn init_logging(server: bool, debug: bool) {
    let default_directive = match (server, debug) {
        (true, true) => "pushpull=debug,update_hub=debug,tower_http=debug,info",
        (true, false) => "pushpull=info,tower_http=info,warn",
        (false, true) => "pushpull=debug,warn",
        (false, false) => "pushpull=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn cancel_on_ctrl_c(stop: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => stop.cancel(),
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}

async fn run_server(config: ServerConfig, stop: CancellationToken) -> Result<()> {
    info!("Starting pushpull server");

    let addr = config.bind_addr()?;
    let policy = ws::policy_for(config.reply);
    let state = AppState::new(config, policy).with_shutdown(stop);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::serve(listener, state).await
}
