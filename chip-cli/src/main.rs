//! CLI entry point for chip

use anyhow::{Context, Result};
use chip_agent::ChatService;
use chip_core::config::{Config, ConfigLoader};
use chip_core::logging::init_logging;
use chip_core::utils::{mask_secret, truncate};
use chip_manager::{run_server, AppState};
use chip_providers::OpenAIClient;
use clap::{Parser, Subcommand};
use console::style;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chip")]
#[command(about = "A small web chat front end for LLM completion APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Run the web chat server
    Serve {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send a single message and print the reply
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// User id the conversation belongs to
        #[arg(short, long, default_value = "guest")]
        user: String,
    },
    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Init => {
            init_cli_tracing();
            run_init(&config_loader)?;
        }
        Commands::Serve { host, port } => {
            let config = config_loader.load()?;
            let _guard = init_logging(&config.logging);
            info!("Starting chat server");
            run_serve(config, host, port).await?;
        }
        Commands::Chat { message, user } => {
            init_cli_tracing();
            let config = config_loader.load()?;
            run_chat(&config, &user, &message).await?;
        }
        Commands::Status => {
            init_cli_tracing();
            let config = config_loader.load()?;
            run_status(&config_loader, &config);
        }
    }

    Ok(())
}

/// Quiet stderr logging for one-shot commands
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(config: &Config) -> ChatService {
    let provider = OpenAIClient::new(
        config.provider.api_key(),
        config.provider.api_base.clone(),
        config.assistant.model.clone(),
        config.provider.extra_headers.clone(),
        Duration::from_secs(config.provider.timeout_secs),
    );
    if !provider.has_api_key() {
        warn!("No API key configured; chat requests will fail until OPENAI_API_KEY is set");
    }
    ChatService::from_config(&config.assistant, Arc::new(provider))
}

fn run_init(loader: &ConfigLoader) -> Result<()> {
    let path = loader.config_path();
    if path.exists() {
        println!(
            "{} {}",
            style("Config already exists:").yellow(),
            path.display()
        );
        return Ok(());
    }

    loader.save(&Config::default())?;
    println!("{} {}", style("Wrote config:").green(), path.display());
    println!("Set OPENAI_API_KEY in the environment (or a .env file) before chatting.");
    Ok(())
}

async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;

    let service = Arc::new(build_service(&config));
    let state = AppState::new(service, &config.assistant.name);

    println!("{}", style("Starting Chip server...").bold().cyan());
    println!("Assistant: {}", config.assistant.name);
    println!("Model: {}", config.assistant.model);
    println!("Open http://{} in a browser. Press Ctrl+C to stop.", addr);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    run_server(state, addr, shutdown_rx).await?;
    info!("Server stopped");
    Ok(())
}

async fn run_chat(config: &Config, user: &str, message: &str) -> Result<()> {
    let service = build_service(config);
    let reply = service
        .handle_message(user, message)
        .await
        .context("chat turn failed")?;
    println!("{}: {}", style(&config.assistant.name).bold(), reply);
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) {
    let api_key = match config.provider.api_key() {
        Some(key) => mask_secret(&key),
        None => style("not set").red().to_string(),
    };
    let api_base = config
        .provider
        .api_base
        .clone()
        .filter(|base| !base.trim().is_empty())
        .unwrap_or_else(|| chip_providers::openai::DEFAULT_API_BASE.to_string());

    println!("{}", style("Chip status").bold().cyan());
    println!("Config: {}", loader.config_path().display());
    println!("Assistant: {}", config.assistant.name);
    println!("Persona: {}", truncate(&config.assistant.persona, 60));
    println!("Model: {}", config.assistant.model);
    println!(
        "Max tokens: {}  Temperature: {}",
        config.assistant.max_tokens, config.assistant.temperature
    );
    println!("History window: {}", config.assistant.history_window);
    println!("API base: {}", api_base);
    println!("API key: {}", api_key);
    println!("Listen: {}:{}", config.gateway.host, config.gateway.port);
}
