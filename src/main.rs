//! Quote processor - main entry point
//!
//! Wires configuration, logging, the AMQP transport and the dispatch
//! service together, then runs until a shutdown signal arrives.

use clap::{Parser, Subcommand};
use quote_processor::config::ProcessorConfig;
use quote_processor::observability::init_default_logging;
use quote_processor::service::QuoteService;
use quote_processor::transport::amqp::AmqpClient;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// RabbitMQ quote processor service
#[derive(Parser)]
#[command(name = "quote-processor")]
#[command(about = "Consumes quote requests from RabbitMQ and publishes priced quotes")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the processor service
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!(
        "Starting quote processor v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Run => run_service(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ProcessorConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ProcessorConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = vec!["quote-processor.toml", "config/quote-processor.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ProcessorConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create quote-processor.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_service(config: ProcessorConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Service starting with processor ID: {}", config.processor.id);

    let shutdown = CancellationToken::new();

    // Bootstrap: build the service with its injected transport
    let transport = AmqpClient::new(config.clone());
    let service = QuoteService::start(&config, transport, shutdown.clone()).await?;
    let mut service_handle = tokio::spawn(service.run());

    // Graceful shutdown on SIGINT/SIGTERM
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Processor is running and waiting for quote requests...");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        result = &mut service_handle => {
            error!("Service stopped unexpectedly");
            return match result {
                Ok(service_result) => service_result.map_err(Into::into),
                Err(join_error) => Err(join_error.into()),
            };
        }
    }

    // Cancel in-flight invocations and wait for the service to drain
    shutdown.cancel();
    service_handle.await??;

    Ok(())
}

fn handle_config_command(
    config: ProcessorConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
