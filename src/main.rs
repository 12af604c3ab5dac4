//! destctl - Notification Dispatch CLI
//!
//! Loads configuration, registers the built-in destination factories and
//! dispatches a message read from a JSON file.

use anyhow::{Context, Result};
use clap::Parser;
use destctl::{
    cli::{Cli, Command},
    config::Config,
    core::Message,
    internal_metrics,
    services::build_dispatcher,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        // Exit if configuration fails, as nothing can be dispatched without it.
        std::process::exit(2);
    });

    // Logs go to stderr so stdout carries only command output.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Default Timeout: {}ms", config.dispatch.default_timeout_ms);
    info!(
        "Allowed Types: {}",
        match &config.dispatch.allowed_types {
            Some(types) => format!("{:?}", types),
            None => "All".to_string(),
        }
    );
    info!(
        "Client Cache: {}",
        if config.cache.enabled {
            format!(
                "Enabled (capacity {}, eviction {:?})",
                config.cache.max_capacity, config.cache.eviction
            )
        } else {
            "Disabled".to_string()
        }
    );
    info!("Email Credentials: {}", config.email.credentials.len());
    info!("-------------------------------------------------------");

    internal_metrics::describe();
    let dispatcher = build_dispatcher(&config).context("failed to register destination factories")?;

    match cli.command {
        Command::Types => {
            for destination_type in dispatcher.available_types() {
                println!("{}", destination_type);
            }
            Ok(())
        }
        Command::Send { message } => {
            let raw = std::fs::read_to_string(&message)
                .with_context(|| format!("failed to read message file {}", message.display()))?;
            let message: Message = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse message file {}", message.display()))?;

            let response = match dispatcher.dispatch(&message).await {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "Dispatch failed");
                    return Err(e.into());
                }
            };

            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
