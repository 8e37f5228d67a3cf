//! Wrench CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wrench::cli::{commands, Cli, Commands};
use wrench::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("wrench={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, &config_path).await?;
        }

        Commands::Ask {
            symptoms,
            model,
            serial,
            query,
            keyword_only,
        } => {
            commands::run_ask(
                symptoms,
                model.clone(),
                serial.clone(),
                query.clone(),
                *keyword_only,
                settings,
            )
            .await?;
        }

        Commands::Chat {
            model,
            serial,
            semantic,
        } => {
            commands::run_chat(model.clone(), serial.clone(), *semantic, settings).await?;
        }

        Commands::Index { force } => {
            commands::run_index(*force, settings).await?;
        }

        Commands::Search {
            query,
            model,
            serial,
            limit,
        } => {
            commands::run_search(query, model.clone(), serial.clone(), *limit, settings).await?;
        }

        Commands::History { model, serial } => {
            commands::run_history(model.clone(), serial.clone(), settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
