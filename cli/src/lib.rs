use crate::cli::{Cli, RootCommands};
use clap::Parser;
use farmdesk_core::config::{config_path, FarmdeskConfig};
use farmdesk_logger::{parse_level, FarmdeskLogger};
use log::Level;
use std::io::Error;
use std::path::PathBuf;

pub mod cli;
pub mod commands;

fn load_settings(cli: &Cli) -> Result<(FarmdeskConfig, PathBuf), Error> {
    let (mut settings, path) = match cli.config.as_ref().map(PathBuf::from) {
        Some(path) if path.exists() => (FarmdeskConfig::try_from(&path)?, path),
        Some(path) => (FarmdeskConfig::default(), path),
        None => (FarmdeskConfig::load_or_default()?, config_path()),
    };
    if let Some(url) = &cli.rpc_url {
        settings.local_rpc_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    Ok((settings, path))
}

pub async fn run_cli() -> Result<(), Error> {
    let cli = Cli::parse();
    let (settings, settings_path) = load_settings(&cli)?;
    let level = parse_level(&settings.log_level).unwrap_or(Level::Info);
    let mut logger = FarmdeskLogger::build()
        .use_colors(true)
        .current_level(level)
        .with_target_level("tokio_tungstenite", Level::Warn)
        .with_target_level("tungstenite", Level::Warn);
    if matches!(cli.action, RootCommands::Run) {
        logger = logger.log_dir(&settings.log_dir).file_prefix(&settings.app_name);
    }
    let _logger = logger
        .init()
        .map_err(|e| Error::other(format!("{e:?}")))?;
    match cli.action {
        RootCommands::Run => commands::run(&settings).await,
        RootCommands::Setup {
            plot_path,
            plot_size_gb,
            reward_address,
            node_name,
        } => {
            commands::setup(&settings, plot_path, plot_size_gb, reward_address, node_name).await
        }
        RootCommands::Blocks { json } => commands::list_blocks(&settings, json).await,
        RootCommands::Config { action } => {
            commands::config(&settings, &settings_path, action).await
        }
        RootCommands::Reset { yes } => commands::reset(&settings, yes).await,
        RootCommands::NodeName { set, generate } => {
            commands::node_name(&settings, set, generate).await
        }
    }
}
