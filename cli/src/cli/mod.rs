use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};
use std::io::Error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, value_name = "Path to farmdesk.yaml, overrides FARMDESK_CONFIG")]
    pub config: Option<String>,

    #[arg(long, value_name = "Log level (error, warn, info, debug, trace)")]
    pub log_level: Option<String>,

    #[arg(long, value_name = "Local node websocket url")]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub action: RootCommands,
}

#[derive(Debug, Subcommand)]
pub enum RootCommands {
    #[command(about = "Starts the node and farmer and records farmed blocks until interrupted", long_about = None)]
    Run,
    #[command(about = "Saves plot location, plot size, reward address and node name", long_about = None)]
    Setup {
        #[arg(short, long)]
        plot_path: Option<String>,
        #[arg(short = 's', long)]
        plot_size_gb: Option<f64>,
        #[arg(short, long)]
        reward_address: Option<String>,
        #[arg(short, long)]
        node_name: Option<String>,
    },
    #[command(about = "Lists stored farmed blocks", long_about = None)]
    Blocks {
        #[arg(short, long)]
        json: bool,
    },
    #[command(about = "Shows or initialises the configuration", long_about = None)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(about = "Deletes stored blocks, the plot directory and the app config", long_about = None)]
    Reset {
        #[arg(short, long)]
        yes: bool,
    },
    #[command(about = "Shows, sets or generates the node name", long_about = None)]
    NodeName {
        #[arg(short, long)]
        set: Option<String>,
        #[arg(short, long)]
        generate: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    #[command(about = "Prints the app config and runtime settings", long_about = None)]
    Show,
    #[command(about = "Creates the app config if missing and writes default runtime settings", long_about = None)]
    Init {
        #[arg(short, long)]
        force: bool,
    },
    #[command(about = "Checks the app config is complete", long_about = None)]
    Validate,
}

pub fn prompt_for<T>(prompt: &str, current: Option<T>) -> Result<T, Error>
where
    T: Clone + ToString + std::str::FromStr,
    <T as std::str::FromStr>::Err: ToString,
{
    match current {
        Some(v) => Ok(v),
        None => Input::<T>::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(Error::other),
    }
}

pub fn confirm(prompt: &str) -> Result<bool, Error> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(Error::other)
}
