use crate::cli::{confirm, prompt_for, ConfigAction};
use farmdesk::{Controller, ControllerConfig, FarmingEvent};
use farmdesk_clients::api::OpaqueEventDecoder;
use farmdesk_clients::process::{BinaryLauncher, ProcessLauncher};
use farmdesk_clients::rpc::node::RpcNodeClient;
use farmdesk_core::address::AccountId;
use farmdesk_core::blocks::{BlockStorage, FileBlockStore};
use farmdesk_core::config::{AppConfigStore, FarmdeskConfig};
use farmdesk_core::errors::ErrorRecord;
use farmdesk_core::utils::{generate_node_name, trimmed_name};
use farmdesk_logger::{log_frontend_error, log_frontend_info, log_frontend_warn};
use log::{info, warn};
use std::io::{Error, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

const NETWORK_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

fn build_controller(settings: &FarmdeskConfig) -> Controller {
    let launcher: Arc<dyn ProcessLauncher> = Arc::new(BinaryLauncher::new(
        settings.node.clone(),
        settings.farmer.clone(),
    ));
    let timeout = settings.timings.request_timeout();
    let client = Arc::new(RpcNodeClient::new(
        &settings.local_rpc_url,
        timeout,
        launcher.clone(),
        Arc::new(OpaqueEventDecoder),
    ));
    let controller = Controller::new(
        client,
        Arc::new(settings.app_config_store()),
        Arc::new(FileBlockStore::new(settings.blocks_path())),
        ControllerConfig::from(&settings.timings),
    );
    match &settings.public_rpc_url {
        Some(url) => controller.with_public_client(Arc::new(RpcNodeClient::new(
            url,
            timeout,
            launcher,
            Arc::new(OpaqueEventDecoder),
        ))),
        None => controller,
    }
}

fn record_to_error(record: ErrorRecord) -> Error {
    Error::new(
        ErrorKind::Other,
        format!("{}: {}", record.title, record.message),
    )
}

pub async fn run(settings: &FarmdeskConfig) -> Result<(), Error> {
    let store = settings.app_config_store();
    store.init().await?;
    if !store.validate().await? {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Config is incomplete, run `farmdesk setup` first",
        ));
    }
    let controller = Arc::new(build_controller(settings));
    if !controller.update_from_config().await {
        return Err(record_to_error(controller.error().await));
    }
    let mut events = controller.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(FarmingEvent::FarmedBlock(block)) => log_frontend_info(&format!(
                    "Farmed block #{} reward {:.2}",
                    block.block_num, block.block_reward
                )),
                Ok(FarmingEvent::StatusChanged(status)) => info!("Status: {status:?}"),
                Ok(FarmingEvent::SyncProgress {
                    sync_state,
                    finished_gb,
                }) => info!(
                    "Syncing {}/{}, {finished_gb} GB",
                    sync_state.current_block, sync_state.highest_block
                ),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => log_frontend_warn(&format!("Skipped {n} events")),
                Err(RecvError::Closed) => break,
            }
        }
    });
    controller.register_listener(printer).await;
    let termination = controller.listen_for_termination().await;
    let snapshot = controller.snapshot().await;
    let started = {
        let session = controller.clone();
        async move {
            session
                .start_node(&snapshot.node_name, &snapshot.plot.plot_path)
                .await
                && session
                    .start_farmer(&snapshot.plot.plot_path, snapshot.plot.plot_size_gb)
                    .await
        }
    };
    tokio::pin!(termination);
    let result = tokio::select! {
        ok = started => {
            if ok {
                controller.spawn_network_refresh(NETWORK_REFRESH_INTERVAL).await;
                info!("Farming as {}", trimmed_name(&snapshot_name(&controller).await));
                if let Err(e) = (&mut termination).await {
                    warn!("Termination listener stopped: {e}");
                }
                Ok(())
            } else {
                Err(record_to_error(controller.error().await))
            }
        }
        _ = &mut termination => Ok(()),
    };
    controller.teardown().await;
    result
}

async fn snapshot_name(controller: &Controller) -> String {
    controller.state().node_name.read().await.clone()
}

pub async fn setup(
    settings: &FarmdeskConfig,
    plot_path: Option<String>,
    plot_size_gb: Option<f64>,
    reward_address: Option<String>,
    node_name: Option<String>,
) -> Result<(), Error> {
    let store = settings.app_config_store();
    store.init().await?;
    let plot_path: String = prompt_for("Plot directory", plot_path)?;
    let plot_size_gb: f64 = prompt_for("Plot size (GB)", plot_size_gb)?;
    if plot_size_gb <= 0.0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Plot size must be greater than zero",
        ));
    }
    let reward_address: String = prompt_for("Reward address", reward_address)?;
    reward_address.parse::<AccountId>()?;
    let node_name = node_name.unwrap_or_else(generate_node_name);
    tokio::fs::create_dir_all(&plot_path).await?;
    let controller = build_controller(settings);
    if controller
        .confirm_plotting_setup(&node_name, &plot_path, plot_size_gb, &reward_address)
        .await
    {
        info!("Saved setup for node {}", trimmed_name(&node_name));
        Ok(())
    } else {
        Err(record_to_error(controller.error().await))
    }
}

pub async fn list_blocks(settings: &FarmdeskConfig, json: bool) -> Result<(), Error> {
    let store = FileBlockStore::new(settings.blocks_path());
    let mut blocks = store.get_stored_blocks().await;
    blocks.sort_by(|a, b| b.block_num.cmp(&a.block_num));
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&blocks).map_err(Error::other)?
        );
    } else if blocks.is_empty() {
        println!("No farmed blocks yet");
    } else {
        let total: f64 = blocks.iter().map(|b| b.block_reward).sum();
        for block in &blocks {
            println!(
                "#{:<10} {:>10.2}  {}",
                block.block_num, block.block_reward, block.id
            );
        }
        println!("{} blocks, {total:.2} total reward", blocks.len());
    }
    Ok(())
}

pub async fn config(
    settings: &FarmdeskConfig,
    settings_path: &Path,
    action: ConfigAction,
) -> Result<(), Error> {
    let store = settings.app_config_store();
    match action {
        ConfigAction::Show => {
            println!("# {}", settings_path.display());
            println!(
                "{}",
                serde_json::to_string_pretty(settings).map_err(Error::other)?
            );
            match store.read().await {
                Ok(app) => println!(
                    "# {}\n{}",
                    store.path().display(),
                    serde_json::to_string_pretty(&app).map_err(Error::other)?
                ),
                Err(e) => warn!("No app config at {}: {e}", store.path().display()),
            }
            Ok(())
        }
        ConfigAction::Init { force } => {
            if force || !settings_path.exists() {
                settings.save_as_yaml(settings_path)?;
                info!("Wrote {}", settings_path.display());
            }
            store.init().await?;
            info!("App config at {}", store.path().display());
            Ok(())
        }
        ConfigAction::Validate => {
            if store.validate().await? {
                println!("Config is complete");
                Ok(())
            } else {
                Err(Error::new(
                    ErrorKind::InvalidData,
                    "Config is missing plot, reward address or node name",
                ))
            }
        }
    }
}

pub async fn reset(settings: &FarmdeskConfig, yes: bool) -> Result<(), Error> {
    if !yes && !confirm("Delete farmed blocks, the plot directory and the config?")? {
        info!("Reset cancelled");
        return Ok(());
    }
    let controller = build_controller(settings);
    if let Err(e) = settings.app_config_store().read().await {
        warn!("Could not read config, plot directory will be kept: {e}");
    } else {
        controller.update_from_config().await;
    }
    if controller.reset_and_clear().await {
        info!("Reset complete");
        Ok(())
    } else {
        log_frontend_error("Reset finished with errors");
        Err(Error::other("Reset finished with errors"))
    }
}

pub async fn node_name(
    settings: &FarmdeskConfig,
    set: Option<String>,
    generate: bool,
) -> Result<(), Error> {
    let controller = build_controller(settings);
    let name = match (set, generate) {
        (Some(name), _) => name,
        (None, true) => generate_node_name(),
        (None, false) => {
            let app = settings.app_config_store().read().await?;
            println!("{}", trimmed_name(&app.node_name));
            return Ok(());
        }
    };
    if controller.set_node_name(&name).await {
        println!("{name}");
        Ok(())
    } else {
        Err(record_to_error(controller.error().await))
    }
}
