use crate::events::{EventBus, FarmingEvent};
use crate::state::{FarmingSnapshot, FarmingState, FarmingStatus};
use crate::subscription::FarmedBlockHandler;
use crate::sync_monitor::SyncMonitor;
use farmdesk_clients::api::NodeClient;
use farmdesk_clients::retry::RetryPolicy;
use farmdesk_core::blocks::{BlockStorage, FarmedBlock};
use farmdesk_core::config::{AppConfigStore, ConfigUpdate, TimingConfig};
use farmdesk_core::errors::{
    ErrorRecord, FarmingError, RecentErrors, CONFIG_READ_FAILED, CONFIG_UPDATE_FAILED,
    NODE_CONNECTION_LOST, START_FARMER_FAILED, START_NODE_FAILED, START_NODE_MISSING_PARAMS,
};
use farmdesk_core::utils::await_termination;
use log::{debug, error, info, warn};
use std::io::{Error, ErrorKind};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub node_settle_delay: Duration,
    pub sync_poll_interval: Duration,
    pub retry: RetryPolicy,
    pub recent_errors_depth: usize,
    pub recent_errors_ttl: Duration,
    pub event_capacity: usize,
}
impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            node_settle_delay: Duration::from_secs(7),
            sync_poll_interval: Duration::from_secs(3),
            retry: RetryPolicy::default(),
            recent_errors_depth: 25,
            recent_errors_ttl: Duration::from_secs(60 * 60),
            event_capacity: 1024,
        }
    }
}
impl From<&TimingConfig> for ControllerConfig {
    fn from(value: &TimingConfig) -> Self {
        Self {
            node_settle_delay: value.node_settle_delay(),
            sync_poll_interval: value.sync_poll_interval(),
            retry: RetryPolicy::new(value.retry_attempts, value.retry_backoff()),
            ..Default::default()
        }
    }
}

/// Drives a farming session: idle -> startingNode -> syncing -> farming.
///
/// Operations never return errors to the caller. Failures are logged, written to the
/// error slot and broadcast; the boolean results only say whether the step completed.
pub struct Controller {
    client: Arc<dyn NodeClient>,
    public_client: Option<Arc<dyn NodeClient>>,
    config_store: Arc<dyn AppConfigStore>,
    block_store: Arc<dyn BlockStorage>,
    settings: ControllerConfig,
    state: Arc<FarmingState>,
    events: EventBus,
    subscription: Mutex<Option<Uuid>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    recent_errors: Mutex<RecentErrors<ErrorRecord>>,
}
impl Controller {
    pub fn new(
        client: Arc<dyn NodeClient>,
        config_store: Arc<dyn AppConfigStore>,
        block_store: Arc<dyn BlockStorage>,
        settings: ControllerConfig,
    ) -> Self {
        Self {
            client,
            public_client: None,
            config_store,
            block_store,
            events: EventBus::new(settings.event_capacity),
            recent_errors: Mutex::new(RecentErrors::new(
                settings.recent_errors_depth,
                settings.recent_errors_ttl,
            )),
            settings,
            state: Arc::new(FarmingState::default()),
            subscription: Mutex::new(None),
            listeners: Mutex::new(vec![]),
        }
    }

    /// Adds a public endpoint used to cross check the chain height.
    pub fn with_public_client(mut self, client: Arc<dyn NodeClient>) -> Self {
        self.public_client = Some(client);
        self
    }

    pub fn state(&self) -> Arc<FarmingState> {
        self.state.clone()
    }
    pub fn events(&self) -> &EventBus {
        &self.events
    }
    pub async fn snapshot(&self) -> FarmingSnapshot {
        self.state.snapshot().await
    }
    pub async fn status(&self) -> FarmingStatus {
        *self.state.status.read().await
    }
    pub async fn error(&self) -> ErrorRecord {
        self.state.error.read().await.clone()
    }
    pub async fn farmed_blocks(&self) -> Vec<FarmedBlock> {
        self.state.farmed.read().await.clone()
    }
    pub async fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors
            .lock()
            .await
            .get()
            .into_iter()
            .map(|(e, _)| e)
            .collect()
    }
    pub async fn has_subscription(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    pub async fn set_plot_path(&self, path: &str) {
        self.state.plot.write().await.plot_path = path.to_string();
    }
    pub async fn set_plot_size(&self, size_gb: f64) {
        self.state.plot.write().await.plot_size_gb = size_gb;
    }
    pub async fn set_reward_address(&self, address: &str) {
        *self.state.reward_address.write().await = address.to_string();
    }
    pub async fn set_peers(&self, peers: u64) {
        self.state.network.write().await.peers = peers;
    }

    async fn set_status(&self, status: FarmingStatus) {
        let mut current = self.state.status.write().await;
        if *current != status {
            info!("Status {:?} -> {:?}", *current, status);
            *current = status;
            self.events.emit(FarmingEvent::StatusChanged(status));
        }
    }

    async fn set_error(&self, record: ErrorRecord) {
        error!("{}: {}", record.title, record.message);
        *self.state.error.write().await = record.clone();
        self.recent_errors.lock().await.add(record.clone());
        self.events.emit(FarmingEvent::Error(record));
    }

    async fn fail(&self, title: &str, err: FarmingError) -> bool {
        debug!("{err}");
        self.set_error(err.into_record(title)).await;
        false
    }

    pub async fn clear_error(&self) {
        *self.state.error.write().await = ErrorRecord::default();
    }

    /// Loads plot, node name and reward address from the config, then the stored blocks.
    pub async fn update_from_config(&self) -> bool {
        let config = match self.config_store.read().await {
            Ok(c) => c,
            Err(e) => return self.fail(CONFIG_READ_FAILED, FarmingError::Config(e)).await,
        };
        {
            let mut plot = self.state.plot.write().await;
            plot.plot_path = config.plot.location;
            plot.plot_size_gb = config.plot.size_gb;
        }
        *self.state.node_name.write().await = config.node_name;
        *self.state.reward_address.write().await = config.reward_address;
        self.load_stored_blocks().await;
        true
    }

    /// Loads persisted blocks into the farmed list, once per session.
    pub async fn load_stored_blocks(&self) {
        if self.state.blocks_loaded.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut stored = self.block_store.get_stored_blocks().await;
        stored.sort_by(|a, b| b.block_num.cmp(&a.block_num));
        info!("Loaded {} stored farmed blocks", stored.len());
        self.state.farmed.write().await.extend(stored);
    }

    pub async fn set_node_name(&self, name: &str) -> bool {
        *self.state.node_name.write().await = name.to_string();
        match self.config_store.update(ConfigUpdate::node_name(name)).await {
            Ok(()) => true,
            Err(e) => self.fail(CONFIG_UPDATE_FAILED, FarmingError::Config(e)).await,
        }
    }

    /// Persists the node name, then the plot and reward address, as two config updates.
    pub async fn confirm_plotting_setup(
        &self,
        node_name: &str,
        plot_path: &str,
        plot_size_gb: f64,
        reward_address: &str,
    ) -> bool {
        if !self.set_node_name(node_name).await {
            return false;
        }
        self.set_plot_path(plot_path).await;
        self.set_plot_size(plot_size_gb).await;
        self.set_reward_address(reward_address).await;
        let update = ConfigUpdate::plot_and_reward(plot_path, plot_size_gb, reward_address);
        match self.config_store.update(update).await {
            Ok(()) => true,
            Err(e) => self.fail(CONFIG_UPDATE_FAILED, FarmingError::Config(e)).await,
        }
    }

    pub async fn start_node(&self, node_name: &str, plot_path: &str) -> bool {
        if node_name.is_empty() || plot_path.is_empty() {
            self.set_error(ErrorRecord::new(START_NODE_FAILED, START_NODE_MISSING_PARAMS))
                .await;
            return false;
        }
        *self.state.node_name.write().await = node_name.to_string();
        self.set_plot_path(plot_path).await;
        self.set_status(FarmingStatus::StartingNode).await;
        if let Err(e) = self.client.start_node(plot_path, node_name).await {
            return self
                .fail(START_NODE_FAILED, FarmingError::ProcessStart(e))
                .await;
        }
        debug!(
            "Waiting {:?} for the node to come up",
            self.settings.node_settle_delay
        );
        tokio::time::sleep(self.settings.node_settle_delay).await;
        if let Err(e) = self.client.connect().await {
            return self
                .fail(START_NODE_FAILED, FarmingError::Connection(e))
                .await;
        }
        self.set_status(FarmingStatus::Syncing).await;
        self.refresh_network_state().await;
        true
    }

    pub async fn start_farmer(&self, plot_path: &str, plot_size_gb: f64) -> bool {
        self.set_plot_path(plot_path).await;
        self.set_plot_size(plot_size_gb).await;
        let reward_address = self.state.reward_address.read().await.clone();
        if let Err(e) = self
            .client
            .start_farming(plot_path, &reward_address, plot_size_gb)
            .await
        {
            return self
                .fail(START_FARMER_FAILED, FarmingError::ProcessStart(e))
                .await;
        }
        self.set_status(FarmingStatus::Syncing).await;
        let monitor = SyncMonitor::new(
            self.client.clone(),
            self.settings.sync_poll_interval,
            self.settings.retry,
        );
        if let Err(e) = monitor.run(&self.state, &self.events).await {
            return self
                .fail(START_FARMER_FAILED, FarmingError::Connection(e))
                .await;
        }
        self.load_stored_blocks().await;
        self.set_status(FarmingStatus::Farming).await;
        if let Err(e) = self.open_subscription(&reward_address).await {
            return self.fail(START_FARMER_FAILED, e).await;
        }
        self.refresh_network_state().await;
        true
    }

    async fn open_subscription(&self, reward_address: &str) -> Result<Uuid, FarmingError> {
        let mut subscription = self.subscription.lock().await;
        if let Some(existing) = *subscription {
            warn!("Refusing second head subscription, {existing} is active");
            return Err(FarmingError::Subscription(Error::new(
                ErrorKind::AlreadyExists,
                format!("Subscription {existing} already active"),
            )));
        }
        let handler = FarmedBlockHandler::new(
            self.client.clone(),
            self.block_store.clone(),
            self.state.clone(),
            self.events.clone(),
            reward_address,
        )
        .map_err(FarmingError::Config)?;
        let id = self
            .client
            .subscribe_new_heads(Arc::new(handler))
            .await
            .map_err(FarmingError::Subscription)?;
        *subscription = Some(id);
        Ok(id)
    }

    /// While farming, notices a closed node connection, drops the stale head subscription,
    /// then reconnects and resubscribes. Returns false if the session could not be restored.
    pub async fn check_node_connection(&self) -> bool {
        if self.status().await != FarmingStatus::Farming {
            return true;
        }
        if self.client.is_connected().await && self.has_subscription().await {
            return true;
        }
        if let Some(id) = self.subscription.lock().await.take() {
            warn!("Node connection lost, dropping head subscription {id}");
            self.fail(
                NODE_CONNECTION_LOST,
                FarmingError::Connection(Error::new(
                    ErrorKind::NotConnected,
                    "Connection to the node closed",
                )),
            )
            .await;
        }
        if let Err(e) = self.client.connect().await {
            return self
                .fail(NODE_CONNECTION_LOST, FarmingError::Connection(e))
                .await;
        }
        let reward_address = self.state.reward_address.read().await.clone();
        match self.open_subscription(&reward_address).await {
            Ok(id) => {
                info!("Resubscribed to new heads as {id}");
                true
            }
            Err(e) => self.fail(NODE_CONNECTION_LOST, e).await,
        }
    }

    /// Best effort refresh of peer count and, if configured, the public best block.
    pub async fn refresh_network_state(&self) {
        match self.client.get_peers_count().await {
            Ok(peers) => self.set_peers(peers).await,
            Err(e) => warn!("Failed to read peer count: {e}"),
        }
        let Some(public) = &self.public_client else {
            return;
        };
        let best = match public.connect().await {
            Ok(()) => public.get_block(None).await.map(|b| b.block.header.number),
            Err(e) => Err(e),
        };
        match best {
            Ok(number) => self.state.network.write().await.network_best_num = Some(number),
            Err(e) => warn!("Failed to read network best block: {e}"),
        }
    }

    /// Tracks a background task so teardown can stop it.
    pub async fn register_listener(&self, handle: JoinHandle<()>) {
        self.listeners.lock().await.push(handle);
    }

    /// Spawns a task that resolves with the signal name on the first termination signal.
    pub async fn listen_for_termination(&self) -> oneshot::Receiver<&'static str> {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            match await_termination().await {
                Ok(signal) => {
                    info!("Received {signal}");
                    let _ = tx.send(signal);
                }
                Err(e) => error!("Failed to listen for termination signals: {e}"),
            }
        });
        self.register_listener(handle).await;
        rx
    }

    /// Periodically refreshes the network state until teardown.
    pub async fn spawn_network_refresh(self: &Arc<Self>, interval: Duration) {
        let controller = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match controller.upgrade() {
                    Some(c) => {
                        c.check_node_connection().await;
                        c.refresh_network_state().await;
                    }
                    None => break,
                }
            }
        });
        self.register_listener(handle).await;
    }

    /// Unsubscribes, disconnects, flushes the farmed list, stops listeners and child processes.
    /// Every step runs even if an earlier one failed.
    pub async fn teardown(&self) {
        info!("Shutting down farming session");
        if let Some(id) = self.subscription.lock().await.take() {
            if let Err(e) = self.client.unsubscribe(id).await {
                error!("Failed to unsubscribe {id}: {e}");
            }
        }
        if let Err(e) = self.client.disconnect().await {
            error!("Failed to disconnect node client: {e}");
        }
        if let Some(public) = &self.public_client {
            if let Err(e) = public.disconnect().await {
                error!("Failed to disconnect public client: {e}");
            }
        }
        // An unloaded list would overwrite the stored blocks with an empty map.
        if self.state.blocks_loaded.load(Ordering::SeqCst) {
            let farmed = self.state.farmed.read().await.clone();
            if let Err(e) = self.block_store.store_blocks(&farmed).await {
                error!("Failed to flush farmed blocks: {e}");
            }
        }
        for listener in self.listeners.lock().await.drain(..) {
            listener.abort();
        }
        if let Err(e) = self.client.stop_processes().await {
            error!("Failed to stop child processes: {e}");
        }
    }

    /// Removes stored blocks, the plot directory and the config file.
    pub async fn reset_and_clear(&self) -> bool {
        let mut ok = true;
        if let Err(e) = self.block_store.clear().await {
            error!("Failed to clear stored blocks: {e}");
            ok = false;
        }
        self.state.farmed.write().await.clear();
        let plot_path = self.state.plot.read().await.plot_path.clone();
        if !plot_path.is_empty() && plot_path != "/" && Path::new(&plot_path).exists() {
            match tokio::fs::remove_dir_all(&plot_path).await {
                Ok(()) => info!("Removed plot directory {plot_path}"),
                Err(e) => {
                    error!("Failed to remove plot directory {plot_path}: {e}");
                    ok = false;
                }
            }
        }
        if let Err(e) = self.config_store.remove().await {
            error!("Failed to remove config: {e}");
            ok = false;
        }
        ok
    }
}
