use farmdesk_core::blocks::FarmedBlock;
use farmdesk_core::chain::SyncState;
use farmdesk_core::errors::ErrorRecord;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use tokio::sync::RwLock;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FarmingStatus {
    #[default]
    Idle,
    StartingNode,
    Syncing,
    Farming,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub peers: u64,
    pub synced_at_num: u64,
    /// Best block reported by the public endpoint, when one is configured.
    pub network_best_num: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotState {
    pub plot_path: String,
    #[serde(rename = "plotSizeGB")]
    pub plot_size_gb: f64,
    #[serde(rename = "finishedGB")]
    pub finished_gb: f64,
}
impl Default for PlotState {
    fn default() -> Self {
        Self {
            plot_path: "/".to_string(),
            plot_size_gb: 1.0,
            finished_gb: 0.0,
        }
    }
}

/// Read only copy of the controller state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingSnapshot {
    pub status: FarmingStatus,
    pub error: ErrorRecord,
    pub sync_state: SyncState,
    pub network: NetworkState,
    pub plot: PlotState,
    pub node_name: String,
    pub reward_address: String,
    pub farmed: Vec<FarmedBlock>,
}

/// State shared between the controller and its head handler.
#[derive(Default)]
pub struct FarmingState {
    pub status: RwLock<FarmingStatus>,
    pub error: RwLock<ErrorRecord>,
    pub sync_state: RwLock<SyncState>,
    pub network: RwLock<NetworkState>,
    pub plot: RwLock<PlotState>,
    pub node_name: RwLock<String>,
    pub reward_address: RwLock<String>,
    /// Newest first. Not deduplicated, the same head seen twice appears twice.
    pub farmed: RwLock<Vec<FarmedBlock>>,
    pub blocks_loaded: AtomicBool,
}
impl FarmingState {
    pub async fn snapshot(&self) -> FarmingSnapshot {
        FarmingSnapshot {
            status: *self.status.read().await,
            error: self.error.read().await.clone(),
            sync_state: *self.sync_state.read().await,
            network: self.network.read().await.clone(),
            plot: self.plot.read().await.clone(),
            node_name: self.node_name.read().await.clone(),
            reward_address: self.reward_address.read().await.clone(),
            farmed: self.farmed.read().await.clone(),
        }
    }
}
