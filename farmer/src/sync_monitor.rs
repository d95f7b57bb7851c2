use crate::events::{EventBus, FarmingEvent};
use crate::state::FarmingState;
use farmdesk_clients::api::NodeClient;
use farmdesk_clients::retry::{with_retry, RetryPolicy};
use farmdesk_core::plot::finished_gb;
use log::{debug, info};
use std::io::Error;
use std::sync::Arc;
use std::time::Duration;

/// Polls the node until it reports it is no longer syncing.
pub struct SyncMonitor {
    client: Arc<dyn NodeClient>,
    poll_interval: Duration,
    retry: RetryPolicy,
}
impl SyncMonitor {
    pub fn new(client: Arc<dyn NodeClient>, poll_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            poll_interval,
            retry,
        }
    }

    /// Returns the number of sync state polls made. There is no overall timeout.
    pub async fn run(&self, state: &FarmingState, events: &EventBus) -> Result<u32, Error> {
        let client = &self.client;
        let mut polls = 0;
        while client.is_syncing().await? {
            tokio::time::sleep(self.poll_interval).await;
            let sync_state =
                with_retry(&self.retry, "get_sync_state", move || client.get_sync_state()).await?;
            polls += 1;
            let finished = {
                let mut plot = state.plot.write().await;
                plot.finished_gb = finished_gb(&sync_state, plot.plot_size_gb);
                plot.finished_gb
            };
            *state.sync_state.write().await = sync_state;
            debug!(
                "Syncing {}/{} ({finished} GB plotted)",
                sync_state.current_block, sync_state.highest_block
            );
            events.emit(FarmingEvent::SyncProgress {
                sync_state,
                finished_gb: finished,
            });
        }
        info!("Node synced after {polls} polls");
        Ok(polls)
    }
}
