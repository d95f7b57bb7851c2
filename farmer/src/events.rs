use crate::state::FarmingStatus;
use farmdesk_core::blocks::FarmedBlock;
use farmdesk_core::chain::SyncState;
use farmdesk_core::errors::ErrorRecord;
use log::trace;
use serde::Serialize;
use tokio::sync::broadcast::{Receiver, Sender};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum FarmingEvent {
    FarmedBlock(FarmedBlock),
    NewBlock(u64),
    StatusChanged(FarmingStatus),
    Error(ErrorRecord),
    #[serde(rename_all = "camelCase")]
    SyncProgress {
        sync_state: SyncState,
        finished_gb: f64,
    },
}

/// Fan out of controller events to any number of observers.
#[derive(Clone)]
pub struct EventBus {
    channel: Sender<FarmingEvent>,
}
impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channel: Sender::new(capacity.max(1)),
        }
    }
    pub fn subscribe(&self) -> Receiver<FarmingEvent> {
        self.channel.subscribe()
    }
    pub fn emit(&self, event: FarmingEvent) {
        trace!("Emitting {event:?}");
        // Err only means there are no receivers.
        let _ = self.channel.send(event);
    }
}
impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
