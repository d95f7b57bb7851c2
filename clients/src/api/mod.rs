use async_trait::async_trait;
use farmdesk_core::chain::{ChainEvent, Header, Health, SignedBlock, SyncState};
use log::debug;
use std::io::Error;
use std::sync::Arc;
use uuid::Uuid;

/// Receives chain heads in the order the node announced them.
#[async_trait]
pub trait NewHeadHandler: Send + Sync {
    async fn on_new_head(&self, header: Header) -> Result<(), Error>;
}

/// Turns the raw SCALE encoded `System.Events` storage value into events.
/// Decoding needs the runtime metadata, so it is supplied by the embedder.
/// Balances should be emitted as decimal or hex strings, JSON numbers above
/// `u64::MAX` lose precision.
pub trait EventDecoder: Send + Sync {
    fn decode_events(&self, block_hash: &str, raw: &[u8]) -> Result<Vec<ChainEvent>, Error>;
}

#[derive(Default, Debug, Clone, Copy)]
pub struct OpaqueEventDecoder;
impl EventDecoder for OpaqueEventDecoder {
    fn decode_events(&self, block_hash: &str, raw: &[u8]) -> Result<Vec<ChainEvent>, Error> {
        debug!(
            "Skipping {} bytes of events for {block_hash}, no runtime decoder configured",
            raw.len()
        );
        Ok(vec![])
    }
}

#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn connect(&self) -> Result<(), Error>;
    async fn disconnect(&self) -> Result<(), Error>;
    async fn is_connected(&self) -> bool;
    async fn get_sync_state(&self) -> Result<SyncState, Error>;
    async fn get_health(&self) -> Result<Health, Error>;
    async fn is_syncing(&self) -> Result<bool, Error>;
    async fn get_peers_count(&self) -> Result<u64, Error>;
    async fn get_block_hash(&self, number: Option<u64>) -> Result<String, Error>;
    async fn get_block(&self, hash: Option<&str>) -> Result<SignedBlock, Error>;
    async fn get_events(&self, hash: &str) -> Result<Vec<ChainEvent>, Error>;
    async fn subscribe_new_heads(&self, handler: Arc<dyn NewHeadHandler>) -> Result<Uuid, Error>;
    async fn unsubscribe(&self, id: Uuid) -> Result<bool, Error>;
    async fn start_node(&self, path: &str, node_name: &str) -> Result<(), Error>;
    async fn start_farming(
        &self,
        path: &str,
        reward_address: &str,
        plot_size_gb: f64,
    ) -> Result<(), Error>;
    async fn stop_processes(&self) -> Result<(), Error>;
}
