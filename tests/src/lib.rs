use async_trait::async_trait;
use farmdesk_clients::api::{NewHeadHandler, NodeClient};
use farmdesk_core::address::AccountId;
use farmdesk_core::blocks::{BlockStorage, FarmedBlock, MemoryBlockStore};
use farmdesk_core::chain::{Block, ChainEvent, Digest, Header, Health, SignedBlock, SyncState};
use farmdesk_core::config::{AppConfig, AppConfigStore, ConfigUpdate, Plot};
use farmdesk_core::digest::{DigestItem, PreDigest, Solution, SUBSPACE_ENGINE_ID};
use farmdesk_core::rewards::{BLOCK_REWARD_EVENT, REWARDS_PALLET};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::io::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const OUR_REWARD: [u8; 32] = [7u8; 32];
pub const OTHER_REWARD: [u8; 32] = [9u8; 32];

/// Ordered record of calls shared between mocks.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);
impl CallLog {
    pub fn push(&self, call: &str) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call.to_string());
        }
    }
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

pub fn our_address() -> String {
    AccountId(OUR_REWARD).to_hex()
}

pub fn block_hash(number: u64) -> String {
    format!("0x{number:064x}")
}

/// Block whose pre-runtime digest names `reward` as the block producer's reward address.
pub fn produced_block(number: u64, reward: [u8; 32]) -> SignedBlock {
    let pre_digest = PreDigest {
        slot: number * 6,
        solution: Solution {
            public_key: AccountId([1u8; 32]),
            reward_address: AccountId(reward),
        },
    };
    let pre = DigestItem::PreRuntime(SUBSPACE_ENGINE_ID, pre_digest.encode());
    let seal = DigestItem::Seal(SUBSPACE_ENGINE_ID, vec![3u8; 64]);
    SignedBlock {
        block: Block {
            header: Header {
                number,
                digest: Digest {
                    logs: vec![
                        format!("0x{}", hex::encode(pre.encode())),
                        format!("0x{}", hex::encode(seal.encode())),
                    ],
                },
                ..Default::default()
            },
            extrinsics: vec![],
        },
        justifications: None,
    }
}

pub fn reward_event(amount: u128) -> ChainEvent {
    ChainEvent {
        pallet: REWARDS_PALLET.to_string(),
        name: BLOCK_REWARD_EVENT.to_string(),
        fields: vec![json!(our_address()), json!(amount.to_string())],
    }
}

/// Scripted node: answers queries from in-memory tables and records every call.
pub struct MockNodeClient {
    pub log: CallLog,
    syncing: Mutex<VecDeque<bool>>,
    sync_state: Mutex<SyncState>,
    peers: u64,
    blocks: Mutex<HashMap<u64, SignedBlock>>,
    events: Mutex<HashMap<String, Vec<ChainEvent>>>,
    handler: Mutex<Option<Arc<dyn NewHeadHandler>>>,
    connected: AtomicBool,
    pub fail_start_node: AtomicBool,
    pub fail_connect: AtomicBool,
    pub fail_start_farming: AtomicBool,
    pub fail_events: AtomicBool,
    pub fail_sync_state: AtomicBool,
    pub fail_unsubscribe: AtomicBool,
    pub fail_disconnect: AtomicBool,
}
impl MockNodeClient {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            syncing: Mutex::new(VecDeque::new()),
            sync_state: Mutex::new(SyncState::default()),
            peers: 8,
            blocks: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            handler: Mutex::new(None),
            connected: AtomicBool::new(false),
            fail_start_node: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_start_farming: AtomicBool::new(false),
            fail_events: AtomicBool::new(false),
            fail_sync_state: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
        }
    }

    /// `is_syncing` answers from this script, then `false` once it runs out.
    pub fn script_syncing(&self, answers: &[bool]) {
        if let Ok(mut syncing) = self.syncing.lock() {
            syncing.extend(answers.iter().copied());
        }
    }

    pub fn set_sync_state(&self, state: SyncState) {
        if let Ok(mut current) = self.sync_state.lock() {
            *current = state;
        }
    }

    pub fn add_block(&self, block: SignedBlock, events: Vec<ChainEvent>) {
        let number = block.block.header.number;
        if let Ok(mut blocks) = self.blocks.lock() {
            blocks.insert(number, block);
        }
        if let Ok(mut all) = self.events.lock() {
            all.insert(block_hash(number), events);
        }
    }

    /// Closes the connection from the node side, as a node restart would.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(mut handler) = self.handler.lock() {
            *handler = None;
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().map(|h| h.is_some()).unwrap_or(false)
    }

    /// Announces a head to the subscribed handler, as the node's notification would.
    pub async fn deliver_head(&self, number: u64) -> Result<(), Error> {
        let handler = self
            .handler
            .lock()
            .map_err(|_| Error::other("handler lock poisoned"))?
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "No head subscription"))?;
        handler
            .on_new_head(Header {
                number,
                ..Default::default()
            })
            .await
    }

    fn check(&self, flag: &AtomicBool, call: &str) -> Result<(), Error> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::other(format!("{call} failed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn connect(&self) -> Result<(), Error> {
        self.log.push("connect");
        self.check(&self.fail_connect, "connect")?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
    async fn disconnect(&self) -> Result<(), Error> {
        self.log.push("disconnect");
        self.check(&self.fail_disconnect, "disconnect")?;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
    async fn get_sync_state(&self) -> Result<SyncState, Error> {
        self.log.push("get_sync_state");
        self.check(&self.fail_sync_state, "get_sync_state")?;
        self.sync_state
            .lock()
            .map(|s| *s)
            .map_err(|_| Error::other("sync state lock poisoned"))
    }
    async fn get_health(&self) -> Result<Health, Error> {
        Ok(Health {
            peers: self.peers,
            is_syncing: false,
            should_have_peers: true,
        })
    }
    async fn is_syncing(&self) -> Result<bool, Error> {
        self.log.push("is_syncing");
        Ok(self
            .syncing
            .lock()
            .map(|mut s| s.pop_front().unwrap_or(false))
            .unwrap_or(false))
    }
    async fn get_peers_count(&self) -> Result<u64, Error> {
        Ok(self.peers)
    }
    async fn get_block_hash(&self, number: Option<u64>) -> Result<String, Error> {
        Ok(block_hash(number.unwrap_or_default()))
    }
    async fn get_block(&self, hash: Option<&str>) -> Result<SignedBlock, Error> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| Error::other("blocks lock poisoned"))?;
        let found = match hash {
            Some(hash) => blocks.values().find(|b| block_hash(b.block.header.number) == hash),
            None => blocks.values().max_by_key(|b| b.block.header.number),
        };
        found
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("No block {hash:?}")))
    }
    async fn get_events(&self, hash: &str) -> Result<Vec<ChainEvent>, Error> {
        self.check(&self.fail_events, "get_events")?;
        Ok(self
            .events
            .lock()
            .ok()
            .and_then(|e| e.get(hash).cloned())
            .unwrap_or_default())
    }
    async fn subscribe_new_heads(&self, handler: Arc<dyn NewHeadHandler>) -> Result<Uuid, Error> {
        self.log.push("subscribe_new_heads");
        if let Ok(mut current) = self.handler.lock() {
            *current = Some(handler);
        }
        Ok(Uuid::new_v4())
    }
    async fn unsubscribe(&self, _id: Uuid) -> Result<bool, Error> {
        self.log.push("unsubscribe");
        self.check(&self.fail_unsubscribe, "unsubscribe")?;
        Ok(self.handler.lock().map(|mut h| h.take().is_some()).unwrap_or(false))
    }
    async fn start_node(&self, _path: &str, _node_name: &str) -> Result<(), Error> {
        self.log.push("start_node");
        self.check(&self.fail_start_node, "start_node")
    }
    async fn start_farming(
        &self,
        _path: &str,
        _reward_address: &str,
        _plot_size_gb: f64,
    ) -> Result<(), Error> {
        self.log.push("start_farming");
        self.check(&self.fail_start_farming, "start_farming")
    }
    async fn stop_processes(&self) -> Result<(), Error> {
        self.log.push("stop_processes");
        Ok(())
    }
}

/// In-memory block store that records each write.
#[derive(Default)]
pub struct RecordingBlockStore {
    pub log: CallLog,
    inner: MemoryBlockStore,
}
impl RecordingBlockStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: MemoryBlockStore::new(),
        }
    }
}

#[async_trait]
impl BlockStorage for RecordingBlockStore {
    async fn get_stored_blocks(&self) -> Vec<FarmedBlock> {
        self.inner.get_stored_blocks().await
    }
    async fn store_blocks(&self, blocks: &[FarmedBlock]) -> Result<(), Error> {
        self.log.push("store_blocks");
        self.inner.store_blocks(blocks).await
    }
    async fn clear(&self) -> Result<(), Error> {
        self.log.push("clear_blocks");
        self.inner.clear().await
    }
}

/// App config held in memory. Every applied update is kept for inspection.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<Option<AppConfig>>,
    pub updates: Mutex<Vec<ConfigUpdate>>,
    pub fail_read: AtomicBool,
    pub fail_update: AtomicBool,
}
impl MemoryConfigStore {
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(Some(config)),
            ..Default::default()
        }
    }

    pub fn complete(plot_path: &str, size_gb: f64, node_name: &str) -> Self {
        Self::with_config(AppConfig {
            plot: Plot {
                location: plot_path.to_string(),
                size_gb,
            },
            reward_address: our_address(),
            node_name: node_name.to_string(),
            ..Default::default()
        })
    }

    pub fn current(&self) -> Option<AppConfig> {
        self.config.lock().ok().and_then(|c| c.clone())
    }

    pub fn applied(&self) -> Vec<ConfigUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AppConfigStore for MemoryConfigStore {
    async fn init(&self) -> Result<(), Error> {
        if let Ok(mut config) = self.config.lock() {
            config.get_or_insert_with(AppConfig::default);
        }
        Ok(())
    }
    async fn read(&self) -> Result<AppConfig, Error> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::InvalidData, "config unreadable"));
        }
        self.current()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no config"))
    }
    async fn update(&self, update: ConfigUpdate) -> Result<(), Error> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::PermissionDenied, "config read only"));
        }
        let mut config = self
            .config
            .lock()
            .map_err(|_| Error::other("config lock poisoned"))?;
        let mut current = config.clone().unwrap_or_default();
        update.clone().apply(&mut current);
        *config = Some(current);
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
        Ok(())
    }
    async fn validate(&self) -> Result<bool, Error> {
        Ok(self.current().map(|c| c.is_valid()).unwrap_or(false))
    }
    async fn remove(&self) -> Result<(), Error> {
        if let Ok(mut config) = self.config.lock() {
            *config = None;
        }
        Ok(())
    }
}

pub struct Harness {
    pub controller: farmdesk::Controller,
    pub client: Arc<MockNodeClient>,
    pub blocks: Arc<RecordingBlockStore>,
    pub config: Arc<MemoryConfigStore>,
    pub log: CallLog,
}

/// Controller wired to mocks with the default timings. Tests run with paused time.
pub fn harness(config: MemoryConfigStore) -> Harness {
    let log = CallLog::default();
    let client = Arc::new(MockNodeClient::new(log.clone()));
    let blocks = Arc::new(RecordingBlockStore::new(log.clone()));
    let config = Arc::new(config);
    let controller = farmdesk::Controller::new(
        client.clone(),
        config.clone(),
        blocks.clone(),
        farmdesk::ControllerConfig::default(),
    );
    Harness {
        controller,
        client,
        blocks,
        config,
        log,
    }
}
