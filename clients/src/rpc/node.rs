use crate::api::{EventDecoder, NewHeadHandler, NodeClient};
use crate::process::ProcessLauncher;
use crate::rpc::{
    CHAIN_GET_BLOCK, CHAIN_GET_BLOCK_HASH, CHAIN_SUBSCRIBE_NEW_HEADS, CHAIN_UNSUBSCRIBE_NEW_HEADS,
    STATE_GET_STORAGE, SYSTEM_EVENTS_KEY, SYSTEM_HEALTH, SYSTEM_PEERS, SYSTEM_SYNC_STATE,
};
use crate::websocket::{get_connection, RpcConnection};
use async_trait::async_trait;
use farmdesk_core::chain::{ChainEvent, Header, Health, PeerInfo, SignedBlock, SyncState};
use farmdesk_core::plot::gb_to_bytes;
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct Connected {
    connection: Arc<RpcConnection>,
    generation: u64,
    run: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

struct HeadSubscription {
    server_id: String,
    generation: u64,
    _worker: JoinHandle<()>,
}

type Subscriptions = Arc<Mutex<HashMap<Uuid, HeadSubscription>>>;

/// Node client speaking JSON-RPC over a websocket. Connect and disconnect are idempotent
/// and the client may be reconnected after a disconnect.
pub struct RpcNodeClient {
    url: String,
    request_timeout: Duration,
    connected: RwLock<Option<Connected>>,
    generation: AtomicU64,
    subscriptions: Subscriptions,
    launcher: Arc<dyn ProcessLauncher>,
    decoder: Arc<dyn EventDecoder>,
}
impl RpcNodeClient {
    pub fn new(
        url: &str,
        request_timeout: Duration,
        launcher: Arc<dyn ProcessLauncher>,
        decoder: Arc<dyn EventDecoder>,
    ) -> Self {
        Self {
            url: url.to_string(),
            request_timeout,
            connected: RwLock::new(None),
            generation: AtomicU64::new(0),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            launcher,
            decoder,
        }
    }

    /// The open connection and the generation its subscriptions are tagged with.
    async fn current(&self) -> Result<(Arc<RpcConnection>, u64), Error> {
        match self.connected.read().await.as_ref() {
            Some(c) if c.connection.is_open() => Ok((c.connection.clone(), c.generation)),
            _ => Err(Error::new(
                ErrorKind::NotConnected,
                format!("Not connected to {}", self.url),
            )),
        }
    }

    async fn connection(&self) -> Result<Arc<RpcConnection>, Error> {
        Ok(self.current().await?.0)
    }

    /// Head subscriptions still bound to a live connection.
    pub async fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, Error> {
        self.connection().await?.request(method, params).await
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    async fn connect(&self) -> Result<(), Error> {
        let mut connected = self.connected.write().await;
        if let Some(existing) = connected.as_ref() {
            if existing.connection.is_open() {
                debug!("Already connected to {}", self.url);
                return Ok(());
            }
        }
        let (connection, mut stream) = get_connection(&self.url, self.request_timeout).await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let run = Arc::new(AtomicBool::new(true));
        let reader_run = run.clone();
        let subscriptions = self.subscriptions.clone();
        let url = self.url.clone();
        let reader = tokio::spawn(async move {
            stream.run(reader_run).await;
            // Subscriptions made on this connection cannot receive anything now.
            let mut subscriptions = subscriptions.lock().await;
            let before = subscriptions.len();
            subscriptions.retain(|_, s| s.generation != generation);
            if subscriptions.len() < before {
                warn!(
                    "Connection to {url} closed, dropped {} head subscriptions",
                    before - subscriptions.len()
                );
            }
        });
        info!("Connected to {}", self.url);
        *connected = Some(Connected {
            connection: Arc::new(connection),
            generation,
            run,
            reader,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        let Some(connected) = self.connected.write().await.take() else {
            debug!("Already disconnected from {}", self.url);
            return Ok(());
        };
        self.subscriptions.lock().await.clear();
        connected.run.store(false, Ordering::Relaxed);
        if let Err(e) = connected.connection.close().await {
            debug!("Error closing websocket to {}: {e}", self.url);
        }
        connected.reader.abort();
        info!("Disconnected from {}", self.url);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connection().await.is_ok()
    }

    async fn get_sync_state(&self) -> Result<SyncState, Error> {
        self.call(SYSTEM_SYNC_STATE, json!([])).await
    }

    async fn get_health(&self) -> Result<Health, Error> {
        self.call(SYSTEM_HEALTH, json!([])).await
    }

    async fn is_syncing(&self) -> Result<bool, Error> {
        Ok(self.get_health().await?.is_syncing)
    }

    async fn get_peers_count(&self) -> Result<u64, Error> {
        let peers: Vec<PeerInfo> = self.call(SYSTEM_PEERS, json!([])).await?;
        Ok(peers.len() as u64)
    }

    async fn get_block_hash(&self, number: Option<u64>) -> Result<String, Error> {
        let params = match number {
            Some(n) => json!([n]),
            None => json!([]),
        };
        let hash: Option<String> = self.call(CHAIN_GET_BLOCK_HASH, params).await?;
        hash.ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                format!("No block hash for block {number:?}"),
            )
        })
    }

    async fn get_block(&self, hash: Option<&str>) -> Result<SignedBlock, Error> {
        let params = match hash {
            Some(h) => json!([h]),
            None => json!([]),
        };
        let block: Option<SignedBlock> = self.call(CHAIN_GET_BLOCK, params).await?;
        block.ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                format!("Block {} not found", hash.unwrap_or("best")),
            )
        })
    }

    async fn get_events(&self, hash: &str) -> Result<Vec<ChainEvent>, Error> {
        let raw: Option<String> = self
            .call(STATE_GET_STORAGE, json!([SYSTEM_EVENTS_KEY, hash]))
            .await?;
        let Some(raw) = raw else {
            return Ok(vec![]);
        };
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Invalid events storage for {hash}: {e}"),
            )
        })?;
        self.decoder.decode_events(hash, &bytes)
    }

    async fn subscribe_new_heads(&self, handler: Arc<dyn NewHeadHandler>) -> Result<Uuid, Error> {
        let (connection, generation) = self.current().await?;
        let (server_id, mut rx) = connection
            .subscribe(CHAIN_SUBSCRIBE_NEW_HEADS, json!([]))
            .await?;
        let id = Uuid::new_v4();
        let worker = tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                match serde_json::from_value::<Header>(value) {
                    Ok(header) => {
                        let number = header.number;
                        if let Err(e) = handler.on_new_head(header).await {
                            error!("Error handling head {number}: {e:?}");
                        }
                    }
                    Err(e) => error!("Invalid head notification: {e:?}"),
                }
            }
            warn!("Head subscription {id} closed");
        });
        let mut subscriptions = self.subscriptions.lock().await;
        // The reader prunes after marking the connection closed, so one of the two sees it.
        if !connection.is_open() {
            worker.abort();
            return Err(Error::new(
                ErrorKind::NotConnected,
                format!("Connection to {} closed while subscribing", self.url),
            ));
        }
        info!("Subscribed to new heads as {id} ({server_id})");
        subscriptions.insert(
            id,
            HeadSubscription {
                server_id,
                generation,
                _worker: worker,
            },
        );
        Ok(id)
    }

    async fn unsubscribe(&self, id: Uuid) -> Result<bool, Error> {
        let Some(subscription) = self.subscriptions.lock().await.remove(&id) else {
            warn!("Unknown subscription {id}");
            return Ok(false);
        };
        let res = self
            .connection()
            .await?
            .unsubscribe(CHAIN_UNSUBSCRIBE_NEW_HEADS, &subscription.server_id)
            .await;
        info!("Unsubscribed {id} from new heads");
        res
    }

    async fn start_node(&self, path: &str, node_name: &str) -> Result<(), Error> {
        self.launcher.start_node(path, node_name).await
    }

    async fn start_farming(
        &self,
        path: &str,
        reward_address: &str,
        plot_size_gb: f64,
    ) -> Result<(), Error> {
        self.launcher
            .start_farming(path, reward_address, gb_to_bytes(plot_size_gb))
            .await
    }

    async fn stop_processes(&self) -> Result<(), Error> {
        self.launcher.shutdown().await
    }
}
