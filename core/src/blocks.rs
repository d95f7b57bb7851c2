use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// A block produced by the local operator.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FarmedBlock {
    pub id: String,
    pub block_num: u64,
    pub time: i64,
    pub block_reward: f64,
    pub fee_reward: f64,
    pub reward_addr: String,
}

/// Keys blocks by id. Later entries replace earlier ones with the same id.
pub fn key_blocks(blocks: &[FarmedBlock]) -> BTreeMap<String, FarmedBlock> {
    let mut map = BTreeMap::new();
    for block in blocks {
        map.insert(block.id.clone(), block.clone());
    }
    map
}

#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Returns the persisted blocks. Read failures are logged and yield an empty list.
    async fn get_stored_blocks(&self) -> Vec<FarmedBlock>;
    /// Replaces the persisted map with `blocks` keyed by id.
    async fn store_blocks(&self, blocks: &[FarmedBlock]) -> Result<(), Error>;
    async fn clear(&self) -> Result<(), Error>;
}

pub struct FileBlockStore {
    path: PathBuf,
    lock: RwLock<()>,
}
impl FileBlockStore {
    pub const FILE_NAME: &'static str = "farmed_blocks.json";

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, FarmedBlock>, Error> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse {}: {e:?}", self.path.display()),
            )
        })
    }
}

#[async_trait]
impl BlockStorage for FileBlockStore {
    async fn get_stored_blocks(&self) -> Vec<FarmedBlock> {
        let _guard = self.lock.read().await;
        match self.read_map().await {
            Ok(map) => map.into_values().collect(),
            Err(e) => {
                error!("Failed to read stored blocks, using empty list: {e:?}");
                vec![]
            }
        }
    }

    async fn store_blocks(&self, blocks: &[FarmedBlock]) -> Result<(), Error> {
        let _guard = self.lock.write().await;
        let map = key_blocks(blocks);
        let json = serde_json::to_string(&map).map_err(Error::other)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Stored {} farmed blocks to {}", map.len(), self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        let _guard = self.lock.write().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No stored blocks to clear at {}", self.path.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<BTreeMap<String, FarmedBlock>>,
}
impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStorage for MemoryBlockStore {
    async fn get_stored_blocks(&self) -> Vec<FarmedBlock> {
        self.blocks.read().await.values().cloned().collect()
    }

    async fn store_blocks(&self, blocks: &[FarmedBlock]) -> Result<(), Error> {
        *self.blocks.write().await = key_blocks(blocks);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.blocks.write().await.clear();
        Ok(())
    }
}
