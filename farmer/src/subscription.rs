use crate::events::{EventBus, FarmingEvent};
use crate::state::FarmingState;
use async_trait::async_trait;
use farmdesk_clients::api::{NewHeadHandler, NodeClient};
use farmdesk_core::address::AccountId;
use farmdesk_core::blocks::{BlockStorage, FarmedBlock};
use farmdesk_core::chain::Header;
use farmdesk_core::digest::find_pre_digest;
use farmdesk_core::rewards::{decode_reward_amount, find_block_reward};
use log::{debug, error, info, warn};
use std::io::Error;
use std::sync::Arc;
use time::OffsetDateTime;

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Checks every new head for blocks produced with our reward address and records them.
pub struct FarmedBlockHandler {
    client: Arc<dyn NodeClient>,
    store: Arc<dyn BlockStorage>,
    state: Arc<FarmingState>,
    events: EventBus,
    reward_account: AccountId,
    reward_address: String,
}
impl FarmedBlockHandler {
    pub fn new(
        client: Arc<dyn NodeClient>,
        store: Arc<dyn BlockStorage>,
        state: Arc<FarmingState>,
        events: EventBus,
        reward_address: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            client,
            store,
            state,
            events,
            reward_account: reward_address.parse()?,
            reward_address: reward_address.to_string(),
        })
    }

    async fn block_reward(&self, hash: &str) -> f64 {
        match self.client.get_events(hash).await {
            Ok(events) => find_block_reward(&events)
                .map(decode_reward_amount)
                .unwrap_or(0.0),
            Err(e) => {
                warn!("Failed to read events for {hash}, recording zero reward: {e}");
                0.0
            }
        }
    }

    async fn record(&self, block: FarmedBlock) {
        let farmed = {
            let mut farmed = self.state.farmed.write().await;
            farmed.insert(0, block.clone());
            farmed.clone()
        };
        if let Err(e) = self.store.store_blocks(&farmed).await {
            error!("Failed to persist farmed blocks: {e}");
        }
        info!(
            "Farmed block {} ({}) reward {:.2}",
            block.block_num, block.id, block.block_reward
        );
        self.events.emit(FarmingEvent::FarmedBlock(block));
    }
}

#[async_trait]
impl NewHeadHandler for FarmedBlockHandler {
    async fn on_new_head(&self, header: Header) -> Result<(), Error> {
        let number = header.number;
        let hash = self.client.get_block_hash(Some(number)).await?;
        let block = self.client.get_block(Some(&hash)).await?;
        let pre_digest = find_pre_digest(&block.block.header)?;
        if pre_digest.solution.reward_address == self.reward_account {
            let block_reward = self.block_reward(&hash).await;
            self.record(FarmedBlock {
                id: hash,
                block_num: number,
                time: now_millis(),
                block_reward,
                fee_reward: 0.0,
                reward_addr: self.reward_address.clone(),
            })
            .await;
        } else {
            debug!(
                "Block {number} produced by {}",
                pre_digest.solution.reward_address
            );
        }
        self.state.network.write().await.synced_at_num = number;
        self.events.emit(FarmingEvent::NewBlock(number));
        Ok(())
    }
}
