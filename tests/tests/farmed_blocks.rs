use farmdesk::FarmingEvent;
use farmdesk_core::blocks::{BlockStorage, FarmedBlock, FileBlockStore};
use farmdesk_tests::{
    block_hash, harness, our_address, produced_block, reward_event, Harness, MemoryConfigStore,
    OTHER_REWARD, OUR_REWARD,
};
use std::sync::atomic::Ordering;

async fn farming() -> Harness {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    assert!(h.controller.start_farmer("/plots", 1.0).await);
    h
}

#[tokio::test(start_paused = true)]
async fn test_block_reward_recorded() {
    let h = farming().await;
    h.client.add_block(
        produced_block(42, OUR_REWARD),
        vec![reward_event(5_000_000_000_000_000_000)],
    );
    let mut events = h.controller.events().subscribe();
    h.client.deliver_head(42).await.unwrap();

    let farmed = h.controller.farmed_blocks().await;
    assert_eq!(farmed.len(), 1);
    assert_eq!(farmed[0].id, block_hash(42));
    assert_eq!(farmed[0].block_num, 42);
    assert_eq!(farmed[0].block_reward, 5.00);
    assert_eq!(farmed[0].fee_reward, 0.0);
    assert_eq!(farmed[0].reward_addr, our_address());
    assert_eq!(h.blocks.get_stored_blocks().await, farmed);

    match events.recv().await.unwrap() {
        FarmingEvent::FarmedBlock(block) => assert_eq!(block.block_num, 42),
        other => panic!("Expected farmed block, got {other:?}"),
    }
    assert_eq!(events.recv().await.unwrap(), FarmingEvent::NewBlock(42));
    assert_eq!(h.controller.snapshot().await.network.synced_at_num, 42);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_head_kept_twice_in_memory() {
    let h = farming().await;
    h.client.add_block(produced_block(7, OUR_REWARD), vec![]);
    h.client.deliver_head(7).await.unwrap();
    h.client.deliver_head(7).await.unwrap();
    assert_eq!(h.controller.farmed_blocks().await.len(), 2);
    assert_eq!(h.blocks.get_stored_blocks().await.len(), 1);
    assert_eq!(h.log.count("store_blocks"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_other_producer_only_updates_height() {
    let h = farming().await;
    h.client.add_block(produced_block(8, OTHER_REWARD), vec![]);
    let mut events = h.controller.events().subscribe();
    h.client.deliver_head(8).await.unwrap();
    assert!(h.controller.farmed_blocks().await.is_empty());
    assert_eq!(h.log.count("store_blocks"), 0);
    assert_eq!(events.recv().await.unwrap(), FarmingEvent::NewBlock(8));
    assert_eq!(h.controller.snapshot().await.network.synced_at_num, 8);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_events_record_zero_reward() {
    let h = farming().await;
    h.client.fail_events.store(true, Ordering::SeqCst);
    h.client.add_block(
        produced_block(9, OUR_REWARD),
        vec![reward_event(5_000_000_000_000_000_000)],
    );
    h.client.deliver_head(9).await.unwrap();
    assert_eq!(h.controller.farmed_blocks().await[0].block_reward, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_head_is_skipped() {
    let h = farming().await;
    assert!(h.client.deliver_head(99).await.is_err());
    assert!(h.controller.farmed_blocks().await.is_empty());
    assert!(h.client.has_handler());
}

#[tokio::test(start_paused = true)]
async fn test_stored_blocks_loaded_once_newest_first() {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "node-1"));
    let stored: Vec<FarmedBlock> = [3u64, 11, 5]
        .iter()
        .map(|n| FarmedBlock {
            id: block_hash(*n),
            block_num: *n,
            ..Default::default()
        })
        .collect();
    h.blocks.store_blocks(&stored).await.unwrap();
    assert!(h.controller.update_from_config().await);
    h.controller.load_stored_blocks().await;
    let nums: Vec<u64> = h
        .controller
        .farmed_blocks()
        .await
        .iter()
        .map(|b| b.block_num)
        .collect();
    assert_eq!(nums, vec![11, 5, 3]);
}

#[tokio::test]
async fn test_file_store_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileBlockStore::in_dir(dir.path());
    let first = FarmedBlock {
        id: "0xaa".to_string(),
        block_num: 1,
        block_reward: 1.0,
        ..Default::default()
    };
    let second = FarmedBlock {
        block_reward: 2.5,
        ..first.clone()
    };
    let other = FarmedBlock {
        id: "0xbb".to_string(),
        block_num: 2,
        ..Default::default()
    };
    store
        .store_blocks(&[first, other.clone(), second.clone()])
        .await
        .unwrap();
    let mut stored = store.get_stored_blocks().await;
    stored.sort_by_key(|b| b.block_num);
    assert_eq!(stored, vec![second, other]);
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["0xaa"]["blockReward"], 2.5);
}
