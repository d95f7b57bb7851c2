use farmdesk::{FarmingEvent, FarmingStatus};
use farmdesk_core::chain::SyncState;
use farmdesk_core::errors::{
    NODE_CONNECTION_LOST, START_FARMER_FAILED, START_NODE_FAILED, START_NODE_MISSING_PARAMS,
};
use farmdesk_tests::{harness, MemoryConfigStore};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_start_node_missing_params() {
    let h = harness(MemoryConfigStore::default());
    for (name, path) in [("", "/plots"), ("node", "")] {
        assert!(!h.controller.start_node(name, path).await);
        assert_eq!(h.controller.status().await, FarmingStatus::Idle);
        let error = h.controller.error().await;
        assert_eq!(error.title, START_NODE_FAILED);
        assert_eq!(error.message, START_NODE_MISSING_PARAMS);
    }
    assert_eq!(h.log.count("start_node"), 0);
    assert_eq!(h.log.count("connect"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_node_waits_then_connects() {
    let h = harness(MemoryConfigStore::default());
    let mut events = h.controller.events().subscribe();
    let started = Instant::now();
    assert!(h.controller.start_node("node-1", "/plots").await);
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(h.log.calls()[..2], ["start_node", "connect"]);
    assert_eq!(h.controller.status().await, FarmingStatus::Syncing);
    assert_eq!(h.controller.snapshot().await.network.peers, 8);
    assert_eq!(
        events.recv().await.unwrap(),
        FarmingEvent::StatusChanged(FarmingStatus::StartingNode)
    );
    assert_eq!(
        events.recv().await.unwrap(),
        FarmingEvent::StatusChanged(FarmingStatus::Syncing)
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_node_failure_keeps_status() {
    let h = harness(MemoryConfigStore::default());
    h.client.fail_connect.store(true, Ordering::SeqCst);
    assert!(!h.controller.start_node("node-1", "/plots").await);
    assert_eq!(h.controller.status().await, FarmingStatus::StartingNode);
    let error = h.controller.error().await;
    assert_eq!(error.title, START_NODE_FAILED);
    assert_eq!(error.message, "connect failed");
    assert_eq!(h.controller.recent_errors().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sync_state_retries_exhausted() {
    let h = harness(MemoryConfigStore::complete("/plots", 10.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    h.client.script_syncing(&[true]);
    h.client.fail_sync_state.store(true, Ordering::SeqCst);
    assert!(!h.controller.start_farmer("/plots", 10.0).await);
    assert_eq!(h.log.count("get_sync_state"), 5);
    assert_eq!(h.log.count("is_syncing"), 1);
    assert_eq!(h.controller.error().await.title, START_FARMER_FAILED);
    assert_eq!(h.controller.status().await, FarmingStatus::Syncing);
    assert!(!h.controller.has_subscription().await);
    assert_eq!(h.log.count("subscribe_new_heads"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_connection_resubscribes() {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    assert!(h.controller.start_node("node-1", "/plots").await);
    assert!(h.controller.start_farmer("/plots", 1.0).await);
    assert!(h.controller.check_node_connection().await);
    assert_eq!(h.log.count("subscribe_new_heads"), 1);

    h.client.drop_connection();
    h.client.fail_connect.store(true, Ordering::SeqCst);
    assert!(!h.controller.check_node_connection().await);
    assert!(!h.controller.has_subscription().await);
    assert_eq!(h.controller.error().await.title, NODE_CONNECTION_LOST);
    assert_eq!(h.controller.status().await, FarmingStatus::Farming);

    h.client.fail_connect.store(false, Ordering::SeqCst);
    assert!(h.controller.check_node_connection().await);
    assert!(h.controller.has_subscription().await);
    assert!(h.client.has_handler());
    assert_eq!(h.log.count("subscribe_new_heads"), 2);
    // A later start is refused again since the fresh subscription is live.
    assert!(!h.controller.start_farmer("/plots", 1.0).await);
    assert_eq!(h.log.count("subscribe_new_heads"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sync_polls_then_farms() {
    let h = harness(MemoryConfigStore::complete("/plots", 10.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    h.client.script_syncing(&[true, true, false]);
    h.client.set_sync_state(SyncState {
        starting_block: 0,
        current_block: 50,
        highest_block: 100,
    });
    let started = Instant::now();
    assert!(h.controller.start_farmer("/plots", 10.0).await);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(h.log.count("is_syncing"), 3);
    assert_eq!(h.log.count("get_sync_state"), 2);
    assert_eq!(h.controller.status().await, FarmingStatus::Farming);
    assert!(h.controller.has_subscription().await);
    assert!(h.client.has_handler());
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.plot.finished_gb, 5.00);
    assert_eq!(snapshot.sync_state.current_block, 50);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_node_reports_full_plot() {
    let h = harness(MemoryConfigStore::complete("/plots", 20.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    h.client.script_syncing(&[true, false]);
    assert!(h.controller.start_farmer("/plots", 20.0).await);
    assert_eq!(h.controller.snapshot().await.plot.finished_gb, 20.00);
}

#[tokio::test(start_paused = true)]
async fn test_second_subscription_refused() {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "node-1"));
    assert!(h.controller.update_from_config().await);
    assert!(h.controller.start_farmer("/plots", 1.0).await);
    assert!(!h.controller.start_farmer("/plots", 1.0).await);
    assert_eq!(h.log.count("subscribe_new_heads"), 1);
    assert_eq!(h.controller.error().await.title, START_FARMER_FAILED);
    assert_eq!(h.controller.status().await, FarmingStatus::Farming);
}

#[tokio::test(start_paused = true)]
async fn test_start_farming_failure() {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "node-1"));
    h.client.fail_start_farming.store(true, Ordering::SeqCst);
    assert!(!h.controller.start_farmer("/plots", 1.0).await);
    assert_eq!(h.log.count("is_syncing"), 0);
    assert_eq!(h.controller.status().await, FarmingStatus::Idle);
    assert_eq!(h.controller.error().await.title, START_FARMER_FAILED);
    assert!(!h.controller.has_subscription().await);
}
