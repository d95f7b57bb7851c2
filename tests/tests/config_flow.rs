use farmdesk::FarmingStatus;
use farmdesk_core::config::{AppConfigStore, ConfigUpdate, FileConfigStore, Plot};
use farmdesk_core::errors::{CONFIG_READ_FAILED, CONFIG_UPDATE_FAILED};
use farmdesk_tests::{harness, our_address, MemoryConfigStore};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_confirm_setup_updates_in_order() {
    let store = MemoryConfigStore::default();
    store.init().await.unwrap();
    let h = harness(store);
    assert!(
        h.controller
            .confirm_plotting_setup("node-1", "/plots", 12.5, &our_address())
            .await
    );
    assert_eq!(
        h.config.applied(),
        vec![
            ConfigUpdate::node_name("node-1"),
            ConfigUpdate::plot_and_reward("/plots", 12.5, our_address()),
        ]
    );
    let saved = h.config.current().unwrap();
    assert!(saved.is_valid());
    assert_eq!(
        saved.plot,
        Plot {
            location: "/plots".to_string(),
            size_gb: 12.5
        }
    );
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.plot.plot_size_gb, 12.5);
    assert_eq!(snapshot.node_name, "node-1");
}

#[tokio::test]
async fn test_confirm_setup_failure_sets_error() {
    let h = harness(MemoryConfigStore::default());
    h.config.fail_update.store(true, Ordering::SeqCst);
    assert!(
        !h.controller
            .confirm_plotting_setup("node-1", "/plots", 1.0, &our_address())
            .await
    );
    let error = h.controller.error().await;
    assert_eq!(error.title, CONFIG_UPDATE_FAILED);
    assert_eq!(error.message, "config read only");
    assert!(h.config.applied().is_empty());
    assert_eq!(h.controller.status().await, FarmingStatus::Idle);
}

#[tokio::test]
async fn test_update_from_config_read_failure() {
    let h = harness(MemoryConfigStore::complete("/plots", 3.0, "node-1"));
    h.config.fail_read.store(true, Ordering::SeqCst);
    assert!(!h.controller.update_from_config().await);
    assert_eq!(h.controller.error().await.title, CONFIG_READ_FAILED);
    assert_eq!(h.controller.snapshot().await.plot.plot_path, "/");

    h.config.fail_read.store(false, Ordering::SeqCst);
    h.controller.clear_error().await;
    assert!(h.controller.update_from_config().await);
    let snapshot = h.controller.snapshot().await;
    assert!(!snapshot.error.is_set());
    assert_eq!(snapshot.plot.plot_path, "/plots");
    assert_eq!(snapshot.plot.plot_size_gb, 3.0);
    assert_eq!(snapshot.reward_address, our_address());
}

#[tokio::test]
async fn test_set_node_name_persists() {
    let h = harness(MemoryConfigStore::complete("/plots", 1.0, "old-name"));
    assert!(h.controller.set_node_name("new-name").await);
    assert_eq!(h.config.current().unwrap().node_name, "new-name");
    assert_eq!(h.config.current().unwrap().plot.location, "/plots");
}

#[tokio::test]
async fn test_file_config_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path(), "farmdesk");
    assert!(store.read().await.is_err());
    store.init().await.unwrap();
    assert!(store.path().ends_with("farmdesk/farmdesk.cfg"));
    assert!(!store.validate().await.unwrap());
    store
        .update(ConfigUpdate::plot_and_reward("/plots", 2.456, our_address()))
        .await
        .unwrap();
    store.update(ConfigUpdate::node_name("node-1")).await.unwrap();
    let config = store.read().await.unwrap();
    assert_eq!(config.plot.size_gb, 2.46);
    assert!(config.launch_on_boot);
    assert!(store.validate().await.unwrap());
    store.remove().await.unwrap();
    assert!(!store.path().exists());
}
