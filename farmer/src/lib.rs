pub mod controller;
pub mod events;
pub mod state;
pub mod subscription;
pub mod sync_monitor;

pub use controller::{Controller, ControllerConfig};
pub use events::{EventBus, FarmingEvent};
pub use state::{FarmingSnapshot, FarmingState, FarmingStatus, NetworkState, PlotState};

fn _version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
fn _pkg_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn version() -> String {
    format!("{}: {}", _pkg_name(), _version())
}

#[test]
fn test_version() {
    println!("{}", version());
}
