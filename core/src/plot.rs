use crate::chain::SyncState;
use crate::rewards::to_fixed;

pub const GB: u64 = 1024 * 1024 * 1024;

pub fn gb_to_bytes(size_gb: f64) -> u64 {
    if !size_gb.is_finite() || size_gb <= 0.0 {
        return 0;
    }
    (size_gb * GB as f64).round() as u64
}

/// Estimates how much of the plot is finished from the node's sync progress.
/// Missing block heights count as 1 so a fresh node reports the full plot size.
pub fn finished_gb(state: &SyncState, plot_size_gb: f64) -> f64 {
    let current = state.current_block.max(1) as f64;
    let highest = state.highest_block.max(1) as f64;
    to_fixed(current * plot_size_gb / highest, 2)
}
