//! Background task startup functions

use super::config::AppConfig;
use convoy_core::{Reconciler, ShutdownController};
use std::time::Duration;
use tracing::info;

/// Start the periodic reconcile sweep over active runs
pub fn start_reconcile_sweep(
    config: &AppConfig,
    reconciler: &Reconciler,
    shutdown_controller: &ShutdownController,
) {
    if !reconciler.is_enabled() {
        info!("Reconcile sweep disabled, no platform configured");
        return;
    }
    if config.reconciler.sweep_interval_secs == 0 {
        info!("Reconcile sweep disabled by configuration");
        return;
    }

    let handle = reconciler.spawn_sweep(
        Duration::from_secs(config.reconciler.sweep_interval_secs),
        config.reconciler.sweep_batch.max(1),
        shutdown_controller.token(),
    );
    shutdown_controller.track(handle);
}
