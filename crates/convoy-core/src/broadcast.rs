//! Best-effort broadcast helpers shared by the write paths.
//!
//! The store is authoritative; a failed publish only delays what viewers
//! see, so failures are logged and dropped here.

use crate::channels::Channel;
use crate::event_bus::EventBus;
use convoy_store::{LogLevel, Run, RunStatus};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Publish and swallow transport failures. Returns whether it went out.
pub(crate) async fn publish_best_effort<T: Serialize + ?Sized>(
    bus: &EventBus,
    channel: Channel,
    payload: &T,
) -> bool {
    match bus.publish(channel, payload).await {
        Ok(_) => true,
        Err(e) => {
            warn!(%channel, error = %e, "Broadcast failed, registry remains authoritative");
            false
        }
    }
}

/// Publish a run change on `run-status` as `{run, event}`.
pub(crate) async fn publish_run(bus: &EventBus, run: &Run, event: &serde_json::Value) -> bool {
    publish_best_effort(bus, Channel::RunStatus, &json!({ "run": run, "event": event })).await
}

/// Natural-language line for a run that just moved to its current status.
pub(crate) fn transition_line(run: &Run) -> (String, LogLevel) {
    let name = &run.name;
    match run.status {
        RunStatus::Pending => (format!("{name} is queued"), LogLevel::Info),
        RunStatus::Running => (format!("{name} is now running"), LogLevel::Info),
        RunStatus::Completed => (format!("{name} completed"), LogLevel::Success),
        RunStatus::Failed => match run.metadata.error.as_ref().and_then(|e| e.as_str()) {
            Some(reason) => (format!("{name} failed: {reason}"), LogLevel::Error),
            None => (format!("{name} failed"), LogLevel::Error),
        },
        RunStatus::Canceled => (format!("{name} was canceled"), LogLevel::Warning),
    }
}
