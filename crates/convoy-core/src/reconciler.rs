//! Status Reconciler - pulls authoritative run state from the platform.
//!
//! Best effort throughout: no platform, an unreachable platform, or an
//! unrecognized status all resolve to the last known local run.

use crate::broadcast::{publish_run, transition_line};
use crate::error::Result;
use crate::event_bus::EventBus;
use crate::platform::PlatformApi;
use crate::runs::{normalize_status, MetadataPatch, RunRegistry};
use crate::timeline::IncidentTimeline;
use chrono::Utc;
use convoy_store::{LogSource, Run};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Polls the platform and merges what it reports.
#[derive(Clone)]
pub struct Reconciler {
    registry: RunRegistry,
    timeline: IncidentTimeline,
    bus: EventBus,
    platform: Option<Arc<dyn PlatformApi>>,
}

impl Reconciler {
    /// Create a reconciler. `platform = None` makes every call a no-op.
    #[must_use]
    pub fn new(
        registry: RunRegistry,
        timeline: IncidentTimeline,
        bus: EventBus,
        platform: Option<Arc<dyn PlatformApi>>,
    ) -> Self {
        Self {
            registry,
            timeline,
            bus,
            platform,
        }
    }

    /// Whether a platform is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.platform.is_some()
    }

    /// Refresh one run from the platform.
    ///
    /// Terminal runs are returned without an outbound call. Platform
    /// failures are logged and the current run is returned.
    ///
    /// # Errors
    ///
    /// `RunNotFound` when the id is unknown, `Persistence` when the merge
    /// cannot be stored
    #[instrument(skip(self))]
    pub async fn reconcile(&self, run_id: &str) -> Result<Run> {
        let run = self.registry.get(run_id).await?;
        if run.status.is_terminal() {
            return Ok(run);
        }
        let Some(platform) = &self.platform else {
            return Ok(run);
        };

        let remote = match platform.run_status(run_id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Platform status unavailable, serving last known state");
                return Ok(run);
            }
        };

        let proposed = normalize_status(&remote.status);
        if proposed.is_none() {
            debug!(platform_status = %remote.status, "Unrecognized platform status");
        }
        let patch = MetadataPatch::new()
            .synced(Utc::now(), remote.status.clone())
            .result(remote.output.clone())
            .error(remote.error.clone());

        let outcome = self.registry.merge(run_id, proposed, patch).await?;
        if outcome.status_changed {
            self.narrate(&outcome.run).await;
        }
        if outcome.content_changed {
            let event = json!({
                "source": "reconciler",
                "platformStatus": remote.status,
            });
            publish_run(&self.bus, &outcome.run, &event).await;
        }
        Ok(outcome.run)
    }

    async fn narrate(&self, run: &Run) {
        let Some(incident_id) = run.incident_id() else {
            return;
        };
        let (message, level) = transition_line(run);
        if let Err(e) = self
            .timeline
            .append(incident_id, &message, LogSource::Orchestrator, level)
            .await
        {
            warn!(incident_id, error = %e, "Failed to narrate reconciled status");
        }
    }

    /// Reconcile up to `batch` live runs, oldest first.
    ///
    /// Returns how many were refreshed without error.
    pub async fn sweep(&self, batch: i64) -> usize {
        if self.platform.is_none() {
            return 0;
        }
        let runs = match self.registry.list_active(batch).await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(error = %e, "Sweep could not list active runs");
                return 0;
            }
        };

        let mut refreshed = 0;
        for run in runs {
            match self.reconcile(&run.run_id).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(run_id = %run.run_id, error = %e, "Sweep reconcile failed"),
            }
        }
        refreshed
    }

    /// Run [`Self::sweep`] every `interval` until `shutdown` fires.
    pub fn spawn_sweep(
        &self,
        interval: Duration,
        batch: i64,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let reconciler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), batch, "Reconcile sweep started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Reconcile sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let refreshed = reconciler.sweep(batch).await;
                        if refreshed > 0 {
                            debug!(refreshed, "Reconcile sweep pass");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests;
