//! Incident Timeline Logger - the one write path for incident narration.
//!
//! Every entry is stored first, then broadcast on `incident-log`. A failed
//! broadcast is logged and swallowed; the stored entry stands.

use crate::broadcast::publish_best_effort;
use crate::channels::Channel;
use crate::error::Result;
use crate::event_bus::EventBus;
use convoy_store::{Incident, IncidentLogEntry, IncidentStatus, IncidentStore, LogLevel, LogSource, NewIncident};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Append-only incident narration with broadcast.
#[derive(Clone)]
pub struct IncidentTimeline {
    store: Arc<dyn IncidentStore>,
    bus: EventBus,
}

impl IncidentTimeline {
    /// Create a timeline over `store`, publishing on `bus`
    #[must_use]
    pub fn new(store: Arc<dyn IncidentStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Write a narration line and broadcast it as `{incidentId, log}`.
    ///
    /// # Errors
    ///
    /// `IncidentNotFound` when the incident does not exist
    #[instrument(skip(self, message))]
    pub async fn append(
        &self,
        incident_id: &str,
        message: &str,
        source: LogSource,
        status: LogLevel,
    ) -> Result<IncidentLogEntry> {
        let entry = self
            .store
            .append_log(incident_id, message, &source, status)
            .await?;

        let payload = json!({ "incidentId": incident_id, "log": &entry });
        publish_best_effort(&self.bus, Channel::IncidentLog, &payload).await;
        Ok(entry)
    }

    /// Open a new incident
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn open(&self, incident: &NewIncident) -> Result<Incident> {
        let incident = self.store.create_incident(incident).await?;
        info!(incident_id = %incident.id, "Incident opened");
        Ok(incident)
    }

    /// Fetch an incident
    ///
    /// # Errors
    ///
    /// `IncidentNotFound` when the incident does not exist
    pub async fn incident(&self, incident_id: &str) -> Result<Incident> {
        Ok(self.store.get_incident(incident_id).await?)
    }

    /// Narration in display order
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn entries(&self, incident_id: &str) -> Result<Vec<IncidentLogEntry>> {
        Ok(self.store.list_logs(incident_id).await?)
    }

    /// Apply a resolution signal.
    ///
    /// Only the first signal moves an active incident; later ones return the
    /// incident unchanged and publish nothing. The transition is narrated and
    /// broadcast on `incident-status`.
    ///
    /// # Errors
    ///
    /// `IncidentNotFound` when the incident does not exist
    #[instrument(skip(self))]
    pub async fn resolve(&self, incident_id: &str, status: IncidentStatus) -> Result<Incident> {
        let (incident, transitioned) = self.store.resolve_incident(incident_id, status).await?;
        if !transitioned {
            return Ok(incident);
        }
        info!(status = %incident.status, "Incident resolved");

        let (message, level) = match incident.status {
            IncidentStatus::Failed => ("Incident closed as failed", LogLevel::Error),
            _ => ("Incident resolved", LogLevel::Success),
        };
        self.append(incident_id, message, LogSource::System, level).await?;

        let payload = json!({
            "incidentId": incident_id,
            "status": incident.status,
            "incident": &incident,
        });
        publish_best_effort(&self.bus, Channel::IncidentStatus, &payload).await;
        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_store::SqliteStore;

    async fn timeline() -> (IncidentTimeline, EventBus) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let bus = EventBus::new(16);
        (IncidentTimeline::new(store, bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_append_stores_then_publishes() {
        let (timeline, bus) = timeline().await;
        timeline
            .open(&NewIncident::new("Reefer failure").with_id("inc-7"))
            .await
            .unwrap();
        let mut sub = bus.subscribe(&[Channel::IncidentLog]);

        let entry = timeline
            .append("inc-7", "Calling backup carrier", LogSource::agent("dispatcher"), LogLevel::Info)
            .await
            .unwrap();

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.payload["incidentId"], "inc-7");
        assert_eq!(msg.payload["log"]["message"], "Calling backup carrier");
        assert_eq!(msg.payload["log"]["source"], "AGENT:dispatcher");

        let entries = timeline.entries("inc-7").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry.id);
    }

    #[tokio::test]
    async fn test_append_unknown_incident() {
        let (timeline, bus) = timeline().await;
        let mut sub = bus.subscribe(&[Channel::IncidentLog]);

        let err = timeline
            .append("nope", "hello", LogSource::System, LogLevel::Info)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::IncidentNotFound(_)));
        assert!(sub.unsubscribe());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let (timeline, bus) = timeline().await;
        timeline
            .open(&NewIncident::new("Late delivery").with_id("inc-1"))
            .await
            .unwrap();
        let mut sub = bus.subscribe(&[Channel::IncidentStatus]);

        let resolved = timeline.resolve("inc-1", IncidentStatus::Resolved).await.unwrap();
        assert_eq!(resolved.status, IncidentStatus::Resolved);
        assert_eq!(sub.recv().await.unwrap().payload["status"], "RESOLVED");

        let again = timeline.resolve("inc-1", IncidentStatus::Failed).await.unwrap();
        assert_eq!(again.status, IncidentStatus::Resolved);
        assert_eq!(timeline.entries("inc-1").await.unwrap().len(), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv())
            .await
            .is_err());
    }
}
