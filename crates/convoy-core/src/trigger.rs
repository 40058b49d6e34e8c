//! Trigger dispatcher - starts platform work and registers the runs.
//!
//! Runs are created only after the platform accepts the request, under the
//! id the platform issued. Without a configured platform the dispatcher
//! runs in demo mode and mints a local `demo_` id instead.

use crate::broadcast::publish_run;
use crate::error::{Error, Result};
use crate::event_bus::EventBus;
use crate::platform::{PlatformApi, TriggerRequest};
use crate::runs::{normalize_status, RunRegistry};
use crate::timeline::IncidentTimeline;
use convoy_store::{LogLevel, LogSource, NewRun, Run, RunStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Request to start work for a domain object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCommand {
    /// Kind of object the run acts on, e.g. `incident`
    pub context_type: String,
    /// Id of that object
    pub context_id: String,
    /// Display name
    pub name: String,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Platform task; the configured default when absent
    #[serde(default)]
    pub task: Option<String>,
    /// Task input
    #[serde(default)]
    pub payload: Value,
}

impl TriggerCommand {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("contextType", &self.context_type),
            ("contextId", &self.context_id),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Task input with the context attached
    fn platform_payload(&self) -> Value {
        let mut payload = match &self.payload {
            Value::Object(map) => Value::Object(map.clone()),
            Value::Null => json!({}),
            other => json!({ "input": other }),
        };
        payload["contextType"] = json!(self.context_type);
        payload["contextId"] = json!(self.context_id);
        payload
    }
}

/// Starts runs on the platform (or in demo mode) and registers them.
#[derive(Clone)]
pub struct TriggerService {
    registry: RunRegistry,
    timeline: IncidentTimeline,
    bus: EventBus,
    platform: Option<Arc<dyn PlatformApi>>,
    default_task: String,
    callback_url: Option<String>,
}

impl TriggerService {
    /// Create a dispatcher. `platform = None` selects demo mode.
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
            default_task: String::new(),
            callback_url: None,
        }
    }

    /// Task used when a command names none
    #[must_use]
    pub fn with_default_task(mut self, task: impl Into<String>) -> Self {
        self.default_task = task.into();
        self
    }

    /// Webhook URL handed to the platform
    #[must_use]
    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Whether runs are simulated locally
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.platform.is_none()
    }

    /// Start work and register one run per id the platform issued.
    ///
    /// # Errors
    ///
    /// `Validation` for an incomplete command, `IncidentNotFound` for an
    /// unknown linked incident, `UpstreamUnavailable` when the platform
    /// rejects or cannot be reached (no run is created)
    #[instrument(skip(self, command), fields(context = %command.context_type, context_id = %command.context_id))]
    pub async fn trigger(&self, command: TriggerCommand) -> Result<Vec<Run>> {
        command.validate()?;
        if command.context_type == "incident" {
            self.timeline.incident(&command.context_id).await?;
        }

        let Some(platform) = &self.platform else {
            let run = self.register_demo(&command).await?;
            return Ok(vec![run]);
        };

        let task = command
            .task
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.default_task.clone());
        if task.trim().is_empty() {
            return Err(Error::Validation("task is required".to_string()));
        }

        let request = TriggerRequest {
            task,
            payload: command.platform_payload(),
            callback_url: self.callback_url.clone(),
        };
        let issued = platform.trigger(&request).await?;

        let mut runs = Vec::with_capacity(issued.len());
        for triggered in issued {
            let status = triggered
                .status
                .as_deref()
                .and_then(normalize_status)
                .filter(|s| !s.is_terminal())
                .unwrap_or(RunStatus::Pending);
            let new_run = NewRun::new(
                triggered.id.as_str(),
                command.context_type.as_str(),
                command.context_id.as_str(),
                command.name.as_str(),
            )
            .with_description(command.description.clone())
            .with_status(status)
            .with_platform_url(Some(platform.run_url(&triggered.id)));

            runs.push(self.register(new_run, "Started").await?);
        }
        Ok(runs)
    }

    async fn register_demo(&self, command: &TriggerCommand) -> Result<Run> {
        let run_id = format!("demo_{}", Uuid::new_v4().simple());
        info!(run_id = %run_id, "Platform not configured, registering demo run");
        let new_run = NewRun::new(
            run_id,
            command.context_type.as_str(),
            command.context_id.as_str(),
            command.name.as_str(),
        )
        .with_description(command.description.clone());
        self.register(new_run, "Started (demo mode)").await
    }

    async fn register(&self, new_run: NewRun, verb: &str) -> Result<Run> {
        let run = match self.registry.create(new_run.clone()).await {
            Ok(run) => run,
            // At-least-once triggering may hand back an id we already hold
            Err(Error::DuplicateRun(_)) => {
                warn!(run_id = %new_run.run_id, "Platform reissued a known run id");
                return self.registry.get(&new_run.run_id).await;
            }
            Err(e) => return Err(e),
        };

        if let Some(incident_id) = run.incident_id() {
            let message = format!("{verb}: {}", run.name);
            if let Err(e) = self
                .timeline
                .append(incident_id, &message, LogSource::Orchestrator, LogLevel::Info)
                .await
            {
                warn!(incident_id, error = %e, "Failed to narrate triggered run");
            }
        }
        publish_run(&self.bus, &run, &json!({ "source": "trigger" })).await;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::platform::{MockPlatformApi, TriggeredRun};
    use convoy_store::{NewIncident, SqliteStore};

    async fn service(platform: Option<MockPlatformApi>) -> (TriggerService, RunRegistry, EventBus) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let bus = EventBus::new(16);
        let registry = RunRegistry::new(store.clone());
        let timeline = IncidentTimeline::new(store, bus.clone());
        timeline
            .open(&NewIncident::new("Spoiled cargo").with_id("inc-7"))
            .await
            .unwrap();
        let service = TriggerService::new(
            registry.clone(),
            timeline,
            bus.clone(),
            platform.map(|p| Arc::new(p) as Arc<dyn PlatformApi>),
        )
        .with_default_task("resolve-incident")
        .with_callback_url(Some("https://convoy.example/api/webhooks/runs".to_string()));
        (service, registry, bus)
    }

    fn command() -> TriggerCommand {
        TriggerCommand {
            context_type: "incident".to_string(),
            context_id: "inc-7".to_string(),
            name: "Find cold storage".to_string(),
            description: None,
            task: None,
            payload: json!({"temperature": 9}),
        }
    }

    #[tokio::test]
    async fn test_trigger_registers_issued_runs() {
        let mut platform = MockPlatformApi::new();
        platform.expect_trigger().times(1).returning(|request| {
            assert_eq!(request.task, "resolve-incident");
            assert_eq!(request.payload["contextId"], "inc-7");
            assert_eq!(request.payload["temperature"], 9);
            assert_eq!(
                request.callback_url.as_deref(),
                Some("https://convoy.example/api/webhooks/runs")
            );
            Ok(vec![TriggeredRun {
                id: "run-42".to_string(),
                status: Some("QUEUED".to_string()),
            }])
        });
        platform
            .expect_run_url()
            .returning(|id| format!("https://platform.example/runs/{id}"));

        let (service, registry, bus) = service(Some(platform)).await;
        let mut sub = bus.subscribe(&[Channel::RunStatus]);
        let runs = service.trigger(command()).await.unwrap();

        assert_eq!(runs.len(), 1);
        let run = registry.get("run-42").await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(
            run.platform_url.as_deref(),
            Some("https://platform.example/runs/run-42")
        );
        assert_eq!(sub.recv().await.unwrap().payload["run"]["runId"], "run-42");
    }

    #[tokio::test]
    async fn test_upstream_failure_creates_nothing() {
        let mut platform = MockPlatformApi::new();
        platform
            .expect_trigger()
            .returning(|_| Err(Error::UpstreamUnavailable("503".to_string())));

        let (service, registry, _bus) = service(Some(platform)).await;
        let err = service.trigger(command()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
        assert!(registry.list(None, None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_demo_mode() {
        let (service, registry, _bus) = service(None).await;
        assert!(service.is_demo());

        let runs = service.trigger(command()).await.unwrap();
        assert!(runs[0].run_id.starts_with("demo_"));
        assert_eq!(runs[0].status, RunStatus::Pending);
        assert!(runs[0].platform_url.is_none());
        assert_eq!(registry.list(Some("incident"), Some("inc-7"), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_and_unknown_incident() {
        let (service, _registry, _bus) = service(None).await;

        let mut blank = command();
        blank.name = " ".to_string();
        assert!(matches!(service.trigger(blank).await, Err(Error::Validation(_))));

        let mut orphan = command();
        orphan.context_id = "inc-404".to_string();
        assert!(matches!(
            service.trigger(orphan).await,
            Err(Error::IncidentNotFound(_))
        ));
    }
}
