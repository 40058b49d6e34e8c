use super::payload::{AgentEvent, PlatformEvent, PlatformEventKind, WebhookEvent};
use super::stages::{stage_effect, OrderMutation, StageEffect};
use crate::broadcast::{publish_best_effort, publish_run, transition_line};
use crate::channels::Channel;
use crate::error::Result;
use crate::event_bus::EventBus;
use crate::runs::{MergeOutcome, MetadataPatch, RunRegistry};
use crate::timeline::IncidentTimeline;
use chrono::Utc;
use convoy_store::{LogLevel, LogSource, RecordStore, Run, RunLogRecord, RunStatus};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one accepted webhook
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    /// Run the webhook targeted
    pub run_id: String,
    /// Status after the merge
    pub status: RunStatus,
    /// Whether the status moved
    pub status_changed: bool,
    /// Whether anything was written (false for a duplicate delivery)
    pub changed: bool,
    /// The merged run
    #[serde(skip)]
    pub run: Run,
}

impl From<MergeOutcome> for WebhookOutcome {
    fn from(outcome: MergeOutcome) -> Self {
        Self {
            run_id: outcome.run.run_id.clone(),
            status: outcome.run.status,
            status_changed: outcome.status_changed,
            changed: outcome.changed,
            run: outcome.run,
        }
    }
}

/// Translates inbound pushes into registry merges, narration and broadcasts.
///
/// Per webhook the order is fixed: merge, then timeline, then publish. Once
/// the merge commits, neither a failed narration nor a failed publish undoes
/// it or skips the steps after it.
#[derive(Clone)]
pub struct WebhookGateway {
    registry: RunRegistry,
    timeline: IncidentTimeline,
    records: Arc<dyn RecordStore>,
    bus: EventBus,
}

impl WebhookGateway {
    /// Create a gateway
    #[must_use]
    pub fn new(
        registry: RunRegistry,
        timeline: IncidentTimeline,
        records: Arc<dyn RecordStore>,
        bus: EventBus,
    ) -> Self {
        Self {
            registry,
            timeline,
            records,
            bus,
        }
    }

    /// Parse a raw body and handle it
    ///
    /// # Errors
    ///
    /// See [`WebhookEvent::parse`] and [`Self::handle`]
    pub async fn ingest(&self, body: &[u8]) -> Result<WebhookOutcome> {
        let event = WebhookEvent::parse(body)?;
        self.handle(event).await
    }

    /// Apply one webhook.
    ///
    /// # Errors
    ///
    /// `RunNotFound` / `IncidentNotFound` before any state change when the
    /// run or its incident is unknown; `Persistence` when the merge fails
    #[instrument(skip(self, event), fields(run_id = %event.run_id()))]
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        let run = self.registry.get(event.run_id()).await?;
        if let Some(incident_id) = run.incident_id() {
            self.timeline.incident(incident_id).await?;
        }

        match event {
            WebhookEvent::Platform(event) => self.handle_platform(event).await,
            WebhookEvent::Agent(event) => self.handle_agent(&run, event).await,
        }
    }

    async fn handle_platform(&self, event: PlatformEvent) -> Result<WebhookOutcome> {
        let kind = event.kind();
        let mut patch = MetadataPatch::new();
        match &kind {
            PlatformEventKind::Log => {
                patch = patch.log(log_record(
                    event.log_message(),
                    event.log_level(),
                    &event.data,
                    event.timestamp.clone(),
                ));
            }
            PlatformEventKind::Running => {}
            PlatformEventKind::Completed => patch = patch.result(event.result()),
            PlatformEventKind::Failed => patch = patch.error(event.error()),
            PlatformEventKind::Other(event_type) => {
                warn!(event_type = %event_type, "Unknown platform event type, recording as metadata only");
                patch = patch.log(log_record(
                    format!("platform event: {event_type}"),
                    LogLevel::Info,
                    &event.data,
                    event.timestamp.clone(),
                ));
            }
        }

        let outcome = self
            .registry
            .merge(&event.run_id, kind.proposed_status(), patch)
            .await?;
        if !outcome.changed {
            debug!(event_type = %event.event_type, "Duplicate webhook, nothing to do");
            return Ok(outcome.into());
        }

        if outcome.status_changed {
            let (line, level) = transition_line(&outcome.run);
            self.narrate(&outcome.run, &line, LogSource::Orchestrator, level).await;
        } else if kind == PlatformEventKind::Log && outcome.logs_appended > 0 {
            self.narrate(&outcome.run, &event.log_message(), LogSource::Orchestrator, event.log_level())
                .await;
        }

        let raw = json!({
            "source": "platform",
            "run_id": event.run_id,
            "event_type": event.event_type,
            "data": event.data,
            "timestamp": event.timestamp,
        });
        publish_run(&self.bus, &outcome.run, &raw).await;
        Ok(outcome.into())
    }

    async fn handle_agent(&self, run: &Run, event: AgentEvent) -> Result<WebhookOutcome> {
        let proposed = event.proposed_status();
        let details = json!({
            "stage": event.stage,
            "status": event.status,
            "data": event.data,
        });
        let record = RunLogRecord::new(event.narration(), event.log_level())
            .with_data(details)
            .reported_at(event.timestamp.clone());

        let mut patch = MetadataPatch::new().log(record);
        match proposed {
            Some(RunStatus::Completed) => patch = patch.result(event.data.get("result").cloned()),
            Some(RunStatus::Failed) => {
                let error = event
                    .data
                    .get("error")
                    .cloned()
                    .or_else(|| event.reasoning.clone().map(Value::String));
                patch = patch.error(error);
            }
            _ => {}
        }

        let outcome = self.registry.merge(&event.run_id, proposed, patch).await?;
        if !outcome.changed {
            debug!(stage = %event.stage, "Duplicate agent event, nothing to do");
            return Ok(outcome.into());
        }

        let source = LogSource::agent(event.role());
        if outcome.logs_appended > 0 {
            self.narrate(&outcome.run, &event.narration(), source, event.log_level())
                .await;
        }
        if outcome.status_changed {
            let (line, level) = transition_line(&outcome.run);
            self.narrate(&outcome.run, &line, LogSource::Orchestrator, level).await;
        }

        let raw = json!({
            "source": "agent",
            "run_id": event.run_id,
            "stage": event.stage,
            "status": event.status,
            "reasoning": event.reasoning,
            "ui_action": event.ui_action,
            "data": event.data,
            "timestamp": event.timestamp,
        });
        publish_run(&self.bus, &outcome.run, &raw).await;
        publish_best_effort(&self.bus, Channel::AgentProgress, &raw).await;

        if let Some(action) = event.ui_action.as_deref() {
            match action.parse::<Channel>() {
                Ok(channel) => {
                    publish_best_effort(&self.bus, channel, &event.data).await;
                }
                Err(_) => warn!(ui_action = %action, "ui_action names no known channel"),
            }
        }

        if let Err(e) = self.apply_stage(run, &event).await {
            warn!(stage = %event.stage, error = %e, "Stage side effect failed");
        }
        Ok(outcome.into())
    }

    /// The merge is already committed, so a timeline failure is logged and
    /// the broadcast still goes out
    async fn narrate(&self, run: &Run, message: &str, source: LogSource, level: LogLevel) {
        let Some(incident_id) = run.incident_id() else {
            return;
        };
        if let Err(e) = self.timeline.append(incident_id, message, source, level).await {
            warn!(incident_id, error = %e, "Failed to narrate run update");
        }
    }

    async fn apply_stage(&self, run: &Run, event: &AgentEvent) -> Result<()> {
        let Some(effect) = stage_effect(&event.stage) else {
            return Ok(());
        };

        match effect {
            StageEffect::Order(mutation) => {
                let Some(order_id) = self.linked_order(run, event).await else {
                    warn!(stage = %event.stage, "No order linked to stage, skipping mutation");
                    return Ok(());
                };
                self.mutate_order(&order_id, mutation, event).await
            }
            StageEffect::ResolveIncident(status) => {
                match run.incident_id() {
                    Some(incident_id) => {
                        self.timeline.resolve(incident_id, status).await?;
                    }
                    None => warn!(stage = %event.stage, "Run has no incident to resolve"),
                }
                Ok(())
            }
        }
    }

    async fn mutate_order(&self, order_id: &str, mutation: OrderMutation, event: &AgentEvent) -> Result<()> {
        let mut patch = Map::new();
        if let Some(status) = mutation.status {
            patch.insert("status".to_string(), json!(status));
        }
        if let Some(status) = mutation.supplier_status {
            patch.insert("supplierStatus".to_string(), json!(status));
        }
        if mutation.carrier_from_data {
            if let Some(carrier) = event.data.get("carrier") {
                patch.insert("carrier".to_string(), carrier.clone());
            }
        }
        patch.insert("updatedAt".to_string(), json!(Utc::now()));

        let order = self.records.patch_record("order", order_id, &patch).await?;
        info!(order_id, stage = %event.stage, "Order updated by agent stage");

        publish_best_effort(
            &self.bus,
            Channel::OrderUpdated,
            &json!({ "orderId": order_id, "stage": event.stage, "order": order }),
        )
        .await;
        if mutation.affects_shipment {
            publish_best_effort(
                &self.bus,
                Channel::ShipmentUpdated,
                &json!({
                    "orderId": order_id,
                    "runId": event.run_id,
                    "stage": event.stage,
                    "status": mutation.status,
                }),
            )
            .await;
        }
        Ok(())
    }

    /// Order an agent stage applies to: explicit in the event, the run's own
    /// context, the shipment's order, or the incident's order.
    async fn linked_order(&self, run: &Run, event: &AgentEvent) -> Option<String> {
        if let Some(order_id) = event.order_id() {
            return Some(order_id.to_string());
        }
        match run.context_type.as_str() {
            "order" => return Some(run.context_id.clone()),
            "shipment" => {
                if let Ok(shipment) = self.records.get_record("shipment", &run.context_id).await {
                    let order_id = ["orderId", "order_id"]
                        .iter()
                        .find_map(|key| shipment.get(key).and_then(Value::as_str));
                    if let Some(order_id) = order_id {
                        return Some(order_id.to_string());
                    }
                }
            }
            _ => {}
        }
        let incident_id = run.incident_id()?;
        self.timeline.incident(incident_id).await.ok()?.order_id
    }
}

fn log_record(message: String, level: LogLevel, data: &Value, timestamp: Option<String>) -> RunLogRecord {
    let record = RunLogRecord::new(message, level).reported_at(timestamp);
    if data.is_null() {
        record
    } else {
        record.with_data(data.clone())
    }
}
