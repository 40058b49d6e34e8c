use crate::error::{Error, Result};
use convoy_store::{LogLevel, RunStatus};
use serde::Deserialize;
use serde_json::Value;

/// An inbound webhook, discriminated by which key it carries.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `{run_id, event_type, data, timestamp}` from the platform
    Platform(PlatformEvent),
    /// `{run_id, stage, status, reasoning?, ui_action?, data?}` from an agent
    Agent(AgentEvent),
}

/// Push from the workflow platform
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformEvent {
    /// External run id
    #[serde(alias = "runId")]
    pub run_id: String,
    /// Raw event type
    #[serde(alias = "eventType")]
    pub event_type: String,
    /// Event body
    #[serde(default)]
    pub data: Value,
    /// Platform-side timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Progress report from an agent process
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEvent {
    /// External run id
    #[serde(alias = "runId")]
    pub run_id: String,
    /// Named step the agent reached
    pub stage: String,
    /// Free-form status, normalized through the status table
    #[serde(default)]
    pub status: Option<String>,
    /// Agent's own narration
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Channel whose viewers should also see `data`
    #[serde(default, alias = "uiAction")]
    pub ui_action: Option<String>,
    /// Event body
    #[serde(default)]
    pub data: Value,
    /// Agent-side timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Recognized platform event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEventKind {
    /// Log line, no status change
    Log,
    /// Run started
    Running,
    /// Run finished successfully
    Completed,
    /// Run failed
    Failed,
    /// Anything else; accepted as metadata only
    Other(String),
}

impl PlatformEventKind {
    /// Status this event proposes
    #[must_use]
    pub fn proposed_status(&self) -> Option<RunStatus> {
        match self {
            Self::Running => Some(RunStatus::Running),
            Self::Completed => Some(RunStatus::Completed),
            Self::Failed => Some(RunStatus::Failed),
            Self::Log | Self::Other(_) => None,
        }
    }
}

impl WebhookEvent {
    /// Parse and validate a raw request body.
    ///
    /// # Errors
    ///
    /// `Validation` when the body is not a JSON object, lacks `run_id`, or
    /// carries neither `event_type` nor `stage`
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("invalid JSON body: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(Error::Validation("body must be a JSON object".to_string()));
        };

        let run_id = object
            .get("run_id")
            .or_else(|| object.get("runId"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if run_id.trim().is_empty() {
            return Err(Error::Validation("run_id is required".to_string()));
        }

        let event = if object.contains_key("event_type") || object.contains_key("eventType") {
            Self::Platform(
                serde_json::from_value(value)
                    .map_err(|e| Error::Validation(format!("invalid platform event: {e}")))?,
            )
        } else if object.contains_key("stage") {
            Self::Agent(
                serde_json::from_value(value)
                    .map_err(|e| Error::Validation(format!("invalid agent event: {e}")))?,
            )
        } else {
            return Err(Error::Validation(
                "either event_type or stage is required".to_string(),
            ));
        };
        Ok(event)
    }

    /// Run this event targets
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Platform(e) => &e.run_id,
            Self::Agent(e) => &e.run_id,
        }
    }
}

impl PlatformEvent {
    /// Classify `event_type`
    #[must_use]
    pub fn kind(&self) -> PlatformEventKind {
        match self.event_type.trim().to_ascii_lowercase().as_str() {
            "log" => PlatformEventKind::Log,
            "running" => PlatformEventKind::Running,
            "completed" => PlatformEventKind::Completed,
            "failed" => PlatformEventKind::Failed,
            other => PlatformEventKind::Other(other.to_string()),
        }
    }

    /// Log line text for a `log` event
    pub(crate) fn log_message(&self) -> String {
        ["message", "msg", "text"]
            .iter()
            .find_map(|key| self.data.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| match &self.data {
                Value::String(s) => s.clone(),
                _ => "log".to_string(),
            })
    }

    /// Level for a `log` event, from `data.level`
    pub(crate) fn log_level(&self) -> LogLevel {
        self.data
            .get("level")
            .and_then(Value::as_str)
            .map_or(LogLevel::Info, LogLevel::from_loose)
    }

    /// `data.result`, else the whole body when it carries anything
    pub(crate) fn result(&self) -> Option<Value> {
        self.data.get("result").cloned().or_else(|| non_empty(&self.data))
    }

    /// `data.error`, else the whole body when it carries anything
    pub(crate) fn error(&self) -> Option<Value> {
        self.data.get("error").cloned().or_else(|| non_empty(&self.data))
    }
}

impl AgentEvent {
    /// Status proposed by the agent, if recognized
    #[must_use]
    pub fn proposed_status(&self) -> Option<RunStatus> {
        self.status.as_deref().and_then(crate::runs::normalize_status)
    }

    /// Agent role for the timeline source
    #[must_use]
    pub fn role(&self) -> &str {
        ["role", "agent"]
            .iter()
            .find_map(|key| self.data.get(key).and_then(Value::as_str))
            .filter(|role| !role.is_empty())
            .unwrap_or("agent")
    }

    /// Narration for the timeline
    pub(crate) fn narration(&self) -> String {
        match (&self.reasoning, &self.status) {
            (Some(reasoning), _) if !reasoning.trim().is_empty() => reasoning.clone(),
            (_, Some(status)) => format!("{}: {}", self.stage, status),
            _ => self.stage.clone(),
        }
    }

    pub(crate) fn log_level(&self) -> LogLevel {
        match self.proposed_status() {
            Some(RunStatus::Completed) => LogLevel::Success,
            Some(RunStatus::Failed) => LogLevel::Error,
            Some(RunStatus::Canceled) => LogLevel::Warning,
            _ => self.status.as_deref().map_or(LogLevel::Info, LogLevel::from_loose),
        }
    }

    /// `data.order_id` / `data.orderId`
    pub(crate) fn order_id(&self) -> Option<&str> {
        ["order_id", "orderId"]
            .iter()
            .find_map(|key| self.data.get(key).and_then(Value::as_str))
    }
}

fn non_empty(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}
