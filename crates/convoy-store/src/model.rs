//! Model - records persisted by the store
//!
//! Runs are keyed by the identifier issued by the external workflow platform.
//! Incidents own an append-only narration log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Accepted by the platform, not yet executing
    Pending,
    /// Executing on the platform
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled before completion
    Canceled,
}

impl RunStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Check if the run is terminal (completed, failed, or canceled)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(format!("unknown run status: {s}")),
        }
    }
}

/// One log line reported for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogRecord {
    /// Message text
    pub message: String,
    /// Severity
    pub level: LogLevel,
    /// Structured payload attached by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Timestamp as reported by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<String>,
    /// When the server received the record
    pub received_at: DateTime<Utc>,
}

impl RunLogRecord {
    /// Create a record received now
    #[must_use]
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            message: message.into(),
            level,
            data: None,
            reported_at: None,
            received_at: Utc::now(),
        }
    }

    /// Attach a structured payload
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the sender's timestamp
    #[must_use]
    pub fn reported_at(mut self, timestamp: Option<String>) -> Self {
        self.reported_at = timestamp;
        self
    }

    /// Same content as `other`, ignoring when it was received
    #[must_use]
    pub fn same_entry(&self, other: &Self) -> bool {
        self.message == other.message
            && self.level == other.level
            && self.data == other.data
            && self.reported_at == other.reported_at
    }
}

/// Accumulated auxiliary facts about a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    /// Ordered log records
    #[serde(default)]
    pub logs: Vec<RunLogRecord>,
    /// Result reported on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error reported on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    /// Last successful reconciliation against the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Raw status string last reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_status: Option<String>,
}

/// A run tracked locally by its external identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Identifier issued by the external platform
    pub run_id: String,
    /// Kind of domain object this run acts on (incident, shipment, ...)
    pub context_type: String,
    /// Identifier of that domain object
    pub context_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current status
    pub status: RunStatus,
    /// Deep link into the platform dashboard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_url: Option<String>,
    /// Accumulated metadata
    pub metadata: RunMetadata,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
    /// Row version used for compare-and-swap updates
    #[serde(skip)]
    pub version: i64,
}

impl Run {
    /// Whether this run is linked to an incident
    #[must_use]
    pub fn incident_id(&self) -> Option<&str> {
        (self.context_type == "incident").then_some(self.context_id.as_str())
    }
}

/// Parameters for registering a run
#[derive(Debug, Clone)]
pub struct NewRun {
    /// Identifier issued by the external platform
    pub run_id: String,
    /// Kind of domain object
    pub context_type: String,
    /// Identifier of the domain object
    pub context_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Initial status
    pub status: RunStatus,
    /// Deep link into the platform dashboard
    pub platform_url: Option<String>,
}

impl NewRun {
    /// Create a pending run registration
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        context_type: impl Into<String>,
        context_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            context_type: context_type.into(),
            context_id: context_id.into(),
            name: name.into(),
            description: None,
            status: RunStatus::Pending,
            platform_url: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the initial status
    #[must_use]
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the platform deep link
    #[must_use]
    pub fn with_platform_url(mut self, url: Option<String>) -> Self {
        self.platform_url = url;
        self
    }
}

/// Incident status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// Still being worked
    Active,
    /// Resolved successfully
    Resolved,
    /// Could not be resolved
    Failed,
}

impl IncidentStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Resolved => "RESOLVED",
            Self::Failed => "FAILED",
        }
    }

    /// Check if the incident is terminal
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "RESOLVED" => Ok(Self::Resolved),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("unknown incident status: {s}")),
        }
    }
}

/// A tracked problem owning runs and a narration log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Unique identifier
    pub id: String,
    /// Short title
    pub title: String,
    /// Current status
    pub status: IncidentStatus,
    /// Affected order, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
}

/// Parameters for opening an incident
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    /// Caller-chosen identifier; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Short title
    pub title: String,
    /// Affected order, if any
    #[serde(default)]
    pub order_id: Option<String>,
}

impl NewIncident {
    /// Create an incident request with a generated id
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            order_id: None,
        }
    }

    /// Use a fixed identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Link the affected order
    #[must_use]
    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

/// Who produced a narration line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogSource {
    /// The service itself
    System,
    /// The workflow platform
    Orchestrator,
    /// Discovery / monitoring processes
    Discovery,
    /// A first-party agent with the given role
    Agent(String),
}

impl LogSource {
    /// Agent source for a role
    #[must_use]
    pub fn agent(role: impl Into<String>) -> Self {
        Self::Agent(role.into())
    }
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "SYSTEM"),
            Self::Orchestrator => write!(f, "ORCHESTRATOR"),
            Self::Discovery => write!(f, "DISCOVERY"),
            Self::Agent(role) => write!(f, "AGENT:{role}"),
        }
    }
}

impl std::str::FromStr for LogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(Self::System),
            "ORCHESTRATOR" => Ok(Self::Orchestrator),
            "DISCOVERY" => Ok(Self::Discovery),
            other => match other.strip_prefix("AGENT:") {
                Some(role) if !role.is_empty() => Ok(Self::Agent(role.to_string())),
                _ => Err(format!("unknown log source: {s}")),
            },
        }
    }
}

impl TryFrom<String> for LogSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogSource> for String {
    fn from(source: LogSource) -> Self {
        source.to_string()
    }
}

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Informational
    Info,
    /// Something finished well
    Success,
    /// Needs attention
    Warning,
    /// Something failed
    Error,
}

impl LogLevel {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Lenient parse of sender-provided level names (`warn`, `error`, ...)
    #[must_use]
    pub fn from_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "success" | "ok" | "done" => Self::Success,
            "warn" | "warning" => Self::Warning,
            "error" | "err" | "fatal" | "failed" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Self::Info),
            "SUCCESS" => Ok(Self::Success),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Immutable narration record for an incident
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentLogEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Owning incident
    pub incident_id: String,
    /// Insertion sequence, breaks timestamp ties
    pub seq: i64,
    /// Server-assigned timestamp
    pub timestamp: DateTime<Utc>,
    /// Narration text
    pub message: String,
    /// Producer
    pub source: LogSource,
    /// Severity
    pub status: LogLevel,
}
