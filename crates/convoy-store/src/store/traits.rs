//! Traits for storage backends

use crate::error::Result;
use crate::model::{
    Incident, IncidentLogEntry, IncidentStatus, LogLevel, LogSource, NewIncident, NewRun, Run,
};

/// Durable run records
///
/// Updates are compare-and-swap on [`Run::version`]: a writer that read a
/// stale version gets [`crate::Error::VersionConflict`] and must re-read.
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run; fails with `DuplicateRun` when the id exists
    async fn insert_run(&self, run: &NewRun) -> Result<Run>;

    /// Fetch a run by its external id
    async fn get_run(&self, run_id: &str) -> Result<Run>;

    /// Runs filtered by context, newest-created first
    async fn list_runs(
        &self,
        context_type: Option<&str>,
        context_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Run>>;

    /// Non-terminal runs, oldest first
    async fn list_active_runs(&self, limit: i64) -> Result<Vec<Run>>;

    /// Write `run` if the stored version still equals `run.version`
    async fn compare_and_swap(&self, run: &Run) -> Result<Run>;

    /// Delete every run, returning how many were removed
    async fn clear_runs(&self) -> Result<u64>;
}

/// Durable incidents and their narration log
#[async_trait::async_trait]
pub trait IncidentStore: Send + Sync {
    /// Open a new incident
    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident>;

    /// Fetch an incident
    async fn get_incident(&self, id: &str) -> Result<Incident>;

    /// Move an active incident to a terminal status.
    ///
    /// Returns the incident and whether this call performed the transition.
    async fn resolve_incident(&self, id: &str, status: IncidentStatus)
        -> Result<(Incident, bool)>;

    /// Append a narration line; fails with `IncidentNotFound`
    async fn append_log(
        &self,
        incident_id: &str,
        message: &str,
        source: &LogSource,
        status: LogLevel,
    ) -> Result<IncidentLogEntry>;

    /// Narration in insertion order
    async fn list_logs(&self, incident_id: &str) -> Result<Vec<IncidentLogEntry>>;
}

/// Key-value-by-id store for domain records (orders, shipments)
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record
    async fn get_record(&self, kind: &str, id: &str) -> Result<serde_json::Value>;

    /// Insert or replace a record
    async fn put_record(&self, kind: &str, id: &str, data: &serde_json::Value) -> Result<()>;

    /// Shallow-merge `patch` into an existing record and return the result
    async fn patch_record(
        &self,
        kind: &str,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value>;
}
