use chrono::{DateTime, Utc};
use convoy_store::{Run, RunLogRecord, RunStatus};
use serde::Serialize;

/// Additions to a run's metadata.
///
/// `logs` are appended (identical entries are skipped). `result` and
/// `error` are written while the run is live; once it is terminal they only
/// fill an empty slot, so a late event cannot rewrite the recorded outcome.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    /// Log records to append
    pub logs: Vec<RunLogRecord>,
    /// Outcome payload
    pub result: Option<serde_json::Value>,
    /// Failure payload
    pub error: Option<serde_json::Value>,
    /// Time of the last platform poll
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Raw status string last reported by the platform
    pub platform_status: Option<String>,
}

impl MetadataPatch {
    /// Empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one log record
    #[must_use]
    pub fn log(mut self, record: RunLogRecord) -> Self {
        self.logs.push(record);
        self
    }

    /// Set the outcome payload
    #[must_use]
    pub fn result(mut self, result: Option<serde_json::Value>) -> Self {
        self.result = result;
        self
    }

    /// Set the failure payload
    #[must_use]
    pub fn error(mut self, error: Option<serde_json::Value>) -> Self {
        self.error = error;
        self
    }

    /// Record a platform sync
    #[must_use]
    pub fn synced(mut self, at: DateTime<Utc>, platform_status: impl Into<String>) -> Self {
        self.last_sync_at = Some(at);
        self.platform_status = Some(platform_status.into());
        self
    }

    /// Whether the patch carries nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
            && self.result.is_none()
            && self.error.is_none()
            && self.last_sync_at.is_none()
            && self.platform_status.is_none()
    }
}

/// What a merge did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// The run after the merge
    pub run: Run,
    /// Status before the merge
    pub previous_status: RunStatus,
    /// Whether the status moved
    pub status_changed: bool,
    /// A proposed status was dropped because the run was already terminal
    pub status_ignored: bool,
    /// Log records actually appended
    pub logs_appended: usize,
    /// Whether anything at all was written
    pub changed: bool,
    /// Whether status, logs, result or error moved. Sync bookkeeping alone
    /// (`lastSyncAt`, `platformStatus`) does not count.
    pub content_changed: bool,
}

/// Compute the merged run. Pure; persistence happens in the registry.
pub(crate) fn apply(current: &Run, proposed: Option<RunStatus>, patch: &MetadataPatch) -> MergeOutcome {
    let mut run = current.clone();
    let was_terminal = current.status.is_terminal();

    let mut status_ignored = false;
    if let Some(proposed) = proposed {
        if was_terminal {
            status_ignored = proposed != current.status;
        } else {
            run.status = proposed;
        }
    }

    let meta = &mut run.metadata;
    let mut logs_appended = 0;
    for record in &patch.logs {
        if !meta.logs.iter().any(|existing| existing.same_entry(record)) {
            meta.logs.push(record.clone());
            logs_appended += 1;
        }
    }

    if let Some(result) = &patch.result {
        if !was_terminal || meta.result.is_none() {
            meta.result = Some(result.clone());
        }
    }
    if let Some(error) = &patch.error {
        if !was_terminal || meta.error.is_none() {
            meta.error = Some(error.clone());
        }
    }
    if patch.last_sync_at.is_some() {
        meta.last_sync_at = patch.last_sync_at;
    }
    if patch.platform_status.is_some() {
        meta.platform_status.clone_from(&patch.platform_status);
    }

    let status_changed = run.status != current.status;
    let content_changed = status_changed
        || logs_appended > 0
        || run.metadata.result != current.metadata.result
        || run.metadata.error != current.metadata.error;
    let changed = content_changed || run.metadata != current.metadata;
    if changed {
        run.updated_at = Utc::now();
    }

    MergeOutcome {
        run,
        previous_status: current.status,
        status_changed,
        status_ignored,
        logs_appended,
        changed,
        content_changed,
    }
}
