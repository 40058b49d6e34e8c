use convoy_store::RunStatus;

/// External status vocabulary, uppercase, mapped onto [`RunStatus`].
///
/// Shared by the webhook gateway and the reconciler.
const STATUS_TABLE: &[(&str, RunStatus)] = &[
    ("PENDING", RunStatus::Pending),
    ("QUEUED", RunStatus::Pending),
    ("WAITING", RunStatus::Pending),
    ("DELAYED", RunStatus::Pending),
    ("WAITING_FOR_DEPLOY", RunStatus::Pending),
    ("RUNNING", RunStatus::Running),
    ("EXECUTING", RunStatus::Running),
    ("STARTED", RunStatus::Running),
    ("IN_PROGRESS", RunStatus::Running),
    ("REATTEMPTING", RunStatus::Running),
    ("FROZEN", RunStatus::Running),
    ("COMPLETED", RunStatus::Completed),
    ("SUCCESS", RunStatus::Completed),
    ("SUCCEEDED", RunStatus::Completed),
    ("DONE", RunStatus::Completed),
    ("FAILED", RunStatus::Failed),
    ("FAILURE", RunStatus::Failed),
    ("ERROR", RunStatus::Failed),
    ("CRASHED", RunStatus::Failed),
    ("SYSTEM_FAILURE", RunStatus::Failed),
    ("TIMED_OUT", RunStatus::Failed),
    ("EXPIRED", RunStatus::Failed),
    ("INTERRUPTED", RunStatus::Failed),
    ("CANCELED", RunStatus::Canceled),
    ("CANCELLED", RunStatus::Canceled),
];

/// Map an external status string to a run status.
///
/// Case and surrounding whitespace are ignored; `-` and spaces count as `_`.
/// Unrecognized values yield `None`, meaning "leave the status as it is".
#[must_use]
pub fn normalize_status(raw: &str) -> Option<RunStatus> {
    let key = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
    STATUS_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, status)| *status)
}
