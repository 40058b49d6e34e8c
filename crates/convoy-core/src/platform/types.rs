use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Platform connection settings
#[derive(Clone)]
pub struct PlatformConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Secret API key
    pub api_key: String,
    /// Organization used in deep links
    pub org_id: Option<String>,
    /// Task triggered when the caller names none
    pub default_task: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"****")
            .field("org_id", &self.org_id)
            .field("default_task", &self.default_task)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PlatformConfig {
    /// Build from raw settings.
    ///
    /// Returns `None` unless both the base URL and the API key are set;
    /// empty strings count as unset.
    #[must_use]
    pub fn from_settings(
        base_url: &str,
        api_key: &str,
        org_id: &str,
        default_task: &str,
        timeout_secs: u64,
    ) -> Option<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        if base_url.is_empty() || api_key.is_empty() {
            return None;
        }
        let org_id = Some(org_id.trim()).filter(|s| !s.is_empty()).map(str::to_string);

        Some(Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            org_id,
            default_task: default_task.to_string(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    /// Deep link for a run
    #[must_use]
    pub fn run_url(&self, run_id: &str) -> String {
        match &self.org_id {
            Some(org) => format!("{}/orgs/{org}/runs/{run_id}", self.base_url),
            None => format!("{}/runs/{run_id}", self.base_url),
        }
    }
}

/// Outbound trigger call
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    /// Platform task identifier
    pub task: String,
    /// Task input
    pub payload: serde_json::Value,
    /// Where the platform should push run events
    pub callback_url: Option<String>,
}

/// Run id issued by the platform
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggeredRun {
    /// External run identifier
    pub id: String,
    /// Initial status, if the platform acknowledged one
    #[serde(default)]
    pub status: Option<String>,
}

/// Run state as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRun {
    /// External run identifier
    #[serde(default)]
    pub id: String,
    /// Raw platform status
    pub status: String,
    /// Output once completed
    #[serde(default, alias = "result")]
    pub output: Option<serde_json::Value>,
    /// Failure detail
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerResponse {
    Batch { runs: Vec<TriggeredRun> },
    Ids {
        #[serde(alias = "runIds")]
        run_ids: Vec<String>,
    },
    Single(TriggeredRun),
}

/// Accepts `{id}`, `{runs: [{id}]}` or `{run_ids: [..]}`.
pub(crate) fn parse_trigger_response(body: &str) -> Result<Vec<TriggeredRun>> {
    let parsed: TriggerResponse = serde_json::from_str(body)
        .map_err(|e| Error::UpstreamUnavailable(format!("unexpected trigger response: {e}")))?;

    let runs = match parsed {
        TriggerResponse::Batch { runs } => runs,
        TriggerResponse::Ids { run_ids } => run_ids
            .into_iter()
            .map(|id| TriggeredRun { id, status: None })
            .collect(),
        TriggerResponse::Single(run) => vec![run],
    };

    let runs: Vec<_> = runs.into_iter().filter(|r| !r.id.is_empty()).collect();
    if runs.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "platform accepted the trigger but issued no run id".to_string(),
        ));
    }
    Ok(runs)
}
