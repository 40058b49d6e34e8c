use super::types::{parse_trigger_response, PlatformConfig, PlatformRun, TriggerRequest, TriggeredRun};
use super::PlatformApi;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

/// HTTP client for the workflow platform
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    config: PlatformConfig,
}

impl PlatformClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Connection settings
    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            let detail: String = text.chars().take(300).collect();
            return Err(Error::UpstreamUnavailable(format!(
                "platform returned {status}: {detail}"
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    #[instrument(skip(self, request), fields(task = %request.task))]
    async fn trigger(&self, request: &TriggerRequest) -> Result<Vec<TriggeredRun>> {
        let url = format!("{}/api/v1/tasks/{}/trigger", self.config.base_url, request.task);
        let mut body = json!({ "payload": request.payload });
        if let Some(callback) = &request.callback_url {
            body["options"] = json!({ "callbackUrl": callback });
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let text = Self::read_body(response).await?;
        let runs = parse_trigger_response(&text)?;
        debug!(count = runs.len(), "Platform issued run ids");
        Ok(runs)
    }

    #[instrument(skip(self))]
    async fn run_status(&self, run_id: &str) -> Result<PlatformRun> {
        let url = format!("{}/api/v1/runs/{run_id}", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let text = Self::read_body(response).await?;
        let mut run: PlatformRun = serde_json::from_str(&text)
            .map_err(|e| Error::UpstreamUnavailable(format!("unexpected run response: {e}")))?;
        if run.id.is_empty() {
            run.id = run_id.to_string();
        }
        Ok(run)
    }

    fn run_url(&self, run_id: &str) -> String {
        self.config.run_url(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_url_and_key() {
        assert!(PlatformConfig::from_settings("", "key", "", "task", 10).is_none());
        assert!(PlatformConfig::from_settings("https://p.example", "  ", "", "task", 10).is_none());
        let config = PlatformConfig::from_settings("https://p.example/", "key", "", "task", 10).unwrap();
        assert_eq!(config.base_url, "https://p.example");
        assert!(config.org_id.is_none());
        assert!(!format!("{config:?}").contains("key\""));
    }

    #[test]
    fn test_deep_links() {
        let with_org = PlatformConfig::from_settings("https://p.example", "k", "acme", "t", 10).unwrap();
        assert_eq!(with_org.run_url("run_1"), "https://p.example/orgs/acme/runs/run_1");

        let without = PlatformConfig::from_settings("https://p.example", "k", "", "t", 10).unwrap();
        assert_eq!(without.run_url("run_1"), "https://p.example/runs/run_1");
    }

    #[test]
    fn test_trigger_response_shapes() {
        let single = parse_trigger_response(r#"{"id":"run_a","status":"QUEUED"}"#).unwrap();
        assert_eq!(single, vec![TriggeredRun { id: "run_a".into(), status: Some("QUEUED".into()) }]);

        let batch = parse_trigger_response(r#"{"runs":[{"id":"run_a"},{"id":"run_b"}]}"#).unwrap();
        assert_eq!(batch.len(), 2);

        let ids = parse_trigger_response(r#"{"run_ids":["run_c"]}"#).unwrap();
        assert_eq!(ids[0].id, "run_c");

        assert!(parse_trigger_response(r#"{"runs":[]}"#).is_err());
        assert!(parse_trigger_response("not json").is_err());
    }

    #[test]
    fn test_platform_run_accepts_result_alias() {
        let run: PlatformRun =
            serde_json::from_str(r#"{"status":"COMPLETED","result":{"ok":true}}"#).unwrap();
        assert_eq!(run.output, Some(serde_json::json!({"ok": true})));
        assert!(run.id.is_empty());
    }
}
