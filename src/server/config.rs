//! Server configuration types
//!
//! Mirrors `config/default.toml`; every section falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub platform: PlatformSettings,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

/// SQLite location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Empty selects the per-user data directory
    #[serde(default)]
    pub path: String,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.trim() {
            "" => convoy_store::store::default_db_path(),
            path => PathBuf::from(path),
        }
    }
}

/// Redis pub/sub transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Empty keeps the bus in-process
    #[serde(default)]
    pub url: String,
}

impl RedisConfig {
    pub fn url(&self) -> Option<&str> {
        Some(self.url.trim()).filter(|u| !u.is_empty())
    }
}

/// Workflow platform credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub default_task: String,
    #[serde(default = "default_platform_timeout")]
    pub timeout_secs: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            org_id: String::new(),
            default_task: String::new(),
            timeout_secs: default_platform_timeout(),
        }
    }
}

impl std::fmt::Debug for PlatformSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("org_id", &self.org_id)
            .field("default_task", &self.default_task)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_platform_timeout() -> u64 {
    15
}

/// Inbound webhook settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Pre-shared key expected in `x-api-key`; empty disables the check
    #[serde(default)]
    pub secret: String,
    /// Public base URL handed to the platform for callbacks
    #[serde(default)]
    pub callback_base_url: String,
}

impl WebhookConfig {
    /// Full callback URL, if a public base URL is configured
    pub fn callback_url(&self) -> Option<String> {
        match self.callback_base_url.trim().trim_end_matches('/') {
            "" => None,
            base => Some(format!("{base}/api/webhooks/runs")),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &if self.secret.is_empty() { "" } else { "***" })
            .field("callback_base_url", &self.callback_base_url)
            .finish()
    }
}

/// Viewer stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Per-subscriber queue depth on the event bus
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl StreamConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    25
}

fn default_subscriber_buffer() -> usize {
    256
}

/// Background reconcile sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// 0 disables the sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch: default_sweep_batch(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_batch() -> i64 {
    50
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        let mut webhook = WebhookConfig::default();
        assert_eq!(webhook.callback_url(), None);

        webhook.callback_base_url = "https://convoy.example.com/".to_string();
        assert_eq!(
            webhook.callback_url().as_deref(),
            Some("https://convoy.example.com/api/webhooks/runs")
        );
    }

    #[test]
    fn test_secrets_masked_in_debug() {
        let settings = PlatformSettings {
            api_key: "tr_live_123".to_string(),
            ..PlatformSettings::default()
        };
        assert!(!format!("{settings:?}").contains("tr_live_123"));

        let webhook = WebhookConfig {
            secret: "s3cret".to_string(),
            callback_base_url: String::new(),
        };
        assert!(!format!("{webhook:?}").contains("s3cret"));
    }

    #[test]
    fn test_blank_redis_url_is_local() {
        let redis = RedisConfig {
            url: "  ".to_string(),
        };
        assert_eq!(redis.url(), None);
    }

    #[test]
    fn test_heartbeat_floor() {
        let stream = StreamConfig {
            heartbeat_secs: 0,
            subscriber_buffer: 8,
        };
        assert_eq!(stream.heartbeat(), Duration::from_secs(1));
    }
}
