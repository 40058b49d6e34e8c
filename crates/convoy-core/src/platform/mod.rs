//! External workflow platform - the black box that executes runs.

mod client;
mod types;

pub use client::PlatformClient;
pub use types::{PlatformConfig, PlatformRun, TriggerRequest, TriggeredRun};

use crate::error::Result;
use async_trait::async_trait;

/// Operations the core needs from the workflow platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Start a task; returns the run ids the platform issued
    async fn trigger(&self, request: &TriggerRequest) -> Result<Vec<TriggeredRun>>;

    /// Authoritative state of one run
    async fn run_status(&self, run_id: &str) -> Result<PlatformRun>;

    /// Dashboard deep link for a run
    fn run_url(&self, run_id: &str) -> String;
}
