//! Demo reset endpoint

use super::response::{ok, ApiResult};
use axum::{extract::Extension, routing::post, Router};
use convoy_core::RunRegistry;
use serde::Serialize;
use tracing::info;

/// Result of a reset
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub removed: u64,
}

/// Create admin routes
pub fn admin_routes() -> Router {
    Router::new().route("/api/admin/reset", post(reset_runs))
}

/// Delete every tracked run. Incidents and their timelines are kept.
async fn reset_runs(Extension(registry): Extension<RunRegistry>) -> ApiResult<ResetResponse> {
    let removed = registry.clear().await?;
    info!(removed, "Runs reset");
    ok(ResetResponse { removed })
}
