//! Webhook ingestion endpoint
//!
//! `POST /api/webhooks/runs` accepts both platform lifecycle events and
//! first-party agent progress reports on one URL.

use super::response::{ok, ApiResult};
use crate::middleware::WebhookKey;
use axum::{body::Bytes, extract::Extension, routing::post, Router};
use convoy_core::{WebhookGateway, WebhookOutcome};

/// Create webhook routes
pub fn webhooks_routes() -> Router {
    Router::new().route("/api/webhooks/runs", post(ingest_run_event))
}

async fn ingest_run_event(
    _key: WebhookKey,
    Extension(gateway): Extension<WebhookGateway>,
    body: Bytes,
) -> ApiResult<WebhookOutcome> {
    let outcome = gateway.ingest(&body).await?;
    ok(outcome)
}
