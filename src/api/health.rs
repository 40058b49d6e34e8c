//! Health check endpoint

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use convoy_core::{EventBus, Reconciler};
use serde::Serialize;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Event bus transport (`local` or `redis`)
    pub transport: &'static str,
    /// Live bus subscriptions, viewers included
    pub subscribers: usize,
    /// Whether a workflow platform is configured
    pub platform: bool,
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check(
    Extension(bus): Extension<EventBus>,
    Extension(reconciler): Extension<Reconciler>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        transport: bus.transport_name(),
        subscribers: bus.subscriber_count(),
        platform: reconciler.is_enabled(),
    })
}
