//! Web API module for Convoy
//!
//! Provides REST API endpoints for:
//! - Webhook ingestion from the workflow platform and agents
//! - Run listing, reconciled status reads, and triggers
//! - Incidents and their timelines
//! - The live viewer stream (SSE)

pub mod admin;
pub mod health;
pub mod incidents;
pub mod response;
pub mod runs;
pub mod stream;
pub mod webhooks;

use axum::Router;

pub use admin::admin_routes;
pub use health::health_routes;
pub use incidents::incidents_routes;
pub use runs::runs_routes;
pub use stream::stream_routes;
pub use webhooks::webhooks_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(webhooks_routes())
        .merge(runs_routes())
        .merge(incidents_routes())
        .merge(stream_routes())
        .merge(admin_routes())
}
