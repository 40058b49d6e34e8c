//! Service graph and router assembly

use crate::api;
use axum::{Extension, Router};
use convoy_core::{
    EventBus, IncidentTimeline, PlatformApi, Reconciler, RunRegistry, TriggerService, WebhookAuth,
    WebhookGateway,
};
use convoy_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Viewer stream settings shared with the SSE handler
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub heartbeat: Duration,
    /// Ends every open viewer stream when cancelled
    pub shutdown: CancellationToken,
}

/// Every service the HTTP layer hands out
#[derive(Clone)]
pub struct Services {
    pub registry: RunRegistry,
    pub timeline: IncidentTimeline,
    pub gateway: WebhookGateway,
    pub reconciler: Reconciler,
    pub trigger: TriggerService,
    pub bus: EventBus,
    pub webhook_auth: WebhookAuth,
    pub stream: StreamSettings,
}

/// Inputs for [`Services::build`] that come from configuration
pub struct ServiceOptions {
    pub platform: Option<Arc<dyn PlatformApi>>,
    pub webhook_secret: Option<String>,
    pub default_task: String,
    pub callback_url: Option<String>,
    pub heartbeat: Duration,
    pub shutdown: CancellationToken,
}

impl Services {
    /// Wire all services over one store and one bus
    pub fn build(store: Arc<SqliteStore>, bus: EventBus, options: ServiceOptions) -> Self {
        let registry = RunRegistry::new(store.clone());
        let timeline = IncidentTimeline::new(store.clone(), bus.clone());
        let gateway = WebhookGateway::new(registry.clone(), timeline.clone(), store, bus.clone());
        let reconciler = Reconciler::new(
            registry.clone(),
            timeline.clone(),
            bus.clone(),
            options.platform.clone(),
        );
        let trigger = TriggerService::new(
            registry.clone(),
            timeline.clone(),
            bus.clone(),
            options.platform,
        )
        .with_default_task(options.default_task)
        .with_callback_url(options.callback_url);

        Self {
            registry,
            timeline,
            gateway,
            reconciler,
            trigger,
            bus,
            webhook_auth: WebhookAuth::new(options.webhook_secret.as_deref()),
            stream: StreamSettings {
                heartbeat: options.heartbeat,
                shutdown: options.shutdown,
            },
        }
    }
}

/// Build the HTTP router with every service attached as an extension
pub fn router(services: &Services) -> Router {
    api::api_router()
        .layer(Extension(services.registry.clone()))
        .layer(Extension(services.timeline.clone()))
        .layer(Extension(services.gateway.clone()))
        .layer(Extension(services.reconciler.clone()))
        .layer(Extension(services.trigger.clone()))
        .layer(Extension(services.bus.clone()))
        .layer(Extension(services.webhook_auth.clone()))
        .layer(Extension(services.stream.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
