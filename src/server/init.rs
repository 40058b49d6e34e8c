//! Server initialization and main run loop
//!
//! Contains the main `run()` function that starts all server components.

use super::app::{router, ServiceOptions, Services};
use super::background_tasks::start_reconcile_sweep;
use super::config::AppConfig;
use anyhow::{Context, Result};
use convoy_core::{
    wait_for_shutdown_signal, EventBus, PlatformApi, PlatformClient, PlatformConfig,
    ShutdownController,
};
use convoy_store::SqliteStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Convoy v{}", env!("CARGO_PKG_VERSION"));

    let shutdown_controller = ShutdownController::new();

    let store = open_store(&config).await?;
    let bus = init_event_bus(&config, &shutdown_controller)?;
    let platform = init_platform(&config)?;

    let services = Services::build(
        store,
        bus,
        ServiceOptions {
            platform,
            webhook_secret: Some(config.webhook.secret.clone()),
            default_task: config.platform.default_task.clone(),
            callback_url: config.webhook.callback_url(),
            heartbeat: config.stream.heartbeat(),
            shutdown: shutdown_controller.token(),
        },
    );

    if services.trigger.is_demo() {
        warn!("Platform not configured, triggers run in demo mode and reconciliation is off");
    }

    start_reconcile_sweep(&config, &services.reconciler, &shutdown_controller);

    let app = router(&services);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server listening on http://{}", addr);

    // Cancelling first closes open viewer streams, which graceful shutdown waits on
    let signal_controller = shutdown_controller.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            signal_controller.shutdown().await;
        })
        .await
        .context("HTTP server error")?;

    info!("Convoy shutdown complete");
    Ok(())
}

/// Delete every run from the configured database
pub async fn reset_runs(config: &AppConfig) -> Result<u64> {
    let store = open_store(config).await?;
    let registry = convoy_core::RunRegistry::new(store);
    registry.clear().await.context("Failed to clear runs")
}

async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let db_path = config.database.resolved_path();
    let store = SqliteStore::from_path(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    Ok(Arc::new(store))
}

fn init_event_bus(config: &AppConfig, shutdown: &ShutdownController) -> Result<EventBus> {
    let buffer = config.stream.subscriber_buffer;
    match config.redis.url() {
        Some(url) => {
            let bus = EventBus::redis(url, buffer, shutdown.token())
                .context("Failed to initialize Redis event transport")?;
            info!("Event bus using Redis transport");
            Ok(bus)
        }
        None => {
            info!("Event bus using in-process transport");
            Ok(EventBus::new(buffer))
        }
    }
}

fn init_platform(config: &AppConfig) -> Result<Option<Arc<dyn PlatformApi>>> {
    let settings = &config.platform;
    let Some(platform_config) = PlatformConfig::from_settings(
        &settings.base_url,
        &settings.api_key,
        &settings.org_id,
        &settings.default_task,
        settings.timeout_secs,
    ) else {
        return Ok(None);
    };

    info!(base_url = %platform_config.base_url, "Workflow platform configured");
    let client = PlatformClient::new(platform_config).context("Failed to build platform client")?;
    let platform: Arc<dyn PlatformApi> = Arc::new(client);
    Ok(Some(platform))
}
