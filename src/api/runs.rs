//! Run endpoints: listing, reconciled status reads, and triggers

use super::response::{ok, parse_body, ApiError, ApiResponse, ApiResult};
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use convoy_core::{Reconciler, RunRegistry, TriggerCommand, TriggerService};
use convoy_store::Run;
use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Query parameters for listing runs
#[derive(Debug, Default, Deserialize)]
pub struct ListRunsQuery {
    #[serde(alias = "contextType")]
    pub context_type: Option<String>,
    #[serde(alias = "contextId")]
    pub context_id: Option<String>,
    pub limit: Option<i64>,
}

/// Create run routes
pub fn runs_routes() -> Router {
    Router::new()
        .route("/api/runs", get(list_runs))
        .route("/api/runs/trigger", post(trigger_run))
        .route("/api/runs/:run_id", get(get_run))
}

async fn list_runs(
    Extension(registry): Extension<RunRegistry>,
    Query(query): Query<ListRunsQuery>,
) -> ApiResult<Vec<Run>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let runs = registry
        .list(
            query.context_type.as_deref(),
            query.context_id.as_deref(),
            limit,
        )
        .await?;
    ok(runs)
}

/// Current state of one run, refreshed from the platform when it is still live
async fn get_run(
    Extension(reconciler): Extension<Reconciler>,
    Path(run_id): Path<String>,
) -> ApiResult<Run> {
    let run = reconciler.reconcile(&run_id).await?;
    ok(run)
}

async fn trigger_run(
    Extension(trigger): Extension<TriggerService>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<Vec<Run>>>), ApiError> {
    let command: TriggerCommand = parse_body(&body)?;
    let runs = trigger.trigger(command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(runs))))
}
