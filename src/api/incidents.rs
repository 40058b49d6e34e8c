//! Incident endpoints: open, read with timeline, narrate, resolve

use super::response::{ok, parse_body, ApiError, ApiResponse, ApiResult};
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use convoy_core::{IncidentTimeline, RunRegistry};
use convoy_store::{
    Incident, IncidentLogEntry, IncidentStatus, LogLevel, LogSource, NewIncident, Run,
};
use serde::{Deserialize, Serialize};

const INCIDENT_RUN_LIMIT: i64 = 100;

/// Incident with its narration and runs
#[derive(Debug, Serialize)]
pub struct IncidentDetail {
    pub incident: Incident,
    pub logs: Vec<IncidentLogEntry>,
    pub runs: Vec<Run>,
}

/// Request body for a manual narration line
#[derive(Debug, Deserialize)]
pub struct AppendLogRequest {
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for closing an incident
#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub status: Option<String>,
}

/// Create incident routes
pub fn incidents_routes() -> Router {
    Router::new()
        .route("/api/incidents", post(open_incident))
        .route("/api/incidents/:incident_id", get(get_incident))
        .route("/api/incidents/:incident_id/logs", post(append_log))
        .route("/api/incidents/:incident_id/resolve", post(resolve_incident))
}

async fn open_incident(
    Extension(timeline): Extension<IncidentTimeline>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<Incident>>), ApiError> {
    let request: NewIncident = parse_body(&body)?;
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    let incident = timeline.open(&request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(incident))))
}

async fn get_incident(
    Extension(timeline): Extension<IncidentTimeline>,
    Extension(registry): Extension<RunRegistry>,
    Path(incident_id): Path<String>,
) -> ApiResult<IncidentDetail> {
    let incident = timeline.incident(&incident_id).await?;
    let logs = timeline.entries(&incident_id).await?;
    let runs = registry
        .list(Some("incident"), Some(&incident_id), INCIDENT_RUN_LIMIT)
        .await?;
    ok(IncidentDetail {
        incident,
        logs,
        runs,
    })
}

async fn append_log(
    Extension(timeline): Extension<IncidentTimeline>,
    Path(incident_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<IncidentLogEntry>>), ApiError> {
    let request: AppendLogRequest = parse_body(&body)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::validation("message is required"));
    }
    let source = match request.source.as_deref() {
        Some(source) => source.parse::<LogSource>().map_err(ApiError::validation)?,
        None => LogSource::System,
    };
    let status = match request.status.as_deref() {
        Some(status) => status.parse::<LogLevel>().map_err(ApiError::validation)?,
        None => LogLevel::Info,
    };

    let entry = timeline
        .append(&incident_id, &request.message, source, status)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

async fn resolve_incident(
    Extension(timeline): Extension<IncidentTimeline>,
    Path(incident_id): Path<String>,
    body: Bytes,
) -> ApiResult<Incident> {
    let request: ResolveRequest = if body.is_empty() {
        ResolveRequest::default()
    } else {
        parse_body(&body)?
    };
    let status = match request.status.as_deref() {
        None => IncidentStatus::Resolved,
        Some(status) => match status.parse::<IncidentStatus>() {
            Ok(status) if status.is_terminal() => status,
            Ok(_) => return Err(ApiError::validation("status must be RESOLVED or FAILED")),
            Err(e) => return Err(ApiError::validation(e)),
        },
    };

    let incident = timeline.resolve(&incident_id, status).await?;
    ok(incident)
}
