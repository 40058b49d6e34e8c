//! Helper functions for store module

use crate::error::Error;
use crate::model::{Incident, IncidentLogEntry, Run, RunMetadata};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Fixed-width RFC 3339 so that text ordering matches time ordering
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp: {e}")))
}

pub(crate) fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

/// Convert a SQLite row to a Run
pub(crate) fn row_to_run(row: SqliteRow) -> Result<Run, Error> {
    let status_str: String = row.get("status");
    let metadata_str: String = row.get("metadata");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    let status = status_str
        .parse()
        .map_err(|e: String| Error::Serialization(e))?;
    let metadata: RunMetadata = serde_json::from_str(&metadata_str)
        .map_err(|e| Error::Serialization(format!("invalid metadata: {e}")))?;

    Ok(Run {
        run_id: row.get("run_id"),
        context_type: row.get("context_type"),
        context_id: row.get("context_id"),
        name: row.get("name"),
        description: row.get("description"),
        status,
        platform_url: row.get("platform_url"),
        metadata,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
        version: row.get("version"),
    })
}

/// Convert a SQLite row to an Incident
pub(crate) fn row_to_incident(row: SqliteRow) -> Result<Incident, Error> {
    let status_str: String = row.get("status");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    Ok(Incident {
        id: row.get("id"),
        title: row.get("title"),
        status: status_str
            .parse()
            .map_err(|e: String| Error::Serialization(e))?,
        order_id: row.get("order_id"),
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

/// Convert a SQLite row to an IncidentLogEntry
pub(crate) fn row_to_log(row: SqliteRow) -> Result<IncidentLogEntry, Error> {
    let id_str: String = row.get("id");
    let timestamp_str: String = row.get("timestamp");
    let source_str: String = row.get("source");
    let status_str: String = row.get("status");

    Ok(IncidentLogEntry {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| Error::Serialization(format!("invalid uuid: {e}")))?,
        incident_id: row.get("incident_id"),
        seq: row.get("seq"),
        timestamp: parse_ts(&timestamp_str)?,
        message: row.get("message"),
        source: source_str
            .parse()
            .map_err(|e: String| Error::Serialization(e))?,
        status: status_str
            .parse()
            .map_err(|e: String| Error::Serialization(e))?,
    })
}

/// Get the default data directory for Convoy
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".convoy"))
        .unwrap_or_else(|| std::path::PathBuf::from(".convoy"))
}

/// Get the default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("convoy.db")
}
