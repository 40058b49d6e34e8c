//! Incident and narration log operations

use super::helpers::{db_err, format_ts, parse_ts, row_to_incident, row_to_log};
use super::sqlite_store::SqliteStore;
use super::traits::IncidentStore;
use crate::error::{Error, Result};
use crate::model::{
    Incident, IncidentLogEntry, IncidentStatus, LogLevel, LogSource, NewIncident,
};
use chrono::Utc;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

#[async_trait::async_trait]
impl IncidentStore for SqliteStore {
    #[instrument(skip(self, incident), fields(title = %incident.title))]
    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident> {
        let now = Utc::now();
        let stored = Incident {
            id: incident
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: incident.title.clone(),
            status: IncidentStatus::Active,
            order_id: incident.order_id.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, status, order_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.title)
        .bind(stored.status.as_str())
        .bind(&stored.order_id)
        .bind(format_ts(stored.created_at))
        .bind(format_ts(stored.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!("Created incident {}", stored.id);
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get_incident(&self, id: &str) -> Result<Incident> {
        let row = sqlx::query(
            r#"
            SELECT id, title, status, order_id, created_at, updated_at
            FROM incidents
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| Error::IncidentNotFound(id.to_string()))?;

        row_to_incident(row)
    }

    #[instrument(skip(self))]
    async fn resolve_incident(
        &self,
        id: &str,
        status: IncidentStatus,
    ) -> Result<(Incident, bool)> {
        // Only ACTIVE rows move, so the transition happens exactly once
        let result = sqlx::query(
            r#"
            UPDATE incidents
            SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'ACTIVE'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let incident = self.get_incident(id).await?;
        Ok((incident, result.rows_affected() > 0))
    }

    #[instrument(skip(self, message))]
    async fn append_log(
        &self,
        incident_id: &str,
        message: &str,
        source: &LogSource,
        status: LogLevel,
    ) -> Result<IncidentLogEntry> {
        self.get_incident(incident_id).await?;

        // Keep timestamps monotonic per incident even if the clock steps back
        let last: Option<String> = sqlx::query(
            "SELECT timestamp FROM incident_logs WHERE incident_id = ?1 ORDER BY seq DESC LIMIT 1",
        )
        .bind(incident_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(|row| row.get("timestamp"));

        let mut timestamp = Utc::now();
        if let Some(last) = last {
            let last = parse_ts(&last)?;
            if last > timestamp {
                timestamp = last;
            }
        }

        let id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO incident_logs (id, incident_id, timestamp, message, source, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id.to_string())
        .bind(incident_id)
        .bind(format_ts(timestamp))
        .bind(message)
        .bind(source.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(IncidentLogEntry {
            id,
            incident_id: incident_id.to_string(),
            seq: result.last_insert_rowid(),
            timestamp,
            message: message.to_string(),
            source: source.clone(),
            status,
        })
    }

    #[instrument(skip(self))]
    async fn list_logs(&self, incident_id: &str) -> Result<Vec<IncidentLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, id, incident_id, timestamp, message, source, status
            FROM incident_logs
            WHERE incident_id = ?1
            ORDER BY timestamp ASC, seq ASC
            "#,
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_log).collect()
    }
}
