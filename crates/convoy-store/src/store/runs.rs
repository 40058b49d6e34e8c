//! Run operations

use super::helpers::{db_err, format_ts, row_to_run};
use super::sqlite_store::SqliteStore;
use super::traits::RunStore;
use crate::error::{Error, Result};
use crate::model::{NewRun, Run, RunMetadata};
use chrono::Utc;
use tracing::{debug, instrument};

const RUN_COLUMNS: &str = "run_id, context_type, context_id, name, description, status, \
     platform_url, metadata, version, created_at, updated_at";

fn serialize_metadata(metadata: &RunMetadata) -> Result<String> {
    serde_json::to_string(metadata).map_err(|e| Error::Serialization(e.to_string()))
}

#[async_trait::async_trait]
impl RunStore for SqliteStore {
    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn insert_run(&self, run: &NewRun) -> Result<Run> {
        let now = Utc::now();
        let stored = Run {
            run_id: run.run_id.clone(),
            context_type: run.context_type.clone(),
            context_id: run.context_id.clone(),
            name: run.name.clone(),
            description: run.description.clone(),
            status: run.status,
            platform_url: run.platform_url.clone(),
            metadata: RunMetadata::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO runs (
                run_id, context_type, context_id, name, description,
                status, platform_url, metadata, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)
            "#,
        )
        .bind(&stored.run_id)
        .bind(&stored.context_type)
        .bind(&stored.context_id)
        .bind(&stored.name)
        .bind(&stored.description)
        .bind(stored.status.as_str())
        .bind(&stored.platform_url)
        .bind(serialize_metadata(&stored.metadata)?)
        .bind(format_ts(stored.created_at))
        .bind(format_ts(stored.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Inserted run {}", stored.run_id);
                Ok(stored)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateRun(stored.run_id))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    #[instrument(skip(self))]
    async fn get_run(&self, run_id: &str) -> Result<Run> {
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?1"))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;

        row_to_run(row)
    }

    #[instrument(skip(self))]
    async fn list_runs(
        &self,
        context_type: Option<&str>,
        context_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Run>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RUN_COLUMNS} FROM runs
            WHERE (?1 IS NULL OR context_type = ?1)
              AND (?2 IS NULL OR context_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#
        ))
        .bind(context_type)
        .bind(context_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_run).collect()
    }

    #[instrument(skip(self))]
    async fn list_active_runs(&self, limit: i64) -> Result<Vec<Run>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RUN_COLUMNS} FROM runs
            WHERE status IN ('PENDING', 'RUNNING')
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_run).collect()
    }

    #[instrument(skip(self, run), fields(run_id = %run.run_id, version = run.version))]
    async fn compare_and_swap(&self, run: &Run) -> Result<Run> {
        let updated_at = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = ?3, metadata = ?4, platform_url = ?5,
                updated_at = ?6, version = version + 1
            WHERE run_id = ?1 AND version = ?2
            "#,
        )
        .bind(&run.run_id)
        .bind(run.version)
        .bind(run.status.as_str())
        .bind(serialize_metadata(&run.metadata)?)
        .bind(&run.platform_url)
        .bind(format_ts(updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            // Distinguish a vanished row from a lost race
            self.get_run(&run.run_id).await?;
            return Err(Error::VersionConflict {
                run_id: run.run_id.clone(),
                expected: run.version,
            });
        }

        debug!("Updated run {} to {}", run.run_id, run.status);
        let mut stored = run.clone();
        stored.updated_at = updated_at;
        stored.version = run.version + 1;
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn clear_runs(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM runs")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}
