//! Domain record operations

use super::helpers::{db_err, format_ts};
use super::sqlite_store::SqliteStore;
use super::traits::RecordStore;
use crate::error::{Error, Result};
use chrono::Utc;
use sqlx::Row;
use tracing::instrument;

fn not_found(kind: &str, id: &str) -> Error {
    Error::RecordNotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get_record(&self, kind: &str, id: &str) -> Result<serde_json::Value> {
        let data: String = sqlx::query("SELECT data FROM records WHERE kind = ?1 AND id = ?2")
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| row.get("data"))
            .ok_or_else(|| not_found(kind, id))?;

        serde_json::from_str(&data).map_err(|e| Error::Serialization(format!("invalid json: {e}")))
    }

    #[instrument(skip(self, data))]
    async fn put_record(&self, kind: &str, id: &str, data: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (kind, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(kind, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(data.to_string())
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn patch_record(
        &self,
        kind: &str,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        // RFC 7396 merge inside a single statement, no read-modify-write
        let patch_json = serde_json::Value::Object(patch.clone()).to_string();
        let result = sqlx::query(
            r#"
            UPDATE records SET data = json_patch(data, ?3), updated_at = ?4
            WHERE kind = ?1 AND id = ?2
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(patch_json)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found(kind, id));
        }
        self.get_record(kind, id).await
    }
}
