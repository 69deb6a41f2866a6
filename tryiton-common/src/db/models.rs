//! Model record rows and queries

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// A persisted 3D generation result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: i64,
    /// Source photo the mesh was reconstructed from
    pub image_url: String,
    pub mesh_url: String,
    pub preview_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Columns supplied by the caller; `id` and `created_at` come from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewModelRecord {
    pub image_url: String,
    pub mesh_url: String,
    pub preview_url: Option<String>,
}

/// Insert a model record and return it as stored
pub async fn insert_model_record(pool: &SqlitePool, record: &NewModelRecord) -> Result<ModelRecord> {
    let row = sqlx::query(
        r#"
        INSERT INTO user_models (image_url, mesh_url, preview_url)
        VALUES (?, ?, ?)
        RETURNING id, created_at
        "#,
    )
    .bind(&record.image_url)
    .bind(&record.mesh_url)
    .bind(&record.preview_url)
    .fetch_one(pool)
    .await?;

    let created_at: String = row.get("created_at");

    Ok(ModelRecord {
        id: row.get("id"),
        image_url: record.image_url.clone(),
        mesh_url: record.mesh_url.clone(),
        preview_url: record.preview_url.clone(),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// List all model records, newest (highest id) first
pub async fn list_model_records(pool: &SqlitePool) -> Result<Vec<ModelRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, image_url, mesh_url, preview_url, created_at
        FROM user_models
        ORDER BY id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            Ok(ModelRecord {
                id: row.get("id"),
                image_url: row.get("image_url"),
                mesh_url: row.get("mesh_url"),
                preview_url: row.get("preview_url"),
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| Error::Timestamp {
            value: value.to_string(),
            source,
        })
}
