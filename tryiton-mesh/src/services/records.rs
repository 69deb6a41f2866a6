//! Record store backends and the record writer
//!
//! `SqliteRecordStore` keeps records in the local database;
//! `PostgrestRecordStore` writes the same rows to a hosted PostgREST
//! (Supabase) table.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tryiton_common::db::{self, ModelRecord, NewModelRecord};

use crate::error::PipelineError;

/// Record store errors
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error(transparent)]
    Database(#[from] tryiton_common::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Record store API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected record store response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one row; the store assigns `id` and `created_at`
    async fn insert(&self, record: NewModelRecord) -> Result<ModelRecord, RecordStoreError>;

    /// All rows, highest id first
    async fn list(&self) -> Result<Vec<ModelRecord>, RecordStoreError>;
}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: NewModelRecord) -> Result<ModelRecord, RecordStoreError> {
        Ok(db::insert_model_record(&self.pool, &record).await?)
    }

    async fn list(&self) -> Result<Vec<ModelRecord>, RecordStoreError> {
        Ok(db::list_model_records(&self.pool).await?)
    }
}

pub struct PostgrestRecordStore {
    http: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl PostgrestRecordStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, RecordStoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RecordStoreError::Network(e.to_string()))?;

        Ok(Self {
            http,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<ModelRecord>, RecordStoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordStoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RecordStoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for PostgrestRecordStore {
    async fn insert(&self, record: NewModelRecord) -> Result<ModelRecord, RecordStoreError> {
        let response = self
            .request(self.http.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(|e| RecordStoreError::Network(e.to_string()))?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecordStoreError::Parse("insert returned no rows".to_string()))
    }

    async fn list(&self) -> Result<Vec<ModelRecord>, RecordStoreError> {
        let response = self
            .request(self.http.get(&self.table_url))
            .query(&[("select", "*"), ("order", "id.desc")])
            .send()
            .await
            .map_err(|e| RecordStoreError::Network(e.to_string()))?;

        Self::rows(response).await
    }
}

/// Last pipeline stage: makes a published asset discoverable
pub struct RecordWriter {
    store: Arc<dyn RecordStore>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn persist(
        &self,
        source_image_url: &str,
        mesh_url: &str,
        preview_url: Option<&str>,
    ) -> Result<ModelRecord, PipelineError> {
        let record = self
            .store
            .insert(NewModelRecord {
                image_url: source_image_url.to_string(),
                mesh_url: mesh_url.to_string(),
                preview_url: preview_url.map(str::to_string),
            })
            .await
            .map_err(PipelineError::PersistFailed)?;

        info!(record_id = record.id, "Model record saved");
        Ok(record)
    }
}
