//! Error types for tryiton-mesh
//!
//! `PipelineError` is the generation pipeline's failure taxonomy; `ApiError`
//! maps it onto the HTTP error contract.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::services::records::RecordStoreError;
use crate::services::storage::StorageError;

/// Error text for a request without a usable `image_url`
pub const MISSING_IMAGE_URL: &str = "Missing image_url";

/// Pipeline stage failure. The first one aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request rejected before any stage ran
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Source image could not be downloaded
    #[error("Failed to fetch source image {url}: {reason}")]
    SourceFetchFailed { url: String, reason: String },

    /// Scratch directory or file could not be created or written
    #[error("Scratch workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    /// Reconstruction tool could not be launched or exited non-zero
    #[error("Reconstruction failed (exit code {exit_code:?})")]
    ReconstructionFailed {
        exit_code: Option<i32>,
        details: String,
    },

    /// Reconstruction reported success but left no mesh behind
    #[error("Reconstruction produced no mesh at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// Converter could not be launched or exited non-zero
    #[error("Mesh conversion failed (exit code {exit_code:?})")]
    ConversionFailed {
        exit_code: Option<i32>,
        details: String,
    },

    /// An external tool exceeded its time budget and was killed
    #[error("{stage} timed out after {}s", timeout.as_secs())]
    TimedOut {
        stage: &'static str,
        timeout: Duration,
    },

    /// Converted mesh upload failed
    #[error("Mesh upload failed: {0}")]
    PublishFailed(#[source] StorageError),

    /// Model record insert failed
    #[error("Failed to save model record: {0}")]
    PersistFailed(#[source] RecordStoreError),
}

impl PipelineError {
    /// Short machine-friendly kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::SourceFetchFailed { .. } => "source_fetch_failed",
            PipelineError::Workspace(_) => "workspace",
            PipelineError::ReconstructionFailed { .. } => "reconstruction_failed",
            PipelineError::ArtifactMissing { .. } => "artifact_missing",
            PipelineError::ConversionFailed { .. } => "conversion_failed",
            PipelineError::TimedOut { .. } => "timed_out",
            PipelineError::PublishFailed(_) => "publish_failed",
            PipelineError::PersistFailed(_) => "persist_failed",
        }
    }

    /// Stage-specific message for the `error` field of the HTTP body
    pub fn headline(&self) -> String {
        match self {
            PipelineError::InvalidInput(msg) => msg.clone(),
            PipelineError::SourceFetchFailed { .. } => "Failed to download source image".to_string(),
            PipelineError::Workspace(_) => "Scratch workspace error".to_string(),
            PipelineError::ReconstructionFailed { .. } => "Reconstruction failed".to_string(),
            PipelineError::ArtifactMissing { .. } => "3D mesh not generated".to_string(),
            PipelineError::ConversionFailed { .. } => "OBJ→GLB conversion failed".to_string(),
            PipelineError::TimedOut { stage, .. } => format!("{} timed out", stage),
            PipelineError::PublishFailed(_) => "Mesh upload failed".to_string(),
            PipelineError::PersistFailed(_) => "Failed to save model record".to_string(),
        }
    }

    /// Diagnostic text for the `details` field of the HTTP body
    pub fn details(&self) -> String {
        match self {
            PipelineError::InvalidInput(msg) => msg.clone(),
            PipelineError::SourceFetchFailed { url, reason } => format!("{}: {}", url, reason),
            PipelineError::Workspace(err) => err.to_string(),
            PipelineError::ReconstructionFailed { details, .. } => details.clone(),
            PipelineError::ArtifactMissing { path } => {
                format!("expected mesh file at {}", path.display())
            }
            PipelineError::ConversionFailed { details, .. } => details.clone(),
            PipelineError::TimedOut { timeout, .. } => {
                format!("no result after {} seconds; process killed", timeout.as_secs())
            }
            PipelineError::PublishFailed(err) => err.to_string(),
            PipelineError::PersistFailed(err) => err.to_string(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Pipeline stage failure (400 for invalid input, otherwise 500)
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) | ApiError::Pipeline(PipelineError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            ApiError::Pipeline(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": err.headline(),
                    "details": err.details(),
                }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Internal server error",
                    "details": msg,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
