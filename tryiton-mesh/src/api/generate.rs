//! Mesh generation endpoint
//!
//! POST /generate_3d runs the whole pipeline synchronously and answers with
//! the published URLs.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ApiError, ApiResult, PipelineError, MISSING_IMAGE_URL};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Always "success"
    pub status: String,
    pub mesh_url: String,
    /// `null` when no preview was rendered or its upload failed
    pub render_preview: Option<String>,
}

/// POST /generate_3d
///
/// A missing, empty, or non-JSON body is rejected before any work starts.
pub async fn generate_3d(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> ApiResult<Json<GenerateResponse>> {
    let image_url = body
        .and_then(|Json(request)| request.image_url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::BadRequest(MISSING_IMAGE_URL.to_string()))?;

    info!(image_url = %image_url, "Mesh generation requested");

    // Detached so a disconnecting client cannot abandon a run halfway
    let pipeline = state.pipeline.clone();
    let handle = tokio::spawn(async move { pipeline.run(&image_url).await });

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            record_failure(&state, &e).await;
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "Pipeline task aborted");
            *state.last_error.write().await = Some(format!("Pipeline task aborted: {}", e));
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    Ok(Json(GenerateResponse {
        status: "success".to_string(),
        mesh_url: outcome.mesh_url,
        render_preview: outcome.preview_url,
    }))
}

async fn record_failure(state: &AppState, err: &PipelineError) {
    if matches!(err, PipelineError::InvalidInput(_)) {
        return;
    }
    *state.last_error.write().await = Some(format!("{}: {}", err.headline(), err.details()));
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/generate_3d", post(generate_3d))
}
