//! Output validator: after a clean exit, the mesh file is what decides
//! whether reconstruction actually produced something

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::services::reconstruction::DeclaredArtifacts;

/// Reconstruction outputs confirmed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructionArtifacts {
    pub mesh_path: PathBuf,
    /// Present only if the tool rendered a preview
    pub preview_path: Option<PathBuf>,
}

/// Confirm the declared mesh exists; keep the preview only if it does
pub async fn validate_outputs(declared: DeclaredArtifacts) -> Result<ReconstructionArtifacts, PipelineError> {
    let DeclaredArtifacts {
        mesh_path,
        preview_path,
    } = declared;

    if !is_file(&mesh_path).await {
        warn!(path = %mesh_path.display(), "Reconstruction left no mesh");
        return Err(PipelineError::ArtifactMissing { path: mesh_path });
    }

    let preview_path = if is_file(&preview_path).await {
        Some(preview_path)
    } else {
        debug!(path = %preview_path.display(), "No preview render produced");
        None
    };

    Ok(ReconstructionArtifacts {
        mesh_path,
        preview_path,
    })
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
