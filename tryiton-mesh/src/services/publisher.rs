//! Artifact publisher: uploads the converted mesh and the optional preview

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::services::storage::{AssetKind, ObjectStore};
use crate::services::validator::is_file;

/// Public URLs of a run's published artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedAsset {
    pub mesh_url: String,
    pub preview_url: Option<String>,
}

pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    mesh_folder: String,
    preview_folder: String,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, mesh_folder: String, preview_folder: String) -> Self {
        Self {
            store,
            mesh_folder,
            preview_folder,
        }
    }

    /// Upload the mesh (fatal on failure), then the preview (best effort)
    pub async fn publish(&self, mesh_path: &Path, preview_path: Option<&Path>) -> Result<PublishedAsset, PipelineError> {
        let mesh = self
            .store
            .upload(mesh_path, &self.mesh_folder, AssetKind::Raw)
            .await
            .map_err(PipelineError::PublishFailed)?;

        info!(url = %mesh.secure_url, "Mesh published");

        let preview_url = match preview_path {
            Some(path) => self.publish_preview(path).await,
            None => None,
        };

        Ok(PublishedAsset {
            mesh_url: mesh.secure_url,
            preview_url,
        })
    }

    async fn publish_preview(&self, path: &Path) -> Option<String> {
        if !is_file(path).await {
            return None;
        }

        match self.store.upload(path, &self.preview_folder, AssetKind::Image).await {
            Ok(preview) => {
                info!(url = %preview.secure_url, "Preview render published");
                Some(preview.secure_url)
            }
            Err(e) => {
                warn!(error = %e, "Preview upload failed; continuing without preview");
                None
            }
        }
    }
}
