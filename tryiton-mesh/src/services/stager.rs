//! Artifact stager: downloads the source image into a fresh scratch workspace

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::services::workspace::ScratchWorkspace;

const USER_AGENT: &str = concat!("tryiton-mesh/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used for source downloads
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

pub struct ArtifactStager {
    http: reqwest::Client,
    scratch_root: PathBuf,
    keep_workspaces: bool,
}

impl ArtifactStager {
    pub fn new(http: reqwest::Client, scratch_root: PathBuf, keep_workspaces: bool) -> Self {
        Self {
            http,
            scratch_root,
            keep_workspaces,
        }
    }

    /// Fetch `url` and write its bytes verbatim into a new workspace
    ///
    /// Content is not inspected; the reconstruction tool rejects unreadable
    /// images itself.
    pub async fn stage(&self, url: &str) -> Result<ScratchWorkspace, PipelineError> {
        let fetch_failed = |reason: String| PipelineError::SourceFetchFailed {
            url: url.to_string(),
            reason,
        };

        debug!(url, "Downloading source image");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let workspace = ScratchWorkspace::create(&self.scratch_root, self.keep_workspaces).await?;
        tokio::fs::write(workspace.input_path(), &bytes).await?;

        info!(
            run_id = %workspace.id(),
            bytes = bytes.len(),
            input = %workspace.input_path().display(),
            "Source image staged"
        );

        Ok(workspace)
    }
}
