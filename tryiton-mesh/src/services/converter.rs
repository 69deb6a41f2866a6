//! Format converter: transcodes the reconstructed mesh to a binary glTF
//!
//! Argument contract (after the configured prefix args):
//! `-i <mesh> -o <mesh-dir>/<stem>.glb`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ToolConfig, DEFAULT_CONVERSION_TIMEOUT_SECS};
use crate::error::PipelineError;
use crate::services::process::{run_stage, ProcessStage, StageFailure};
use crate::services::workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedMesh {
    pub glb_path: PathBuf,
}

pub struct ConversionStage {
    tool: ToolConfig,
    timeout: Duration,
}

impl ConversionStage {
    pub fn new(tool: ToolConfig) -> Self {
        let timeout = tool.timeout_or(DEFAULT_CONVERSION_TIMEOUT_SECS);
        Self { tool, timeout }
    }

    /// Convert `mesh_path`. The output file is not checked here; a missing
    /// file surfaces as a failed upload.
    pub async fn convert(&self, mesh_path: &Path) -> Result<ConvertedMesh, PipelineError> {
        let run = run_stage(self, mesh_path).await?;
        Ok(run.outputs)
    }
}

impl ProcessStage for ConversionStage {
    type Input = Path;
    type Output = ConvertedMesh;

    fn name(&self) -> &'static str {
        "conversion"
    }

    fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_args(&self, mesh_path: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            mesh_path.as_os_str().to_owned(),
            "-o".into(),
            workspace::converted_path(mesh_path).into_os_string(),
        ]
    }

    fn declared_outputs(&self, mesh_path: &Path) -> ConvertedMesh {
        ConvertedMesh {
            glb_path: workspace::converted_path(mesh_path),
        }
    }

    fn failure(&self, failure: StageFailure) -> PipelineError {
        match failure {
            StageFailure::Launch(e) => PipelineError::ConversionFailed {
                exit_code: None,
                details: format!("failed to run {}: {}", self.tool.program, e),
            },
            StageFailure::Exit(result) => PipelineError::ConversionFailed {
                exit_code: result.exit_code,
                details: result.stderr,
            },
        }
    }
}
