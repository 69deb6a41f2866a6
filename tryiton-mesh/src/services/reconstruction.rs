//! Reconstruction invoker: runs the image-to-mesh tool against a staged input
//!
//! Argument contract (after the configured prefix args):
//! `<input> --output-dir <dir> --model-save-format obj --render`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ToolConfig, DEFAULT_RECONSTRUCTION_TIMEOUT_SECS};
use crate::error::PipelineError;
use crate::services::process::{run_stage, ProcessStage, StageFailure};
use crate::services::workspace::{self, ScratchWorkspace, WorkspaceLayout, MESH_FORMAT};

/// Files the reconstruction tool promises to write; the validator checks
/// exactly these
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredArtifacts {
    pub mesh_path: PathBuf,
    pub preview_path: PathBuf,
}

impl DeclaredArtifacts {
    pub fn in_output_dir(output_dir: &Path) -> Self {
        Self {
            mesh_path: workspace::mesh_path(output_dir),
            preview_path: workspace::preview_path(output_dir),
        }
    }
}

pub struct ReconstructionStage {
    tool: ToolConfig,
    timeout: Duration,
}

impl ReconstructionStage {
    pub fn new(tool: ToolConfig) -> Self {
        let timeout = tool.timeout_or(DEFAULT_RECONSTRUCTION_TIMEOUT_SECS);
        Self { tool, timeout }
    }

    /// Run the tool; a non-zero exit fails immediately without looking for
    /// the mesh file
    pub async fn reconstruct(&self, workspace: &ScratchWorkspace) -> Result<DeclaredArtifacts, PipelineError> {
        let run = run_stage(self, workspace.layout()).await?;
        Ok(run.outputs)
    }
}

impl ProcessStage for ReconstructionStage {
    type Input = WorkspaceLayout;
    type Output = DeclaredArtifacts;

    fn name(&self) -> &'static str {
        "reconstruction"
    }

    fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_args(&self, layout: &WorkspaceLayout) -> Vec<OsString> {
        vec![
            layout.input_path.clone().into_os_string(),
            "--output-dir".into(),
            layout.output_dir.clone().into_os_string(),
            "--model-save-format".into(),
            MESH_FORMAT.into(),
            "--render".into(),
        ]
    }

    fn declared_outputs(&self, layout: &WorkspaceLayout) -> DeclaredArtifacts {
        DeclaredArtifacts::in_output_dir(&layout.output_dir)
    }

    fn failure(&self, failure: StageFailure) -> PipelineError {
        match failure {
            StageFailure::Launch(e) => PipelineError::ReconstructionFailed {
                exit_code: None,
                details: format!("failed to run {}: {}", self.tool.program, e),
            },
            StageFailure::Exit(result) => PipelineError::ReconstructionFailed {
                exit_code: result.exit_code,
                details: result.stderr,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process::ProcessResult;
    use uuid::Uuid;

    fn stage() -> ReconstructionStage {
        ReconstructionStage::new(ToolConfig {
            program: "python".to_string(),
            args: vec!["TripoSR/run.py".to_string()],
            timeout_secs: None,
        })
    }

    #[test]
    fn test_argument_contract() {
        let layout = WorkspaceLayout::new(Path::new("/scratch"), Uuid::nil());
        let args = stage().build_args(&layout);

        let expected: Vec<OsString> = vec![
            "/scratch/00000000-0000-0000-0000-000000000000/00000000-0000-0000-0000-000000000000.png".into(),
            "--output-dir".into(),
            "/scratch/00000000-0000-0000-0000-000000000000/output".into(),
            "--model-save-format".into(),
            "obj".into(),
            "--render".into(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_declared_outputs_follow_layout() {
        let layout = WorkspaceLayout::new(Path::new("/scratch"), Uuid::nil());
        let declared = stage().declared_outputs(&layout);

        assert_eq!(declared.mesh_path, layout.output_dir.join("0").join("mesh.obj"));
        assert_eq!(declared.preview_path, layout.output_dir.join("0").join("render_000.png"));
    }

    #[test]
    fn test_default_timeout_applies() {
        assert_eq!(
            stage().timeout(),
            Duration::from_secs(DEFAULT_RECONSTRUCTION_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_exit_failure_keeps_stderr() {
        let err = stage().failure(StageFailure::Exit(ProcessResult {
            exit_code: Some(2),
            stdout: "loading model".to_string(),
            stderr: "Traceback: boom".to_string(),
        }));

        match err {
            PipelineError::ReconstructionFailed { exit_code, details } => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(details, "Traceback: boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
