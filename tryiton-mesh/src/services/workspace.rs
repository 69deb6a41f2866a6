//! Per-run scratch workspace and the file layout the external tools agree on
//!
//! Every path a run touches is a pure function of the scratch root and the
//! run id, so the layout can be checked without launching any tool:
//!
//! ```text
//! <scratch_root>/<run_id>/<run_id>.png          staged source image
//! <scratch_root>/<run_id>/output/               reconstruction output dir
//! <scratch_root>/<run_id>/output/0/mesh.obj     reconstructed mesh (required)
//! <scratch_root>/<run_id>/output/0/render_000.png  preview render (optional)
//! <scratch_root>/<run_id>/output/0/mesh.glb     converted mesh
//! ```

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Subdirectory the reconstruction tool writes its first (only) result into
pub const RECONSTRUCTION_SUBDIR: &str = "0";

/// Mesh export format requested from the reconstruction tool
pub const MESH_FORMAT: &str = "obj";

pub const MESH_FILE_STEM: &str = "mesh";
pub const PREVIEW_FILE_NAME: &str = "render_000.png";

/// Extension of the distribution format produced by the converter
pub const CONVERTED_EXTENSION: &str = "glb";

const OUTPUT_DIR_NAME: &str = "output";
const INPUT_EXTENSION: &str = "png";

/// Expected mesh location inside a reconstruction output directory
pub fn mesh_path(output_dir: &Path) -> PathBuf {
    output_dir
        .join(RECONSTRUCTION_SUBDIR)
        .join(format!("{}.{}", MESH_FILE_STEM, MESH_FORMAT))
}

/// Expected preview render location inside a reconstruction output directory
pub fn preview_path(output_dir: &Path) -> PathBuf {
    output_dir.join(RECONSTRUCTION_SUBDIR).join(PREVIEW_FILE_NAME)
}

/// Converted mesh path: same directory and base name, converted extension
pub fn converted_path(mesh_path: &Path) -> PathBuf {
    mesh_path.with_extension(CONVERTED_EXTENSION)
}

/// Paths owned by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub id: Uuid,
    pub root: PathBuf,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(scratch_root: &Path, id: Uuid) -> Self {
        let root = scratch_root.join(id.to_string());
        Self {
            id,
            input_path: root.join(format!("{}.{}", id, INPUT_EXTENSION)),
            output_dir: root.join(OUTPUT_DIR_NAME),
            root,
        }
    }
}

/// Scratch directory owned by exactly one pipeline run
///
/// `close` removes it without blocking the runtime. A workspace dropped
/// without `close` (any failed run) is removed synchronously in `Drop`.
/// Nothing is removed when created with `keep = true`.
#[derive(Debug)]
pub struct ScratchWorkspace {
    layout: WorkspaceLayout,
    keep: bool,
    closed: bool,
}

impl ScratchWorkspace {
    /// Create a fresh workspace with a random v4 id under `scratch_root`
    pub async fn create(scratch_root: &Path, keep: bool) -> io::Result<Self> {
        let layout = WorkspaceLayout::new(scratch_root, Uuid::new_v4());

        // Guard first, so a failed mkdir below still cleans up
        let workspace = Self {
            layout,
            keep,
            closed: false,
        };
        tokio::fs::create_dir_all(&workspace.layout.output_dir).await?;

        debug!(
            run_id = %workspace.layout.id,
            root = %workspace.layout.root.display(),
            "Scratch workspace created"
        );

        Ok(workspace)
    }

    pub fn id(&self) -> Uuid {
        self.layout.id
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn input_path(&self) -> &Path {
        &self.layout.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.layout.output_dir
    }

    /// Remove the workspace on the blocking pool
    pub async fn close(mut self) {
        if self.keep {
            return;
        }
        self.closed = true;

        match tokio::fs::remove_dir_all(&self.layout.root).await {
            Ok(()) => debug!(run_id = %self.layout.id, "Scratch workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                root = %self.layout.root.display(),
                error = %e,
                "Failed to remove scratch workspace"
            ),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.keep {
            debug!(root = %self.layout.root.display(), "Keeping scratch workspace");
            return;
        }

        match std::fs::remove_dir_all(&self.layout.root) {
            Ok(()) => debug!(run_id = %self.layout.id, "Scratch workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                root = %self.layout.root.display(),
                error = %e,
                "Failed to remove scratch workspace"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_pure_function_of_root_and_id() {
        let id = Uuid::parse_str("6f1c1f52-1b7e-4a53-9a51-0d5a0d6c1a2b").unwrap();
        let layout = WorkspaceLayout::new(Path::new("/scratch"), id);

        assert_eq!(layout.root, PathBuf::from("/scratch/6f1c1f52-1b7e-4a53-9a51-0d5a0d6c1a2b"));
        assert_eq!(
            layout.input_path,
            PathBuf::from("/scratch/6f1c1f52-1b7e-4a53-9a51-0d5a0d6c1a2b/6f1c1f52-1b7e-4a53-9a51-0d5a0d6c1a2b.png")
        );
        assert_eq!(
            layout.output_dir,
            PathBuf::from("/scratch/6f1c1f52-1b7e-4a53-9a51-0d5a0d6c1a2b/output")
        );
        assert_eq!(layout, WorkspaceLayout::new(Path::new("/scratch"), id));
    }

    #[test]
    fn test_artifact_conventions() {
        let out = Path::new("/scratch/run/output");
        assert_eq!(mesh_path(out), PathBuf::from("/scratch/run/output/0/mesh.obj"));
        assert_eq!(preview_path(out), PathBuf::from("/scratch/run/output/0/render_000.png"));
        assert_eq!(
            converted_path(&mesh_path(out)),
            PathBuf::from("/scratch/run/output/0/mesh.glb")
        );
    }

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::create(scratch.path(), false).await.unwrap();
        let root = workspace.root().to_path_buf();

        assert!(workspace.output_dir().is_dir());
        std::fs::write(workspace.input_path(), b"bytes").unwrap();

        drop(workspace);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_close_removes_workspace() {
        let scratch = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::create(scratch.path(), false).await.unwrap();
        let root = workspace.root().to_path_buf();
        std::fs::write(workspace.output_dir().join("big.obj"), b"v 0 0 0").unwrap();

        workspace.close().await;

        assert!(!root.exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_close_honours_keep() {
        let scratch = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::create(scratch.path(), true).await.unwrap();
        let root = workspace.root().to_path_buf();

        workspace.close().await;

        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_workspace_kept_when_requested() {
        let scratch = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::create(scratch.path(), true).await.unwrap();
        let root = workspace.root().to_path_buf();

        drop(workspace);
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_workspaces_do_not_collide() {
        let scratch = tempfile::tempdir().unwrap();
        let a = ScratchWorkspace::create(scratch.path(), false).await.unwrap();
        let b = ScratchWorkspace::create(scratch.path(), false).await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.root(), b.root());
    }
}
