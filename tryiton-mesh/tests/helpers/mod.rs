//! Shared fixtures for pipeline and HTTP tests
//!
//! External tools are stand-in `/bin/sh` scripts that honour the same
//! argument contracts as the real ones. Every script appends one line to
//! `calls.log` so tests can tell which stages ran.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::header, routing::get, Router};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tryiton_mesh::config::{ServiceConfig, ToolConfig};
use tryiton_mesh::services::{
    build_http_client, AssetKind, MeshPipeline, ObjectStore, RecordStore, SqliteRecordStore,
    StorageError, StoredObject,
};

/// Minimal PNG signature plus filler; the tools never decode it
pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-body";

/// Writes mesh and preview into `<out>/0/`
pub const RECONSTRUCT_OK: &str = r#"
out="$3"
mkdir -p "$out/0"
echo "v 0 0 0" > "$out/0/mesh.obj"
echo "png" > "$out/0/render_000.png"
"#;

/// Writes the mesh only
pub const RECONSTRUCT_NO_PREVIEW: &str = r#"
out="$3"
mkdir -p "$out/0"
echo "v 0 0 0" > "$out/0/mesh.obj"
"#;

/// Exits 0 without writing anything
pub const RECONSTRUCT_NOTHING: &str = "exit 0\n";

/// Writes a mesh, then fails anyway
pub const RECONSTRUCT_FAIL: &str = r#"
out="$3"
mkdir -p "$out/0"
echo "v 0 0 0" > "$out/0/mesh.obj"
echo "CUDA out of memory" >&2
exit 1
"#;

pub const RECONSTRUCT_HANG: &str = "exec sleep 30\n";

/// `-i <mesh> -o <glb>`
pub const CONVERT_OK: &str = "cp \"$2\" \"$4\"\n";

pub const CONVERT_FAIL: &str = "echo \"unsupported face\" >&2\nexit 2\n";

/// Reports success but never writes the GLB
pub const CONVERT_NOTHING: &str = "exit 0\n";

/// Object store double; URLs are `https://cdn/<file name>`
#[derive(Default)]
pub struct RecordingStore {
    pub fail_images: bool,
    pub fail_raw: bool,
    pub uploads: Mutex<Vec<(String, AssetKind, String)>>,
}

impl RecordingStore {
    pub fn uploads(&self) -> Vec<(String, AssetKind, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn upload(&self, path: &Path, folder: &str, kind: AssetKind) -> Result<StoredObject, StorageError> {
        // Like the real backend, a missing file cannot be uploaded
        tokio::fs::metadata(path).await.map_err(|e| StorageError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let rejected = match kind {
            AssetKind::Image => self.fail_images,
            AssetKind::Raw => self.fail_raw,
        };
        if rejected {
            return Err(StorageError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        self.uploads
            .lock()
            .unwrap()
            .push((folder.to_string(), kind, name.clone()));

        Ok(StoredObject {
            secure_url: format!("https://cdn/{}", name),
            public_id: format!("{}/{}", folder, name),
        })
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub config: ServiceConfig,
    pub image_base: String,
    pub objects: Arc<RecordingStore>,
    pub records: Arc<SqliteRecordStore>,
    /// Same pool as `records`; close it to make inserts fail
    pub pool: SqlitePool,
}

impl TestEnv {
    pub async fn new(reconstruct: &str, convert: &str) -> Self {
        Self::with_store(reconstruct, convert, RecordingStore::default()).await
    }

    pub async fn with_store(reconstruct: &str, convert: &str, objects: RecordingStore) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        let calls = dir.path().join("calls.log");
        let reconstruct_script = write_script(dir.path(), "reconstruct.sh", "reconstruct", &calls, reconstruct);
        let convert_script = write_script(dir.path(), "convert.sh", "convert", &calls, convert);

        let mut config = ServiceConfig::default();
        config.data_dir = Some(dir.path().to_path_buf());
        config.scratch.root = Some(scratch);
        config.reconstruction = sh_tool(&reconstruct_script, 10);
        config.conversion = sh_tool(&convert_script, 10);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        tryiton_common::db::create_schema(&pool).await.unwrap();

        Self {
            dir,
            config,
            image_base: spawn_image_server().await,
            objects: Arc::new(objects),
            records: Arc::new(SqliteRecordStore::new(pool.clone())),
            pool,
        }
    }

    pub fn image_url(&self, path: &str) -> String {
        format!("{}/{}", self.image_base, path)
    }

    pub fn pipeline(&self) -> MeshPipeline {
        MeshPipeline::from_config(
            &self.config,
            build_http_client(Duration::from_secs(5)).unwrap(),
            self.objects.clone(),
            self.records.clone(),
        )
    }

    /// Stage names in invocation order
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Entries left under the scratch root
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.config.scratch_root()).unwrap().count()
    }

    pub async fn record_count(&self) -> usize {
        self.records.list().await.unwrap().len()
    }
}

fn sh_tool(script: &Path, timeout_secs: u64) -> ToolConfig {
    ToolConfig {
        program: "/bin/sh".to_string(),
        args: vec![script.to_string_lossy().to_string()],
        timeout_secs: Some(timeout_secs),
    }
}

fn write_script(dir: &Path, file_name: &str, stage: &str, calls: &Path, body: &str) -> PathBuf {
    let path = dir.join(file_name);
    let script = format!("echo {} >> '{}'\n{}", stage, calls.display(), body);
    std::fs::write(&path, script).unwrap();
    path
}

/// Serve `IMAGE_BYTES` at `/img.png`; everything else is 404
async fn spawn_image_server() -> String {
    let app = Router::new().route(
        "/img.png",
        get(|| async { ([(header::CONTENT_TYPE, "image/png")], IMAGE_BYTES) }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
