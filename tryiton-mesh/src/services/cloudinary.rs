//! Cloudinary upload client
//!
//! Signed uploads against `POST {api_base}/v1_1/{cloud}/{raw|image}/upload`.
//! Signatures use SHA-256, so the account's signature algorithm must be set
//! to SHA-256.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::services::storage::{AssetKind, ObjectStore, StorageError, StoredObject};

/// Subset of the upload response we rely on
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

pub struct CloudinaryStore {
    http: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn upload_url(&self, kind: AssetKind) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.api_base,
            self.cloud_name,
            kind.resource_type()
        )
    }
}

/// Sign upload parameters: sorted `key=value` pairs joined by `&`, with the
/// API secret appended, hashed with SHA-256 and hex encoded
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(&self, path: &Path, folder: &str, kind: AssetKind) -> Result<StoredObject, StorageError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(&[("folder", folder), ("timestamp", timestamp.as_str())], &self.api_secret);

        let size = bytes.len();
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature);

        debug!(folder, kind = kind.resource_type(), bytes = size, "Uploading to Cloudinary");

        let response = self
            .http
            .post(self.upload_url(kind))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Parse(e.to_string()))?;

        info!(
            public_id = %uploaded.public_id,
            url = %uploaded.secure_url,
            "Cloudinary upload complete"
        );

        Ok(StoredObject {
            secure_url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(&StorageConfig {
            cloud_name: "demo".to_string(),
            api_key: "123".to_string(),
            api_secret: "abcd".to_string(),
            api_base: "https://api.cloudinary.com/".to_string(),
            ..StorageConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_signature_is_sorted_and_deterministic() {
        let a = sign_params(&[("timestamp", "1700000000"), ("folder", "tryiton/3d_meshes")], "abcd");
        let b = sign_params(&[("folder", "tryiton/3d_meshes"), ("timestamp", "1700000000")], "abcd");

        assert_eq!(a, b);
        assert_eq!(a, "f6a109e2666ad28db1d817666af58c191629c605ed28322edac439e646209002");
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("folder", "f"), ("timestamp", "1")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }

    #[test]
    fn test_upload_url_per_kind() {
        let store = store();
        assert_eq!(
            store.upload_url(AssetKind::Raw),
            "https://api.cloudinary.com/v1_1/demo/raw/upload"
        );
        assert_eq!(
            store.upload_url(AssetKind::Image),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    /// Local stand-in for the upload API; `demo` accepts, `locked` rejects
    async fn mock_api() -> String {
        use axum::{extract::Path as UrlPath, http::StatusCode, routing::post, Json, Router};

        let app = Router::new().route(
            "/v1_1/:cloud/:kind/upload",
            post(|UrlPath((cloud, kind)): UrlPath<(String, String)>| async move {
                if cloud != "demo" {
                    return Err((StatusCode::UNAUTHORIZED, "Invalid Signature"));
                }
                Ok(Json(serde_json::json!({
                    "secure_url": format!("https://res.cloudinary.com/demo/{}/upload/v1/x", kind),
                    "public_id": "tryiton/3d_meshes/x",
                })))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn local_store(api_base: String, cloud_name: &str) -> CloudinaryStore {
        CloudinaryStore::new(&StorageConfig {
            cloud_name: cloud_name.to_string(),
            api_key: "123".to_string(),
            api_secret: "abcd".to_string(),
            api_base,
            ..StorageConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_parses_response() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = dir.path().join("mesh.glb");
        std::fs::write(&mesh, b"glTF").unwrap();

        let stored = local_store(mock_api().await, "demo")
            .upload(&mesh, "tryiton/3d_meshes", AssetKind::Raw)
            .await
            .unwrap();

        assert_eq!(stored.secure_url, "https://res.cloudinary.com/demo/raw/upload/v1/x");
        assert_eq!(stored.public_id, "tryiton/3d_meshes/x");
    }

    #[tokio::test]
    async fn test_rejected_upload_carries_status_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = dir.path().join("mesh.glb");
        std::fs::write(&mesh, b"glTF").unwrap();

        let err = local_store(mock_api().await, "locked")
            .upload(&mesh, "tryiton/3d_meshes", AssetKind::Raw)
            .await
            .unwrap_err();

        match err {
            StorageError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid Signature");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_network() {
        let err = store()
            .upload(Path::new("/nonexistent/mesh.glb"), "tryiton/3d_meshes", AssetKind::Raw)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Read { .. }));
    }
}
