//! Object storage abstraction
//!
//! The publisher only needs "put this file in that folder, give me a URL";
//! `ObjectStore` is that seam. `CloudinaryStore` is the production backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected storage response: {0}")]
    Parse(String),
}

/// How the provider should treat an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Opaque bytes, never reinterpreted (meshes)
    Raw,
    Image,
}

impl AssetKind {
    /// Provider resource type path segment
    pub fn resource_type(self) -> &'static str {
        match self {
            AssetKind::Raw => "raw",
            AssetKind::Image => "image",
        }
    }
}

/// A stored object's durable location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub secure_url: String,
    pub public_id: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` into logical `folder`
    async fn upload(&self, path: &Path, folder: &str, kind: AssetKind) -> Result<StoredObject, StorageError>;
}
