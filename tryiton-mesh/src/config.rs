//! Service configuration for tryiton-mesh
//!
//! Built once at startup and handed to each component; nothing reads
//! credentials from ambient global state after that.
//!
//! Resolution order: TOML file → environment secrets → command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tryiton_common::config::{default_data_dir, DataFolder};
use tryiton_common::{Error, Result};

/// Config file name looked up under `<user config dir>/tryiton/`
pub const CONFIG_FILE_NAME: &str = "tryiton-mesh.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TRYITON_CONFIG";

pub const DEFAULT_RECONSTRUCTION_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 120;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    /// Data folder for the database and scratch space
    pub data_dir: Option<PathBuf>,
    pub scratch: ScratchConfig,
    pub fetch: FetchConfig,
    pub reconstruction: ToolConfig,
    pub conversion: ToolConfig,
    pub storage: StorageConfig,
    pub records: RecordsConfig,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: None,
            scratch: ScratchConfig::default(),
            fetch: FetchConfig::default(),
            reconstruction: ToolConfig {
                program: "python".to_string(),
                args: vec!["TripoSR/run.py".to_string()],
                timeout_secs: Some(DEFAULT_RECONSTRUCTION_TIMEOUT_SECS),
            },
            conversion: ToolConfig {
                program: "obj2gltf".to_string(),
                args: Vec::new(),
                timeout_secs: Some(DEFAULT_CONVERSION_TIMEOUT_SECS),
            },
            storage: StorageConfig::default(),
            records: RecordsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Parent of per-run workspaces (default: `<data_dir>/scratch`)
    pub root: Option<PathBuf>,
    /// Leave workspaces on disk after a run (debugging only)
    pub keep: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

/// External executable invocation settings
///
/// `args` are prefix arguments placed before the stage's own contract
/// arguments, e.g. the script path when `program` is an interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolConfig {
    /// Configured timeout, or `default_secs` when unset
    pub fn timeout_or(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(default_secs))
    }
}

/// Cloudinary credentials and upload folders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub mesh_folder: String,
    pub preview_folder: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_base: "https://api.cloudinary.com".to_string(),
            mesh_folder: "tryiton/3d_meshes".to_string(),
            preview_folder: "tryiton/3d_renders".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    #[default]
    Sqlite,
    Postgrest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    pub backend: RecordBackend,
    /// SQLite file (default: `<data_dir>/tryiton.db`)
    pub database_path: Option<PathBuf>,
    /// PostgREST project URL
    pub url: Option<String>,
    /// PostgREST service key
    pub key: Option<String>,
    pub table: String,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: RecordBackend::Sqlite,
            database_path: None,
            url: None,
            key: None,
            table: "user_models".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Overlay secrets from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay secrets from `lookup`; blank values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CLOUDINARY_CLOUD_NAME") {
            self.storage.cloud_name = v;
        }
        if let Some(v) = get("CLOUDINARY_API_KEY") {
            self.storage.api_key = v;
        }
        if let Some(v) = get("CLOUDINARY_API_SECRET") {
            self.storage.api_secret = v;
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.records.url = Some(v);
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.records.key = Some(v);
        }
    }

    /// Check that everything needed to serve requests is present
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.storage.cloud_name.trim().is_empty() {
            missing.push("storage.cloud_name (CLOUDINARY_CLOUD_NAME)");
        }
        if self.storage.api_key.trim().is_empty() {
            missing.push("storage.api_key (CLOUDINARY_API_KEY)");
        }
        if self.storage.api_secret.trim().is_empty() {
            missing.push("storage.api_secret (CLOUDINARY_API_SECRET)");
        }
        if self.records.backend == RecordBackend::Postgrest {
            if self.records.url.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push("records.url (SUPABASE_URL)");
            }
            if self.records.key.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push("records.key (SUPABASE_KEY)");
            }
        }
        if self.reconstruction.program.trim().is_empty() {
            missing.push("reconstruction.program");
        }
        if self.conversion.program.trim().is_empty() {
            missing.push("conversion.program");
        }

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        // A zero timeout expires on first poll and fails every request
        let zero_timeouts: Vec<&str> = [
            ("reconstruction.timeout_secs", self.reconstruction.timeout_secs),
            ("conversion.timeout_secs", self.conversion.timeout_secs),
            ("fetch.timeout_secs", Some(self.fetch.timeout_secs)),
            ("storage.timeout_secs", Some(self.storage.timeout_secs)),
        ]
        .into_iter()
        .filter(|(_, secs)| *secs == Some(0))
        .map(|(name, _)| name)
        .collect();

        if zero_timeouts.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Timeouts must be at least 1 second: {}",
                zero_timeouts.join(", ")
            )))
        }
    }

    pub fn data_folder(&self) -> DataFolder {
        DataFolder::new(self.data_dir.clone().unwrap_or_else(default_data_dir))
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch
            .root
            .clone()
            .unwrap_or_else(|| self.data_folder().scratch_path())
    }

    pub fn database_path(&self) -> PathBuf {
        self.records
            .database_path
            .clone()
            .unwrap_or_else(|| self.data_folder().database_path())
    }
}
