//! tryiton-mesh - Image-to-3D generation service
//!
//! Serves `POST /generate_3d`: downloads an image, reconstructs a mesh,
//! converts it to GLB, publishes it to object storage and records the
//! result.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tryiton_common::config::{load_toml_config, resolve_config_path};
use tryiton_common::db::init_database;
use tryiton_mesh::config::{RecordBackend, ServiceConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use tryiton_mesh::services::pipeline::tool_time_budget;
use tryiton_mesh::services::{
    build_http_client, CloudinaryStore, MeshPipeline, ObjectStore, PostgrestRecordStore,
    RecordStore, SqliteRecordStore,
};
use tryiton_mesh::{build_router, AppState};

/// Command-line arguments for tryiton-mesh
#[derive(Parser, Debug)]
#[command(name = "tryiton-mesh")]
#[command(about = "Image-to-3D mesh generation service")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "TRYITON_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides server.host)
    #[arg(long, env = "TRYITON_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "TRYITON_PORT")]
    port: Option<u16>,

    /// Data folder for the database and scratch space (overrides data_dir)
    #[arg(short, long, env = "TRYITON_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let mut config: ServiceConfig =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tryiton-mesh v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using compiled defaults"),
    }

    config.validate().context("Invalid configuration")?;

    let data_folder = config.data_folder();
    data_folder
        .ensure_directory_exists()
        .context("Failed to initialize data folder")?;
    let scratch_root = config.scratch_root();
    tokio::fs::create_dir_all(&scratch_root)
        .await
        .with_context(|| format!("Failed to create scratch root {}", scratch_root.display()))?;
    info!("Data folder: {}", data_folder.root().display());
    info!("Scratch root: {}", scratch_root.display());

    let http = build_http_client(Duration::from_secs(config.fetch.timeout_secs))
        .context("Failed to build HTTP client")?;

    let objects: Arc<dyn ObjectStore> =
        Arc::new(CloudinaryStore::new(&config.storage).context("Failed to configure object storage")?);

    let records: Arc<dyn RecordStore> = match config.records.backend {
        RecordBackend::Sqlite => {
            let db_path = config.database_path();
            info!("Database: {}", db_path.display());
            let pool = init_database(&db_path)
                .await
                .context("Failed to open database")?;
            Arc::new(SqliteRecordStore::new(pool))
        }
        RecordBackend::Postgrest => {
            let url = config.records.url.as_deref().unwrap_or_default();
            let key = config.records.key.as_deref().unwrap_or_default();
            info!("Record store: {} (table {})", url, config.records.table);
            Arc::new(
                PostgrestRecordStore::new(url, key, &config.records.table)
                    .context("Failed to configure record store")?,
            )
        }
    };

    info!(
        "Reconstruction: {} {:?}; conversion: {} {:?}; tool time per request up to {}s",
        config.reconstruction.program,
        config.reconstruction.args,
        config.conversion.program,
        config.conversion.args,
        tool_time_budget(&config).as_secs()
    );

    let pipeline = MeshPipeline::from_config(&config, http, objects, records);
    let app = build_router(AppState::new(pipeline));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
