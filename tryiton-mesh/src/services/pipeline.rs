//! Mesh generation pipeline
//!
//! One run moves strictly forward through
//! stage → reconstruct → validate → convert → publish → persist.
//! Any stage error ends the run; nothing is uploaded unless conversion
//! succeeded and nothing is recorded unless the mesh upload succeeded.
//! The scratch workspace lives exactly as long as the run.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{field, info, info_span, warn, Instrument};
use tryiton_common::db::ModelRecord;

use crate::config::ServiceConfig;
use crate::error::{PipelineError, MISSING_IMAGE_URL};
use crate::services::converter::ConversionStage;
use crate::services::publisher::ArtifactPublisher;
use crate::services::reconstruction::ReconstructionStage;
use crate::services::records::{RecordStore, RecordWriter};
use crate::services::stager::ArtifactStager;
use crate::services::storage::ObjectStore;
use crate::services::validator::validate_outputs;

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub mesh_url: String,
    pub preview_url: Option<String>,
    pub record: ModelRecord,
}

pub struct MeshPipeline {
    stager: ArtifactStager,
    reconstruction: ReconstructionStage,
    conversion: ConversionStage,
    publisher: ArtifactPublisher,
    records: RecordWriter,
}

impl MeshPipeline {
    pub fn new(
        stager: ArtifactStager,
        reconstruction: ReconstructionStage,
        conversion: ConversionStage,
        publisher: ArtifactPublisher,
        records: RecordWriter,
    ) -> Self {
        Self {
            stager,
            reconstruction,
            conversion,
            publisher,
            records,
        }
    }

    /// Wire every stage from configuration and the given backends
    pub fn from_config(
        config: &ServiceConfig,
        http: reqwest::Client,
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self::new(
            ArtifactStager::new(http, config.scratch_root(), config.scratch.keep),
            ReconstructionStage::new(config.reconstruction.clone()),
            ConversionStage::new(config.conversion.clone()),
            ArtifactPublisher::new(
                objects,
                config.storage.mesh_folder.clone(),
                config.storage.preview_folder.clone(),
            ),
            RecordWriter::new(records),
        )
    }

    /// Turn the image at `image_url` into a published, recorded mesh
    pub async fn run(&self, image_url: &str) -> Result<GenerationOutcome, PipelineError> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(PipelineError::InvalidInput(MISSING_IMAGE_URL.to_string()));
        }

        let span = info_span!("pipeline", run_id = field::Empty);
        let started = Instant::now();

        let result = self.execute(image_url).instrument(span.clone()).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| match &result {
            Ok(outcome) => info!(
                elapsed_ms,
                record_id = outcome.record.id,
                "Pipeline run succeeded"
            ),
            Err(e) => warn!(elapsed_ms, kind = e.kind(), error = %e, "Pipeline run failed"),
        });

        result
    }

    async fn execute(&self, image_url: &str) -> Result<GenerationOutcome, PipelineError> {
        let workspace = self.stager.stage(image_url).await?;
        tracing::Span::current().record("run_id", field::display(workspace.id()));

        info!(stage = "reconstruct", "Stage started");
        let declared = self.reconstruction.reconstruct(&workspace).await?;

        info!(stage = "validate", "Stage started");
        let artifacts = validate_outputs(declared).await?;

        info!(stage = "convert", "Stage started");
        let converted = self.conversion.convert(&artifacts.mesh_path).await?;

        info!(stage = "publish", "Stage started");
        let published = self
            .publisher
            .publish(&converted.glb_path, artifacts.preview_path.as_deref())
            .await?;

        info!(stage = "persist", "Stage started");
        let record = self
            .records
            .persist(image_url, &published.mesh_url, published.preview_url.as_deref())
            .await?;

        // Failed runs fall back to the guard's synchronous removal
        workspace.close().await;

        Ok(GenerationOutcome {
            mesh_url: published.mesh_url,
            preview_url: published.preview_url,
            record,
        })
    }
}

/// Longest a single run can take on tool time alone
pub fn tool_time_budget(config: &ServiceConfig) -> Duration {
    use crate::config::{DEFAULT_CONVERSION_TIMEOUT_SECS, DEFAULT_RECONSTRUCTION_TIMEOUT_SECS};

    config.reconstruction.timeout_or(DEFAULT_RECONSTRUCTION_TIMEOUT_SECS)
        + config.conversion.timeout_or(DEFAULT_CONVERSION_TIMEOUT_SECS)
}
