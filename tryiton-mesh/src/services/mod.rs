//! Pipeline stages and the backends they publish to

pub mod cloudinary;
pub mod converter;
pub mod pipeline;
pub mod process;
pub mod publisher;
pub mod reconstruction;
pub mod records;
pub mod stager;
pub mod storage;
pub mod validator;
pub mod workspace;

pub use cloudinary::CloudinaryStore;
pub use converter::{ConversionStage, ConvertedMesh};
pub use pipeline::{GenerationOutcome, MeshPipeline};
pub use process::{run_stage, ProcessResult, ProcessStage, StageFailure, StageRun};
pub use publisher::{ArtifactPublisher, PublishedAsset};
pub use reconstruction::{DeclaredArtifacts, ReconstructionStage};
pub use records::{PostgrestRecordStore, RecordStore, RecordStoreError, RecordWriter, SqliteRecordStore};
pub use stager::{build_http_client, ArtifactStager};
pub use storage::{AssetKind, ObjectStore, StorageError, StoredObject};
pub use validator::{validate_outputs, ReconstructionArtifacts};
pub use workspace::{ScratchWorkspace, WorkspaceLayout};
