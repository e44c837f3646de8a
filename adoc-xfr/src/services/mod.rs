//! Pipeline stages
//!
//! Leaves first: discovery and unpacking, substitution, classification,
//! repacking and manifests; the orchestrator composes them.

pub mod archive_repacker;
pub mod archive_unpacker;
pub mod asset_classifier;
pub mod file_scanner;
pub mod manifest_writer;
pub mod pipeline_orchestrator;
pub mod string_substitution;

pub use archive_repacker::ArchiveRepacker;
pub use archive_unpacker::{decode_json, ArchiveUnpacker};
pub use asset_classifier::{
    AssetAggregate, AssetClassifier, Classification, DescriptorFields, DescriptorMatch, PolicyCounts,
};
pub use file_scanner::{Discovery, FileScanner};
pub use manifest_writer::{ManifestKind, ManifestWriter, WrittenManifest};
pub use pipeline_orchestrator::{
    FileOutcome, FileProcessor, FileStats, FileStatus, PipelineOrchestrator, RecordedError, RunPhase,
    RunReport, RunStatistics, RunStatus,
};
pub use string_substitution::{substitute, substitute_with, Substitution, SubstitutionOptions};
