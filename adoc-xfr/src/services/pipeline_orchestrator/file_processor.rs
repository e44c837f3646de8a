//! Single-file pipeline: unpack → substitute → classify → repack
//!
//! A file's result is returned as a local [`FileOutcome`]; the orchestrator
//! folds outcomes into the run aggregate in one place.

use super::statistics::FileStats;
use super::RunPhase;
use crate::config::XfrSettings;
use crate::error::XfrError;
use crate::models::{ArchiveEntry, AssetRecord, PolicyFileKind, SourceFile, SourceKind, TransformSpec};
use crate::services::archive_repacker::ArchiveRepacker;
use crate::services::archive_unpacker::ArchiveUnpacker;
use crate::services::asset_classifier::AssetClassifier;
use crate::services::string_substitution::{substitute_with, SubstitutionOptions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Succeeded,
    Failed,
}

/// Everything one file contributes to the run
#[derive(Debug)]
pub struct FileOutcome {
    pub source: SourceFile,
    pub status: FileStatus,
    /// Empty when the file failed
    pub records: Vec<AssetRecord>,
    pub stats: FileStats,
    /// File- and entry-scoped errors; entry errors may accompany success
    pub errors: Vec<XfrError>,
    pub output: Option<PathBuf>,
}

impl FileOutcome {
    fn failed(source: &SourceFile, stats: FileStats, mut errors: Vec<XfrError>, error: XfrError) -> Self {
        tracing::warn!(path = %source.path.display(), "File failed: {}", error);
        errors.push(error);
        Self {
            source: source.clone(),
            status: FileStatus::Failed,
            records: Vec::new(),
            stats,
            errors,
            output: None,
        }
    }
}

pub struct FileProcessor {
    unpacker: ArchiveUnpacker,
    classifier: AssetClassifier,
    repacker: ArchiveRepacker,
    transform: TransformSpec,
    options: SubstitutionOptions,
    output_dir: PathBuf,
}

impl FileProcessor {
    pub fn new(settings: &XfrSettings, transform: TransformSpec) -> Self {
        Self {
            unpacker: ArchiveUnpacker::new(settings.max_input_bytes),
            classifier: AssetClassifier::new(settings.descriptor.clone()),
            repacker: ArchiveRepacker::new(settings.pretty_json),
            transform,
            options: SubstitutionOptions {
                keys: settings.substitute_keys,
            },
            output_dir: settings.policy_import_dir(),
        }
    }

    /// Run one file through the pipeline
    ///
    /// Never fails: file-scoped errors mark the outcome failed.
    pub fn process(&self, source: &SourceFile) -> FileOutcome {
        let mut stats = FileStats::default();

        tracing::debug!(path = %source.path.display(), phase = %RunPhase::Unpacking, "File phase");
        let raw = match self.unpacker.open(source) {
            Ok(raw) => raw,
            Err(e) => return FileOutcome::failed(source, stats, Vec::new(), e),
        };
        let original_count = raw.len();
        let (entries, mut errors) = ArchiveUnpacker::decode(source, raw);

        // A loose file is its only entry: nothing to pass through
        if source.kind == SourceKind::Json && !errors.is_empty() {
            let error = errors.remove(0);
            return FileOutcome::failed(source, stats, errors, error);
        }

        tracing::debug!(path = %source.path.display(), phase = %RunPhase::Substituting, "File phase");
        let entries: Vec<ArchiveEntry> = entries
            .into_iter()
            .map(|entry| match entry {
                ArchiveEntry::Json {
                    name,
                    document,
                    compression,
                } => {
                    let result = substitute_with(&document.value, &self.transform, self.options);
                    stats.string_leaves_changed += result.changed_leaves;
                    stats.keys_kept += result.kept_keys;
                    stats.changed |= result.changed();
                    ArchiveEntry::Json {
                        name,
                        document: document.with_value(result.value),
                        compression,
                    }
                }
                other => other,
            })
            .collect();

        tracing::debug!(path = %source.path.display(), phase = %RunPhase::Classifying, "File phase");
        let mut records = Vec::new();
        for entry in &entries {
            match entry {
                ArchiveEntry::Json { name, document, .. } => {
                    let kind = PolicyFileKind::from_file_name(name);
                    let classification = self.classifier.classify(document);
                    stats.documents += 1;
                    *stats.documents_by_kind.entry(kind).or_insert(0) += 1;
                    stats.descriptors_without_uid += classification.descriptors_without_uid;
                    stats.policies.absorb(&classification.policies);
                    tracing::debug!(
                        path = %source.path.display(),
                        entry = %name,
                        kind = %kind,
                        assets = classification.records.len(),
                        "Document classified"
                    );
                    records.extend(classification.records);
                }
                ArchiveEntry::Opaque { .. } => stats.opaque_entries += 1,
                ArchiveEntry::Directory { .. } => {}
            }
        }

        tracing::debug!(path = %source.path.display(), phase = %RunPhase::Repacking, "File phase");
        let output = match self
            .repacker
            .repack(source, original_count, &entries, &self.output_dir)
        {
            Ok(output) => output,
            Err(e) => return FileOutcome::failed(source, stats, errors, e),
        };

        tracing::info!(
            path = %source.path.display(),
            documents = stats.documents,
            changed = stats.changed,
            assets = records.len(),
            "Processed → {}",
            output.display()
        );

        FileOutcome {
            source: source.clone(),
            status: FileStatus::Succeeded,
            records,
            stats,
            errors,
            output: Some(output),
        }
    }
}
