//! Run statistics
//!
//! Per-file results are folded into [`RunStatistics`] in one place by the
//! orchestrator; nothing here is shared between files while they are processed.

use super::file_processor::{FileOutcome, FileStatus};
use crate::error::XfrError;
use crate::models::{AssetCategory, PolicyFileKind, SourceKind};
use crate::services::asset_classifier::{AssetAggregate, PolicyCounts};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Counters for a single file
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileStats {
    /// True when at least one string leaf changed
    pub changed: bool,
    pub documents: usize,
    pub string_leaves_changed: usize,
    /// Keys left unrenamed because their new name was taken
    pub keys_kept: usize,
    pub opaque_entries: usize,
    pub descriptors_without_uid: usize,
    pub policies: PolicyCounts,
    pub documents_by_kind: BTreeMap<PolicyFileKind, usize>,
}

/// A file- or entry-scoped error kept for the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedError {
    pub path: PathBuf,
    pub entry: Option<String>,
    /// Verbatim error text
    pub cause: String,
}

impl RecordedError {
    /// Record `error`, falling back to `source` when the error carries no path
    pub fn from_error(error: &XfrError, source: &std::path::Path) -> Self {
        Self {
            path: error.path().unwrap_or(source).to_path_buf(),
            entry: error.entry().map(str::to_string),
            cause: error.to_string(),
        }
    }
}

/// Counters for a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub files_seen: usize,
    pub archives_seen: usize,
    pub json_files_seen: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub files_changed: usize,
    pub documents_processed: usize,
    pub string_leaves_changed: usize,
    pub keys_kept: usize,
    pub opaque_entries: usize,
    pub descriptors_without_uid: usize,
    pub policies: PolicyCounts,
    pub documents_by_kind: BTreeMap<PolicyFileKind, usize>,
    /// Distinct assets per category, filled once all files are folded in
    pub assets_by_category: BTreeMap<AssetCategory, usize>,
    pub errors: Vec<RecordedError>,
}

impl RunStatistics {
    /// Fold one file's outcome into the run counters
    pub fn absorb(&mut self, outcome: &FileOutcome) {
        self.files_seen += 1;
        match outcome.source.kind {
            SourceKind::Archive => self.archives_seen += 1,
            SourceKind::Json => self.json_files_seen += 1,
        }
        match outcome.status {
            FileStatus::Succeeded => self.files_succeeded += 1,
            FileStatus::Failed => self.files_failed += 1,
        }

        let stats = &outcome.stats;
        if stats.changed && outcome.status == FileStatus::Succeeded {
            self.files_changed += 1;
        }
        self.documents_processed += stats.documents;
        self.string_leaves_changed += stats.string_leaves_changed;
        self.keys_kept += stats.keys_kept;
        self.opaque_entries += stats.opaque_entries;
        self.descriptors_without_uid += stats.descriptors_without_uid;
        self.policies.absorb(&stats.policies);
        for (kind, count) in &stats.documents_by_kind {
            *self.documents_by_kind.entry(*kind).or_insert(0) += count;
        }

        self.errors.extend(
            outcome
                .errors
                .iter()
                .map(|e| RecordedError::from_error(e, &outcome.source.path)),
        );
    }

    /// Snapshot the per-category asset counts
    pub fn record_assets(&mut self, aggregate: &AssetAggregate) {
        self.assets_by_category = AssetCategory::ALL
            .iter()
            .map(|&category| (category, aggregate.count(category)))
            .collect();
    }

    pub fn asset_count(&self, category: AssetCategory) -> usize {
        self.assets_by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn files_display_string(&self) -> String {
        format!(
            "{} files seen ({} archives, {} JSON), {} succeeded, {} failed, {} changed",
            self.files_seen,
            self.archives_seen,
            self.json_files_seen,
            self.files_succeeded,
            self.files_failed,
            self.files_changed
        )
    }

    pub fn documents_display_string(&self) -> String {
        format!(
            "{} documents processed, {} string values changed, {} non-JSON entries passed through",
            self.documents_processed, self.string_leaves_changed, self.opaque_entries
        )
    }

    pub fn policies_display_string(&self) -> String {
        format!(
            "{} policies: {} segmented SPARK, {} segmented JDBC_SQL, {} non-segmented",
            self.policies.total,
            self.policies.segmented_spark,
            self.policies.segmented_jdbc,
            self.policies.non_segmented
        )
    }

    pub fn assets_display_string(&self) -> String {
        format!(
            "{} assets ({} segmented SPARK, {} segmented JDBC_SQL, {} tagged), {} descriptors without uid",
            self.asset_count(AssetCategory::AllAssets),
            self.asset_count(AssetCategory::SegmentedSpark),
            self.asset_count(AssetCategory::SegmentedJdbc),
            self.asset_count(AssetCategory::TagBearing),
            self.descriptors_without_uid
        )
    }
}
