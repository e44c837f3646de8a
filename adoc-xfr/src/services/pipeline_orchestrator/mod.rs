//! Transfer pipeline orchestrator
//!
//! # State Progression
//! DISCOVERING → PROCESSING → WRITING → REPORTING → COMPLETED | CANCELLED | FAILED
//!
//! Inside PROCESSING each file goes through UNPACKING → SUBSTITUTING →
//! CLASSIFYING → REPACKING (see [`FileProcessor`]).
//!
//! # Failure scopes
//! - File-scoped errors are recorded in [`RunStatistics::errors`] and the loop
//!   moves on to the next file.
//! - Bad input path, output directory and manifest errors abort the run.
//!
//! # Cancellation
//! The token is checked once per file boundary. Outputs of completed files and
//! the manifests built from them are kept; a cancelled run is a partial success.

mod file_processor;
mod statistics;

pub use file_processor::{FileOutcome, FileProcessor, FileStatus};
pub use statistics::{FileStats, RecordedError, RunStatistics};

use crate::config::XfrSettings;
use crate::error::{XfrError, XfrResult};
use crate::models::TransformSpec;
use crate::services::asset_classifier::AssetAggregate;
use crate::services::file_scanner::FileScanner;
use crate::services::manifest_writer::{ManifestWriter, WrittenManifest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Run and per-file phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Discovering,
    Processing,
    Unpacking,
    Substituting,
    Classifying,
    Repacking,
    Writing,
    Reporting,
    Completed,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Cancelled | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunPhase::Discovering => "DISCOVERING",
            RunPhase::Processing => "PROCESSING",
            RunPhase::Unpacking => "UNPACKING",
            RunPhase::Substituting => "SUBSTITUTING",
            RunPhase::Classifying => "CLASSIFYING",
            RunPhase::Repacking => "REPACKING",
            RunPhase::Writing => "WRITING",
            RunPhase::Reporting => "REPORTING",
            RunPhase::Completed => "COMPLETED",
            RunPhase::Cancelled => "CANCELLED",
            RunPhase::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    /// Failed iff files were found and none succeeded
    fn from_run(cancelled: bool, statistics: &RunStatistics) -> Self {
        if cancelled {
            RunStatus::Cancelled
        } else if statistics.files_seen > 0 && statistics.files_succeeded == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    fn phase(self) -> RunPhase {
        match self {
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Cancelled => RunPhase::Cancelled,
            RunStatus::Failed => RunPhase::Failed,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.phase(), f)
    }
}

/// Final, immutable result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub statistics: RunStatistics,
    pub manifests: Vec<WrittenManifest>,
    /// Import-ready files, in processing order
    pub outputs: Vec<PathBuf>,
}

impl RunReport {
    /// Human-readable summary; every recorded error is listed verbatim
    pub fn display_lines(&self) -> Vec<String> {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let mut lines = vec![
            format!("Run {} {} in {:.1}s", self.run_id, self.status, elapsed),
            format!("Input:  {}", self.input_dir.display()),
            format!("Output: {}", self.output_root.display()),
            self.statistics.files_display_string(),
            self.statistics.documents_display_string(),
            self.statistics.policies_display_string(),
            self.statistics.assets_display_string(),
        ];

        if !self.statistics.documents_by_kind.is_empty() {
            lines.push("Documents by type:".to_string());
            for (kind, count) in &self.statistics.documents_by_kind {
                lines.push(format!("  {}: {}", kind, count));
            }
        }

        if !self.manifests.is_empty() {
            lines.push("Manifests:".to_string());
            for manifest in &self.manifests {
                lines.push(format!("  {} ({} rows)", manifest.path.display(), manifest.rows));
            }
        }

        if self.statistics.errors.is_empty() {
            lines.push("No errors".to_string());
        } else {
            lines.push(format!("Errors ({}):", self.statistics.errors.len()));
            for error in &self.statistics.errors {
                lines.push(format!("  - {}", error.cause));
            }
        }
        lines
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> XfrResult<()> {
        let write_error = |reason: String| XfrError::FileWrite {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_error(e.to_string()))
    }
}

/// Pipeline orchestrator service
pub struct PipelineOrchestrator {
    settings: XfrSettings,
    scanner: FileScanner,
    processor: FileProcessor,
    transform_description: String,
}

impl PipelineOrchestrator {
    pub fn new(settings: XfrSettings, transform: TransformSpec) -> Self {
        let transform_description = transform.describe();
        Self {
            scanner: FileScanner::new(&settings),
            processor: FileProcessor::new(&settings, transform),
            settings,
            transform_description,
        }
    }

    /// Execute one complete run
    ///
    /// Returns `Err` only for run-scoped failures; everything else ends up in
    /// the report.
    pub fn run(&self, cancel_token: &CancellationToken) -> XfrResult<RunReport> {
        self.run_with_progress(cancel_token, |_| {})
    }

    /// [`run`](Self::run), calling `on_file` after each file's outcome is folded in
    pub fn run_with_progress(
        &self,
        cancel_token: &CancellationToken,
        mut on_file: impl FnMut(&FileOutcome),
    ) -> XfrResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut phase = RunPhase::Discovering;

        tracing::info!(
            run_id = %run_id,
            input = %self.settings.input_dir.display(),
            output = %self.settings.output_root.display(),
            "Starting transfer run"
        );
        if self.transform_description.is_empty() {
            tracing::warn!("No string transforms given; outputs will match inputs");
        } else {
            tracing::info!("String transforms: {}", self.transform_description);
        }

        // Layout first so discovery can recognise an output root nested in the input
        FileScanner::check_root(&self.settings.input_dir)?;
        self.create_output_layout()?;
        let discovery = self.scanner.discover(&self.settings.input_dir)?;

        transition(run_id, &mut phase, RunPhase::Processing);
        let mut statistics = RunStatistics::default();
        let mut aggregate = AssetAggregate::new();
        let mut outputs = Vec::new();
        let mut cancelled = false;

        for item in discovery {
            if cancel_token.is_cancelled() {
                tracing::info!(
                    run_id = %run_id,
                    processed = statistics.files_seen,
                    "Run cancelled at file boundary"
                );
                cancelled = true;
                break;
            }

            let source = match item {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    statistics
                        .errors
                        .push(RecordedError::from_error(&e, &self.settings.input_dir));
                    continue;
                }
            };

            let outcome = self.processor.process(&source);
            statistics.absorb(&outcome);
            on_file(&outcome);
            if let Some(output) = outcome.output {
                outputs.push(output);
            }
            aggregate.absorb(outcome.records);
        }

        if statistics.files_seen == 0 && !cancelled {
            tracing::warn!(
                input = %self.settings.input_dir.display(),
                "No archive or JSON files found"
            );
        }

        transition(run_id, &mut phase, RunPhase::Writing);
        statistics.record_assets(&aggregate);
        let manifests = ManifestWriter::write_all(&aggregate, &self.settings.output_root)?;

        transition(run_id, &mut phase, RunPhase::Reporting);
        let status = RunStatus::from_run(cancelled, &statistics);
        transition(run_id, &mut phase, status.phase());

        let report = RunReport {
            run_id,
            input_dir: self.settings.input_dir.clone(),
            output_root: self.settings.output_root.clone(),
            started_at,
            finished_at: Utc::now(),
            status,
            statistics,
            manifests,
            outputs,
        };

        tracing::info!(
            run_id = %run_id,
            status = %report.status,
            files = report.statistics.files_seen,
            failed = report.statistics.files_failed,
            assets = report.statistics.asset_count(crate::models::AssetCategory::AllAssets),
            "Transfer run finished"
        );
        Ok(report)
    }

    fn create_output_layout(&self) -> XfrResult<()> {
        let dirs = [
            self.settings.output_root.clone(),
            self.settings.policy_import_dir(),
            self.settings.policy_export_dir(),
            self.settings.asset_export_dir(),
        ];
        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| XfrError::OutputDirectory {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }
        tracing::debug!(output = %self.settings.output_root.display(), "Output layout ready");
        Ok(())
    }
}

fn transition(run_id: Uuid, phase: &mut RunPhase, next: RunPhase) {
    tracing::info!(run_id = %run_id, from = %phase, to = %next, "Phase transition");
    *phase = next;
    if next.is_terminal() {
        tracing::debug!(run_id = %run_id, "Run reached terminal phase {}", next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_rules() {
        let mut statistics = RunStatistics::default();
        assert_eq!(RunStatus::from_run(false, &statistics), RunStatus::Completed);

        statistics.files_seen = 2;
        statistics.files_failed = 2;
        assert_eq!(RunStatus::from_run(false, &statistics), RunStatus::Failed);
        assert_eq!(RunStatus::from_run(true, &statistics), RunStatus::Cancelled);

        statistics.files_succeeded = 1;
        assert_eq!(RunStatus::from_run(false, &statistics), RunStatus::Completed);
    }

    #[test]
    fn test_empty_input_completes_with_header_only_manifests() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        let output = temp_dir.path().join("out");

        let orchestrator = PipelineOrchestrator::new(XfrSettings::new(&input, &output), TransformSpec::empty());
        let report = orchestrator.run(&CancellationToken::new()).unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.manifests.len(), 4);
        assert!(output.join("policy-import").is_dir());
        assert_eq!(
            std::fs::read_to_string(output.join("asset-export/asset_uids.csv")).unwrap(),
            "uid\n"
        );
    }

    #[test]
    fn test_missing_input_is_run_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let orchestrator = PipelineOrchestrator::new(
            XfrSettings::new(temp_dir.path().join("missing"), &output),
            TransformSpec::empty(),
        );
        let err = orchestrator.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, XfrError::Discovery { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_cancelled_before_first_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("a.json"), r#"{"uid":"x","tags":["t"]}"#).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let orchestrator = PipelineOrchestrator::new(
            XfrSettings::new(&input, temp_dir.path().join("out")),
            TransformSpec::empty(),
        );
        let report = orchestrator.run(&token).unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.statistics.files_seen, 0);
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_cancel_between_files_keeps_completed_work() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(
                input.join(format!("{}.json", name)),
                format!(r#"{{"uid":"tbl_{}","tags":["t"]}}"#, name),
            )
            .unwrap();
        }
        let output = temp_dir.path().join("out");

        let token = CancellationToken::new();
        let orchestrator = PipelineOrchestrator::new(XfrSettings::new(&input, &output), TransformSpec::empty());
        let report = orchestrator
            .run_with_progress(&token, |_| token.cancel())
            .unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.statistics.files_seen, 1);
        assert_eq!(report.outputs, vec![output.join("policy-import/a_import_ready.json")]);
        assert!(report.outputs[0].is_file());
        assert!(!output.join("policy-import/b_import_ready.json").exists());
        assert_eq!(
            std::fs::read_to_string(output.join("asset-export/asset_uids.csv")).unwrap(),
            "uid\ntbl_a\n"
        );
        assert_eq!(report.manifests.len(), 4);
    }

    #[test]
    fn test_manifest_failure_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("a.json"), r#"{"uid":"x","tags":["t"]}"#).unwrap();
        let output = temp_dir.path().join("out");
        // A directory where the manifest file should go
        std::fs::create_dir_all(output.join("asset-export/asset_uids.csv")).unwrap();

        let orchestrator = PipelineOrchestrator::new(XfrSettings::new(&input, &output), TransformSpec::empty());
        let err = orchestrator.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, XfrError::ManifestWrite { .. }));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_output_directory_failure_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("a.json"), r#"{"uid":"x"}"#).unwrap();
        let output = temp_dir.path().join("out");
        std::fs::write(&output, "a file, not a directory").unwrap();

        let orchestrator = PipelineOrchestrator::new(XfrSettings::new(&input, &output), TransformSpec::empty());
        let err = orchestrator.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, XfrError::OutputDirectory { .. }));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_display_lines_list_errors_verbatim() {
        let mut statistics = RunStatistics::default();
        statistics.errors.push(RecordedError {
            path: PathBuf::from("/in/b.zip"),
            entry: None,
            cause: "Corrupt archive /in/b.zip: invalid Zip archive".to_string(),
        });
        let now = Utc::now();
        let report = RunReport {
            run_id: Uuid::nil(),
            input_dir: PathBuf::from("/in"),
            output_root: PathBuf::from("/out"),
            started_at: now,
            finished_at: now,
            status: RunStatus::Completed,
            statistics,
            manifests: Vec::new(),
            outputs: Vec::new(),
        };
        let lines = report.display_lines();
        assert!(lines[0].contains("COMPLETED"));
        assert!(lines
            .iter()
            .any(|l| l == "  - Corrupt archive /in/b.zip: invalid Zip archive"));
    }
}
