//! CSV manifests consumed by the segment, asset and tag import commands
//!
//! Every manifest has a fixed header and rows sorted by uid (byte-wise), so
//! two runs over the same input produce identical files. Manifests overwrite
//! whatever is at their path.

use crate::config::{ASSET_EXPORT_DIR, POLICY_EXPORT_DIR};
use crate::error::{XfrError, XfrResult};
use crate::models::{AssetCategory, AssetRecord};
use crate::services::asset_classifier::AssetAggregate;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Separator used when several tags share one CSV cell
pub const TAG_SEPARATOR: &str = ":";

/// Fixed manifest set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    SegmentedSpark,
    SegmentedJdbc,
    AllAssets,
    TaggedAssets,
}

impl ManifestKind {
    pub const ALL: [ManifestKind; 4] = [
        ManifestKind::SegmentedSpark,
        ManifestKind::SegmentedJdbc,
        ManifestKind::AllAssets,
        ManifestKind::TaggedAssets,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ManifestKind::SegmentedSpark => "segmented_spark_uids.csv",
            ManifestKind::SegmentedJdbc => "segmented_jdbc_uids.csv",
            ManifestKind::AllAssets => "asset_uids.csv",
            ManifestKind::TaggedAssets => "tagged_asset_uids.csv",
        }
    }

    /// Sub-directory of the output root
    pub fn directory(self) -> &'static str {
        match self {
            ManifestKind::SegmentedSpark | ManifestKind::SegmentedJdbc => POLICY_EXPORT_DIR,
            ManifestKind::AllAssets | ManifestKind::TaggedAssets => ASSET_EXPORT_DIR,
        }
    }

    pub fn header(self) -> &'static [&'static str] {
        match self {
            ManifestKind::SegmentedSpark | ManifestKind::SegmentedJdbc => {
                &["uid", "source_env", "target_env"]
            }
            ManifestKind::AllAssets => &["uid"],
            ManifestKind::TaggedAssets => &["uid", "tags"],
        }
    }

    pub fn category(self) -> AssetCategory {
        match self {
            ManifestKind::SegmentedSpark => AssetCategory::SegmentedSpark,
            ManifestKind::SegmentedJdbc => AssetCategory::SegmentedJdbc,
            ManifestKind::AllAssets => AssetCategory::AllAssets,
            ManifestKind::TaggedAssets => AssetCategory::TagBearing,
        }
    }

    pub fn path(self, output_root: &Path) -> PathBuf {
        output_root.join(self.directory()).join(self.file_name())
    }

    fn row(self, record: &AssetRecord) -> Vec<String> {
        match self {
            // source_env and target_env are filled in by the segment export step
            ManifestKind::SegmentedSpark | ManifestKind::SegmentedJdbc => {
                vec![record.uid.clone(), String::new(), String::new()]
            }
            ManifestKind::AllAssets => vec![record.uid.clone()],
            ManifestKind::TaggedAssets => {
                let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
                vec![record.uid.clone(), tags.join(TAG_SEPARATOR)]
            }
        }
    }
}

/// One manifest as written by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenManifest {
    pub kind: ManifestKind,
    pub path: PathBuf,
    pub rows: usize,
}

pub struct ManifestWriter;

impl ManifestWriter {
    /// Write `records` as manifest `kind` at `output_path`
    ///
    /// Returns the number of data rows written. The header is always written.
    pub fn write(kind: ManifestKind, records: &[&AssetRecord], output_path: &Path) -> XfrResult<usize> {
        let manifest_error = |reason: String| XfrError::ManifestWrite {
            path: output_path.to_path_buf(),
            reason,
        };

        let mut sorted: Vec<&AssetRecord> = records.to_vec();
        sorted.sort_by(|a, b| a.uid.as_bytes().cmp(b.uid.as_bytes()));
        sorted.dedup_by(|a, b| a.uid == b.uid);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| manifest_error(e.to_string()))?;
        }

        let mut writer = csv::Writer::from_path(output_path).map_err(|e| manifest_error(e.to_string()))?;
        writer
            .write_record(kind.header())
            .map_err(|e| manifest_error(e.to_string()))?;
        for record in &sorted {
            writer
                .write_record(kind.row(record))
                .map_err(|e| manifest_error(e.to_string()))?;
        }
        writer.flush().map_err(|e| manifest_error(e.to_string()))?;

        tracing::info!(
            manifest = kind.file_name(),
            rows = sorted.len(),
            "Manifest written to {}",
            output_path.display()
        );
        Ok(sorted.len())
    }

    /// Write the full manifest set below `output_root`
    pub fn write_all(aggregate: &AssetAggregate, output_root: &Path) -> XfrResult<Vec<WrittenManifest>> {
        ManifestKind::ALL
            .iter()
            .map(|&kind| -> XfrResult<WrittenManifest> {
                let path = kind.path(output_root);
                let rows = Self::write(kind, &aggregate.records(kind.category()), &path)?;
                Ok(WrittenManifest { kind, path, rows })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineType;
    use tempfile::TempDir;

    fn record(uid: &str) -> AssetRecord {
        AssetRecord::new(uid).unwrap()
    }

    #[test]
    fn test_rows_sorted_and_header_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("asset-export/asset_uids.csv");
        let (b, a) = (record("tbl_b"), record("tbl_a"));

        let rows = ManifestWriter::write(ManifestKind::AllAssets, &[&b, &a], &path).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "uid\ntbl_a\ntbl_b\n");
    }

    #[test]
    fn test_empty_manifest_has_header_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("segmented_spark_uids.csv");
        std::fs::write(&path, "stale\ncontent\n").unwrap();

        let rows = ManifestWriter::write(ManifestKind::SegmentedSpark, &[], &path).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "uid,source_env,target_env\n"
        );
    }

    #[test]
    fn test_segmented_env_columns_left_blank() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("segmented_jdbc_uids.csv");
        let mut first = record("tbl_1");
        first.engine_type = EngineType::JdbcSql;
        first.is_segmented = true;
        let second = record("tbl_2");

        ManifestWriter::write(ManifestKind::SegmentedJdbc, &[&second, &first], &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "uid,source_env,target_env\ntbl_1,,\ntbl_2,,\n"
        );
    }

    #[test]
    fn test_tags_joined_and_quoted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tagged_asset_uids.csv");
        let mut tagged = record("tbl,1");
        tagged.tags = ["pii", "finance"].iter().map(|t| t.to_string()).collect();

        ManifestWriter::write(ManifestKind::TaggedAssets, &[&tagged], &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "uid,tags\n\"tbl,1\",pii:finance\n"
        );
    }

    #[test]
    fn test_unwritable_path_is_manifest_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("policy-export");
        std::fs::write(&blocker, "not a directory").unwrap();

        let path = blocker.join("segmented_spark_uids.csv");
        let result = ManifestWriter::write(ManifestKind::SegmentedSpark, &[], &path);
        let err = result.unwrap_err();
        assert!(matches!(err, XfrError::ManifestWrite { .. }));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_manifest_layout() {
        let root = Path::new("/out");
        assert_eq!(
            ManifestKind::SegmentedSpark.path(root),
            PathBuf::from("/out/policy-export/segmented_spark_uids.csv")
        );
        assert_eq!(
            ManifestKind::AllAssets.path(root),
            PathBuf::from("/out/asset-export/asset_uids.csv")
        );
    }
}
