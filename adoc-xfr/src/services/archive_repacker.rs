//! Import-ready output writer
//!
//! Archives are rebuilt entry by entry with the same names, order and
//! compression method as the source. Output goes to a `.tmp` sibling that is
//! renamed into place only after the entry count has been verified.

use crate::error::{XfrError, XfrResult};
use crate::models::{ArchiveEntry, JsonDocument, SourceFile, SourceKind};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct ArchiveRepacker {
    pretty_json: bool,
}

impl ArchiveRepacker {
    pub fn new(pretty_json: bool) -> Self {
        Self { pretty_json }
    }

    /// Write the import-ready counterpart of `source` below `output_dir`
    ///
    /// `original_count` is the number of entries read from the source. The
    /// count is checked before writing and again on the written archive; on
    /// mismatch nothing is left at the output path.
    pub fn repack(
        &self,
        source: &SourceFile,
        original_count: usize,
        entries: &[ArchiveEntry],
        output_dir: &Path,
    ) -> XfrResult<PathBuf> {
        if entries.len() != original_count {
            return Err(XfrError::StructuralIntegrity {
                path: source.path.clone(),
                expected: original_count,
                actual: entries.len(),
            });
        }

        let output_path = source.import_ready_path(output_dir);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| XfrError::FileWrite {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let tmp_path = tmp_sibling(&output_path);

        let written = match source.kind {
            SourceKind::Archive => self
                .write_archive(&tmp_path, entries)
                .and_then(|_| verify_count(source, &tmp_path, original_count)),
            SourceKind::Json => self.write_loose(&tmp_path, entries),
        };
        if let Err(e) = written {
            remove_partial(&tmp_path);
            return Err(e);
        }

        std::fs::rename(&tmp_path, &output_path).map_err(|e| {
            remove_partial(&tmp_path);
            XfrError::FileWrite {
                path: output_path.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(
            source = %source.path.display(),
            output = %output_path.display(),
            entries = original_count,
            "Import-ready output written"
        );
        Ok(output_path)
    }

    fn write_archive(&self, path: &Path, entries: &[ArchiveEntry]) -> XfrResult<()> {
        let write_error = |reason: String| XfrError::FileWrite {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::create(path).map_err(|e| write_error(e.to_string()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        for entry in entries {
            let entry_error =
                |e: &dyn std::fmt::Display| write_error(format!("entry {}: {}", entry.name(), e));
            match entry {
                ArchiveEntry::Directory { name } => {
                    zip.add_directory(name.as_str(), FileOptions::default())
                        .map_err(|e| entry_error(&e))?;
                }
                ArchiveEntry::Json {
                    name,
                    document,
                    compression,
                } => {
                    let bytes = self.serialize(document).map_err(|e| entry_error(&e))?;
                    start_entry(&mut zip, name, *compression).map_err(|e| entry_error(&e))?;
                    zip.write_all(&bytes).map_err(|e| entry_error(&e))?;
                }
                ArchiveEntry::Opaque {
                    name,
                    bytes,
                    compression,
                } => {
                    start_entry(&mut zip, name, *compression).map_err(|e| entry_error(&e))?;
                    zip.write_all(bytes).map_err(|e| entry_error(&e))?;
                }
            }
        }

        let mut writer = zip.finish().map_err(|e| write_error(e.to_string()))?;
        writer.flush().map_err(|e| write_error(e.to_string()))
    }

    fn write_loose(&self, path: &Path, entries: &[ArchiveEntry]) -> XfrResult<()> {
        let write_error = |reason: String| XfrError::FileWrite {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = match entries {
            [ArchiveEntry::Json { document, .. }] => {
                self.serialize(document).map_err(|e| write_error(e.to_string()))?
            }
            [ArchiveEntry::Opaque { bytes, .. }] => bytes.clone(),
            _ => {
                return Err(write_error(format!(
                    "loose JSON output expects one document, got {} entries",
                    entries.len()
                )))
            }
        };
        std::fs::write(path, bytes).map_err(|e| write_error(e.to_string()))
    }

    /// Compact by default, indented when configured
    pub fn serialize(&self, document: &JsonDocument) -> serde_json::Result<Vec<u8>> {
        if self.pretty_json {
            serde_json::to_vec_pretty(&document.value)
        } else {
            serde_json::to_vec(&document.value)
        }
    }
}

fn start_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    compression: CompressionMethod,
) -> zip::result::ZipResult<()> {
    // Only Stored and Deflated can be written back
    let method = match compression {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    zip.start_file(name, FileOptions::default().compression_method(method))
}

fn verify_count(source: &SourceFile, path: &Path, expected: usize) -> XfrResult<()> {
    let file = File::open(path).map_err(|e| XfrError::FileWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let archive = ZipArchive::new(file).map_err(|e| XfrError::FileWrite {
        path: path.to_path_buf(),
        reason: format!("written archive cannot be reopened: {}", e),
    })?;

    if archive.len() != expected {
        return Err(XfrError::StructuralIntegrity {
            path: source.path.clone(),
            expected,
            actual: archive.len(),
        });
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransformSpec;
    use crate::services::archive_unpacker::ArchiveUnpacker;
    use crate::services::string_substitution::substitute;
    use serde_json::json;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_fixture(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("data_quality_policy_definitions.json", deflated).unwrap();
        zip.write_all(br#"[{"name":"PROD check","count":5}]"#).unwrap();
        zip.add_directory("meta/", FileOptions::default()).unwrap();
        zip.start_file("meta/business_rules.json", deflated).unwrap();
        zip.write_all(br#"{"db":"PROD_DB","flag":true}"#).unwrap();
        zip.start_file("meta/logo.bin", stored).unwrap();
        zip.write_all(&[0x89, b'P', b'N', b'G', 0x00, 0xFF]).unwrap();
        zip.finish().unwrap();
    }

    fn transformed_entries(source: &SourceFile, spec: &TransformSpec) -> (usize, Vec<ArchiveEntry>) {
        let raw = ArchiveUnpacker::new(u64::MAX).open(source).unwrap();
        let count = raw.len();
        let (entries, errors) = ArchiveUnpacker::decode(source, raw);
        assert!(errors.is_empty());
        let entries = entries
            .into_iter()
            .map(|entry| match entry {
                ArchiveEntry::Json {
                    name,
                    document,
                    compression,
                } => {
                    let (value, _) = substitute(&document.value, spec);
                    ArchiveEntry::Json {
                        name,
                        document: document.with_value(value),
                        compression,
                    }
                }
                other => other,
            })
            .collect();
        (count, entries)
    }

    fn read_entry(path: &Path, name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_repack_keeps_layout_and_binary_entries() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("policies.zip");
        write_fixture(&input);
        let source = SourceFile::new(input, PathBuf::from("policies.zip"), SourceKind::Archive);
        let spec = TransformSpec::new([("PROD", "DEV")]).unwrap();
        let (count, entries) = transformed_entries(&source, &spec);
        assert_eq!(count, 4);

        let output_dir = temp_dir.path().join("out");
        let output = ArchiveRepacker::new(false)
            .repack(&source, count, &entries, &output_dir)
            .unwrap();
        assert_eq!(output, output_dir.join("policies_import_ready.zip"));
        assert!(!tmp_sibling(&output).exists());

        let archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(archive.len(), 4);
        assert!(names.contains(&"meta/"));

        assert_eq!(
            read_entry(&output, "meta/logo.bin"),
            vec![0x89, b'P', b'N', b'G', 0x00, 0xFF]
        );
        assert_eq!(
            read_entry(&output, "meta/business_rules.json"),
            br#"{"db":"DEV_DB","flag":true}"#.to_vec()
        );
        assert_eq!(
            read_entry(&output, "data_quality_policy_definitions.json"),
            br#"[{"name":"DEV check","count":5}]"#.to_vec()
        );
    }

    #[test]
    fn test_entry_order_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("policies.zip");
        write_fixture(&input);
        let source = SourceFile::new(input, PathBuf::from("policies.zip"), SourceKind::Archive);
        let (count, entries) = transformed_entries(&source, &TransformSpec::empty());

        let output = ArchiveRepacker::new(false)
            .repack(&source, count, &entries, temp_dir.path())
            .unwrap();
        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        let expected: Vec<String> = entries.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_count_mismatch_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("policies.zip");
        write_fixture(&input);
        let source = SourceFile::new(input, PathBuf::from("policies.zip"), SourceKind::Archive);
        let (count, mut entries) = transformed_entries(&source, &TransformSpec::empty());
        entries.pop();

        let output_dir = temp_dir.path().join("out");
        let result = ArchiveRepacker::new(false).repack(&source, count, &entries, &output_dir);
        match result {
            Err(XfrError::StructuralIntegrity {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected StructuralIntegrity, got {:?}", other),
        }
        assert!(!output_dir.join("policies_import_ready.zip").exists());
    }

    #[test]
    fn test_loose_json_compact_and_pretty() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceFile::new(
            temp_dir.path().join("nested/p.json"),
            PathBuf::from("nested/p.json"),
            SourceKind::Json,
        );
        let document = JsonDocument::new("p.json", &source.path, json!({"a": [1, "x"]}));
        let entries = vec![ArchiveEntry::Json {
            name: "p.json".to_string(),
            document,
            compression: CompressionMethod::Deflated,
        }];

        let out = temp_dir.path().join("out");
        let compact = ArchiveRepacker::new(false).repack(&source, 1, &entries, &out).unwrap();
        assert_eq!(compact, out.join("nested/p_import_ready.json"));
        assert_eq!(std::fs::read_to_string(&compact).unwrap(), r#"{"a":[1,"x"]}"#);

        let pretty = ArchiveRepacker::new(true).repack(&source, 1, &entries, &out).unwrap();
        let text = std::fs::read_to_string(&pretty).unwrap();
        assert!(text.contains("\n  \"a\": ["));
    }
}
