//! Discovered inputs and the entries read out of them

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use zip::CompressionMethod;

/// Marker appended to the stem of every transformed output
pub const IMPORT_READY_MARKER: &str = "_import_ready";

/// Kind of discovered input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Zip-like container of named entries
    Archive,
    /// Loose JSON file
    Json,
}

/// One discovered input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (or caller-relative) path to the file
    pub path: PathBuf,
    /// Path below the input root, used to mirror sub-directories in the output
    pub relative_path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: PathBuf, relative_path: PathBuf, kind: SourceKind) -> Self {
        Self {
            path,
            relative_path,
            kind,
        }
    }

    /// File name of the input (lossy)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Output file name: `<stem>_import_ready.<ext>`
    pub fn import_ready_name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        match self.path.extension() {
            Some(ext) => format!("{}{}.{}", stem, IMPORT_READY_MARKER, ext.to_string_lossy()),
            None => format!("{}{}", stem, IMPORT_READY_MARKER),
        }
    }

    /// Output path below `output_dir`, keeping the input's sub-directory
    pub fn import_ready_path(&self, output_dir: &Path) -> PathBuf {
        let parent = self
            .relative_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        match parent {
            Some(parent) => output_dir.join(parent).join(self.import_ready_name()),
            None => output_dir.join(self.import_ready_name()),
        }
    }
}

/// One entry read into memory from a source file
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub bytes: Vec<u8>,
    pub is_dir: bool,
    pub compression: CompressionMethod,
}

impl RawEntry {
    /// True when the entry name carries a `.json` extension (case-insensitive)
    pub fn is_json_name(&self) -> bool {
        !self.is_dir && self.name.to_lowercase().ends_with(".json")
    }
}

/// A parsed JSON value tree and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    /// Name inside the archive, or the loose file's own name
    pub file_name: String,
    /// Owning source file
    pub source: PathBuf,
    pub value: Value,
}

impl JsonDocument {
    pub fn new(file_name: impl Into<String>, source: impl Into<PathBuf>, value: Value) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
            value,
        }
    }

    /// Same document identity, new value tree
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            file_name: self.file_name.clone(),
            source: self.source.clone(),
            value,
        }
    }
}

/// Decoded archive entry
///
/// Anything that is not a parseable JSON payload is carried opaque so that it
/// survives repacking byte-identical.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    Json {
        name: String,
        document: JsonDocument,
        compression: CompressionMethod,
    },
    Opaque {
        name: String,
        bytes: Vec<u8>,
        compression: CompressionMethod,
    },
    Directory {
        name: String,
    },
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        match self {
            ArchiveEntry::Json { name, .. }
            | ArchiveEntry::Opaque { name, .. }
            | ArchiveEntry::Directory { name } => name,
        }
    }
}
