//! Error types for adoc-xfr
//!
//! Errors fall into two scopes:
//! - **File-scoped**: recorded against the originating file, the run continues
//!   (`FileRead`, `CorruptArchive`, `JsonParse`, `StructuralIntegrity`, `FileWrite`)
//! - **Run-scoped**: abort the run (`Discovery`, `OutputDirectory`,
//!   `ManifestWrite`, `InvalidTransform`, `Common`)

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum XfrError {
    /// Input path missing, not a directory, or unreadable
    #[error("Cannot read input directory {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    /// Input file could not be read
    #[error("Cannot read {path}: {reason}")]
    FileRead { path: PathBuf, reason: String },

    /// Archive could not be opened or one of its entries could not be read
    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// A JSON payload could not be decoded
    #[error("Invalid JSON in {path} ({entry}): {reason}")]
    JsonParse {
        path: PathBuf,
        entry: String,
        reason: String,
    },

    /// Repacked entry count differs from the source entry count
    #[error("Entry count mismatch for {path}: original={expected}, output={actual}")]
    StructuralIntegrity {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// Writing a per-file output failed
    #[error("Failed to write {path}: {reason}")]
    FileWrite { path: PathBuf, reason: String },

    /// Manifest could not be written
    #[error("Failed to write manifest {path}: {reason} (check write permissions at {})", parent_display(.path))]
    ManifestWrite { path: PathBuf, reason: String },

    /// Output root (or one of its sub-directories) could not be created
    #[error("Cannot create output directory {path}: {reason} (check write permissions at {path})")]
    OutputDirectory { path: PathBuf, reason: String },

    /// Transform pairs could not be parsed or are invalid
    #[error("Invalid string transform: {0}")]
    InvalidTransform(String),

    /// adoc-common error
    #[error("Common error: {0}")]
    Common(#[from] adoc_common::Error),
}

impl XfrError {
    /// True when the error must abort the whole run
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            XfrError::Discovery { .. }
                | XfrError::OutputDirectory { .. }
                | XfrError::ManifestWrite { .. }
                | XfrError::InvalidTransform(_)
                | XfrError::Common(_)
        )
    }

    /// Path the error is about, when it has one
    pub fn path(&self) -> Option<&Path> {
        match self {
            XfrError::Discovery { path, .. }
            | XfrError::FileRead { path, .. }
            | XfrError::CorruptArchive { path, .. }
            | XfrError::JsonParse { path, .. }
            | XfrError::StructuralIntegrity { path, .. }
            | XfrError::FileWrite { path, .. }
            | XfrError::ManifestWrite { path, .. }
            | XfrError::OutputDirectory { path, .. } => Some(path),
            XfrError::InvalidTransform(_) | XfrError::Common(_) => None,
        }
    }

    /// Entry name inside an archive, when the error is entry-scoped
    pub fn entry(&self) -> Option<&str> {
        match self {
            XfrError::JsonParse { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Result type for pipeline operations
pub type XfrResult<T> = Result<T, XfrError>;
