//! In-memory unpacking of archives and loose JSON files
//!
//! Archives are read entry by entry into memory; nothing is extracted to disk.
//! Decoding is lenient: a UTF-8 BOM is stripped and non-UTF-8 payloads are
//! read as Latin-1 before parsing.

use crate::error::{XfrError, XfrResult};
use crate::models::{ArchiveEntry, JsonDocument, RawEntry, SourceFile, SourceKind};
use serde_json::Value;
use std::io::{Cursor, Read};
use zip::{CompressionMethod, ZipArchive};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Reads source files into entries
pub struct ArchiveUnpacker {
    max_input_bytes: u64,
}

impl ArchiveUnpacker {
    pub fn new(max_input_bytes: u64) -> Self {
        Self { max_input_bytes }
    }

    /// Read every entry of `source` into memory
    ///
    /// Loose JSON yields a single entry named after the file.
    pub fn open(&self, source: &SourceFile) -> XfrResult<Vec<RawEntry>> {
        let bytes = self.read_source(source)?;

        match source.kind {
            SourceKind::Json => Ok(vec![RawEntry {
                name: source.file_name(),
                bytes,
                is_dir: false,
                compression: CompressionMethod::Deflated,
            }]),
            SourceKind::Archive => self.read_archive(source, bytes),
        }
    }

    fn read_source(&self, source: &SourceFile) -> XfrResult<Vec<u8>> {
        let metadata = std::fs::metadata(&source.path).map_err(|e| XfrError::FileRead {
            path: source.path.clone(),
            reason: e.to_string(),
        })?;
        if metadata.len() > self.max_input_bytes {
            return Err(XfrError::FileRead {
                path: source.path.clone(),
                reason: format!(
                    "file too large: {} bytes (max {})",
                    metadata.len(),
                    self.max_input_bytes
                ),
            });
        }

        std::fs::read(&source.path).map_err(|e| XfrError::FileRead {
            path: source.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Entry sizes in the archive headers are not trusted: each entry is read
    /// up to `max_input_bytes` and rejected beyond that.
    fn read_archive(&self, source: &SourceFile, bytes: Vec<u8>) -> XfrResult<Vec<RawEntry>> {
        let corrupt = |reason: String| XfrError::CorruptArchive {
            path: source.path.clone(),
            reason,
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| corrupt(format!("entry #{}: {}", index, e)))?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let compression = file.compression();

            let mut buffer = Vec::new();
            if !is_dir {
                let read = file
                    .by_ref()
                    .take(self.max_input_bytes.saturating_add(1))
                    .read_to_end(&mut buffer)
                    .map_err(|e| corrupt(format!("entry {}: {}", name, e)))?;
                if read as u64 > self.max_input_bytes {
                    return Err(corrupt(format!(
                        "entry {} expands past {} bytes",
                        name, self.max_input_bytes
                    )));
                }
            }

            entries.push(RawEntry {
                name,
                bytes: buffer,
                is_dir,
                compression,
            });
        }

        tracing::debug!(
            path = %source.path.display(),
            entries = entries.len(),
            "Archive read into memory"
        );
        Ok(entries)
    }

    /// Decode raw entries into typed entries
    ///
    /// JSON entries that fail to parse are reported and carried opaque, so the
    /// returned list always has one entry per raw entry.
    pub fn decode(source: &SourceFile, raw: Vec<RawEntry>) -> (Vec<ArchiveEntry>, Vec<XfrError>) {
        let mut entries = Vec::with_capacity(raw.len());
        let mut errors = Vec::new();

        for entry in raw {
            if entry.is_dir {
                entries.push(ArchiveEntry::Directory { name: entry.name });
                continue;
            }

            if !entry.is_json_name() {
                tracing::debug!(entry = %entry.name, "Passing through non-JSON entry");
                entries.push(ArchiveEntry::Opaque {
                    name: entry.name,
                    bytes: entry.bytes,
                    compression: entry.compression,
                });
                continue;
            }

            match decode_json(&entry.bytes) {
                Ok(value) => entries.push(ArchiveEntry::Json {
                    document: JsonDocument::new(entry.name.clone(), source.path.clone(), value),
                    name: entry.name,
                    compression: entry.compression,
                }),
                Err(reason) => {
                    tracing::warn!(
                        path = %source.path.display(),
                        entry = %entry.name,
                        "Skipping unparseable JSON entry: {}",
                        reason
                    );
                    errors.push(XfrError::JsonParse {
                        path: source.path.clone(),
                        entry: entry.name.clone(),
                        reason,
                    });
                    entries.push(ArchiveEntry::Opaque {
                        name: entry.name,
                        bytes: entry.bytes,
                        compression: entry.compression,
                    });
                }
            }
        }

        (entries, errors)
    }
}

/// Parse a JSON payload leniently
pub fn decode_json(bytes: &[u8]) -> Result<Value, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
        Err(_) => {
            // Latin-1 maps each byte to the code point of the same value
            let text: String = bytes.iter().map(|&b| b as char).collect();
            serde_json::from_str(&text).map_err(|e| format!("{} (decoded as Latin-1)", e))
        }
    }
}
