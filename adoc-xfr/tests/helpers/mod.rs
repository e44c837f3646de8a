//! Test Helper Utilities
//!
//! Fixture builders for policy export directories

#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Write a zip archive with the given (name, bytes) entries
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// A policy export archive holding one data quality policy
pub fn write_policy_archive(path: &Path, uid: &str, engine: &str, segmented: bool) {
    let policy = format!(
        r#"[{{"name":"PROD check {uid}","engineType":"{engine}","isSegmented":{segmented},"backingAssets":[{{"uid":"{uid}","sourceAssetId":"PROD-{uid}"}}]}}]"#
    );
    write_archive(
        path,
        &[
            ("data_quality_policy_definitions.json", policy.as_bytes()),
            ("business_rules.json", br#"{"rules":[],"db":"PROD_DB"}"#),
            ("README.bin", &[0xDE, 0xAD, 0xBE, 0xEF]),
        ],
    );
}

pub fn entry_names(path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Data rows of a manifest (header stripped)
pub fn manifest_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

pub fn asset_manifest(output_root: &Path) -> PathBuf {
    output_root.join("asset-export/asset_uids.csv")
}
