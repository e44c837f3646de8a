//! Configuration resolution for adoc-xfr
//!
//! **Priority:** CLI → ENV → TOML → built-in default, per value.
//!
//! TOML layout:
//! ```toml
//! output_root = "/data/migration"
//!
//! [logging]
//! level = "info"
//!
//! [xfr]
//! input_dir = "/data/policy-export"
//! recursive = false
//! archive_extensions = ["zip"]
//!
//! [[xfr.transform]]
//! search = "PROD_DB"
//! replace = "DEV_DB"
//!
//! [xfr.descriptor]
//! uid = ["uid"]
//! ```

use crate::error::{XfrError, XfrResult};
use crate::models::{TransformPair, TransformSpec};
use crate::services::asset_classifier::DescriptorFields;
use adoc_common::config::{default_output_root, resolve_value, LoggingConfig};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Sub-directory receiving the import-ready archives and JSON files
pub const POLICY_IMPORT_DIR: &str = "policy-import";
/// Sub-directory receiving the segmented-asset manifests
pub const POLICY_EXPORT_DIR: &str = "policy-export";
/// Sub-directory receiving the asset manifests
pub const ASSET_EXPORT_DIR: &str = "asset-export";

/// Default cap on a single input file (2GB)
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub const ENV_INPUT_DIR: &str = "ADOC_XFR_INPUT";
pub const ENV_OUTPUT_ROOT: &str = "ADOC_OUTPUT_ROOT";
pub const ENV_RECURSIVE: &str = "ADOC_XFR_RECURSIVE";
pub const ENV_SUBSTITUTE_KEYS: &str = "ADOC_XFR_SUBSTITUTE_KEYS";
pub const ENV_PRETTY_JSON: &str = "ADOC_XFR_PRETTY";

/// Whole `adoc.toml` file as seen by this tool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdocToml {
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub xfr: XfrToml,
}

/// `[xfr]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XfrToml {
    pub input_dir: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub archive_extensions: Option<Vec<String>>,
    pub pretty_json: Option<bool>,
    pub substitute_keys: Option<bool>,
    pub max_input_bytes: Option<u64>,
    pub report_json: Option<PathBuf>,
    #[serde(default)]
    pub transform: Vec<TransformPair>,
    #[serde(default)]
    pub descriptor: DescriptorFields,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub substitute_keys: Option<bool>,
    pub pretty_json: Option<bool>,
    pub report_json: Option<PathBuf>,
    /// Already parsed; empty means "not given"
    pub transform: TransformSpec,
}

/// Fully resolved pipeline settings
#[derive(Debug, Clone)]
pub struct XfrSettings {
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub recursive: bool,
    /// Lower-case, without leading dot
    pub archive_extensions: Vec<String>,
    pub pretty_json: bool,
    pub substitute_keys: bool,
    pub max_input_bytes: u64,
    pub descriptor: DescriptorFields,
}

impl XfrSettings {
    /// Settings with built-in defaults for everything but the two roots
    pub fn new(input_dir: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_root: output_root.into(),
            recursive: false,
            archive_extensions: vec!["zip".to_string()],
            pretty_json: false,
            substitute_keys: false,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            descriptor: DescriptorFields::default(),
        }
    }

    pub fn policy_import_dir(&self) -> PathBuf {
        self.output_root.join(POLICY_IMPORT_DIR)
    }

    pub fn policy_export_dir(&self) -> PathBuf {
        self.output_root.join(POLICY_EXPORT_DIR)
    }

    pub fn asset_export_dir(&self) -> PathBuf {
        self.output_root.join(ASSET_EXPORT_DIR)
    }
}

/// Settings plus the run inputs that are not pipeline settings
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: XfrSettings,
    pub transform: TransformSpec,
    pub report_json: Option<PathBuf>,
}

/// Merge CLI, environment and TOML into run settings
pub fn resolve(
    cli: CliOverrides,
    toml: &AdocToml,
    now: DateTime<Local>,
) -> XfrResult<ResolvedConfig> {
    let input_dir: PathBuf = resolve_value(
        cli.input_dir,
        ENV_INPUT_DIR,
        toml.xfr.input_dir.clone(),
        PathBuf::new,
    );
    if input_dir.as_os_str().is_empty() {
        return Err(XfrError::Common(adoc_common::Error::InvalidInput(format!(
            "No input directory given. Use --input <dir>, {}=<dir>, or input_dir in the [xfr] section of adoc.toml",
            ENV_INPUT_DIR
        ))));
    }

    let output_root: PathBuf = resolve_value(
        cli.output_root,
        ENV_OUTPUT_ROOT,
        toml.output_root.clone(),
        || default_output_root(now),
    );

    let mut settings = XfrSettings::new(input_dir, output_root);
    settings.recursive = resolve_value(cli.recursive, ENV_RECURSIVE, toml.xfr.recursive, || false);
    settings.substitute_keys = resolve_value(
        cli.substitute_keys,
        ENV_SUBSTITUTE_KEYS,
        toml.xfr.substitute_keys,
        || false,
    );
    settings.pretty_json = resolve_value(cli.pretty_json, ENV_PRETTY_JSON, toml.xfr.pretty_json, || false);
    if let Some(max) = toml.xfr.max_input_bytes {
        settings.max_input_bytes = max;
    }
    if let Some(extensions) = &toml.xfr.archive_extensions {
        let extensions: Vec<String> = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty() && e != "json")
            .collect();
        if extensions.is_empty() {
            return Err(XfrError::Common(adoc_common::Error::Config(
                "archive_extensions must name at least one extension other than json".to_string(),
            )));
        }
        settings.archive_extensions = extensions;
    }
    settings.descriptor = toml.xfr.descriptor.clone();

    let transform = if cli.transform.is_empty() {
        TransformSpec::from_pairs(toml.xfr.transform.clone())?
    } else {
        cli.transform
    };

    let report_json = cli.report_json.or_else(|| toml.xfr.report_json.clone());

    Ok(ResolvedConfig {
        settings,
        transform,
        report_json,
    })
}

/// True when `path` is `root` or lies below it (after canonicalisation when possible)
pub fn is_within(path: &Path, root: &Path) -> bool {
    let canonical = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
    canonical(path).starts_with(canonical(root))
}
