//! Policy transfer (adoc-xfr) - Main entry point
//!
//! Rewrites a directory of policy exports for import into another
//! environment and writes the asset manifests the follow-up commands read.
//!
//! Exit codes: 0 completed, 1 failed (or fatal error), 130 cancelled.

use std::path::PathBuf;
use std::process::ExitCode;

use adoc_common::config::{load_toml_config, locate_config_file};
use adoc_common::logging::{init_logging, Verbosity};
use adoc_xfr::config::{resolve, AdocToml, CliOverrides};
use adoc_xfr::models::TransformSpec;
use adoc_xfr::services::{PipelineOrchestrator, RunStatus};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command-line arguments for adoc-xfr
#[derive(Parser, Debug)]
#[command(name = "adoc-xfr")]
#[command(about = "Transform policy exports into import-ready archives and asset manifests")]
#[command(version)]
struct Args {
    /// Configuration file (overrides ADOC_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding policy export archives and JSON files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output root [default: ./adoc-migration-toolkit-<YYYYMMDDHHMM>]
    #[arg(short, long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Ordered search/replace pairs, e.g. "PROD_DB":"DEV_DB", "prod-host":"dev-host"
    #[arg(long = "string-transform", num_args = 1.., value_name = "PAIRS")]
    string_transform: Vec<String>,

    /// Legacy single pair: string to search for
    #[arg(long, requires = "target_env_string")]
    source_env_string: Option<String>,

    /// Legacy single pair: replacement string
    #[arg(long, requires = "source_env_string")]
    target_env_string: Option<String>,

    /// Descend into sub-directories of the input directory
    #[arg(short, long)]
    recursive: bool,

    /// Also rewrite JSON object keys
    #[arg(long)]
    substitute_keys: bool,

    /// Write indented JSON instead of compact JSON
    #[arg(long)]
    pretty: bool,

    /// Also write the run report as JSON to this path
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Pairs from `--string-transform`, then the legacy pair
    fn transform(&self) -> Result<TransformSpec> {
        let mut spec = if self.string_transform.is_empty() {
            TransformSpec::empty()
        } else {
            TransformSpec::parse(&self.string_transform.join(" "))
                .context("Invalid --string-transform value")?
        };
        if let (Some(source), Some(target)) = (&self.source_env_string, &self.target_env_string) {
            spec.extend(TransformSpec::from_env_strings(source, target)?);
        }
        Ok(spec)
    }

    /// Flags only override lower layers when given
    fn overrides(&self) -> Result<CliOverrides> {
        Ok(CliOverrides {
            input_dir: self.input.clone(),
            output_root: self.output_dir.clone(),
            recursive: self.recursive.then_some(true),
            substitute_keys: self.substitute_keys.then_some(true),
            pretty_json: self.pretty.then_some(true),
            report_json: self.report_json.clone(),
            transform: self.transform()?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command-line arguments
    let args = Args::parse();

    let config_source = locate_config_file(args.config.as_deref());
    let toml: AdocToml =
        load_toml_config(config_source.as_ref()).context("Failed to load configuration")?;

    init_logging(&toml.logging, args.verbosity()).context("Failed to initialize logging")?;
    match &config_source {
        Some(source) => info!("Configuration: {}", source.path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let resolved = resolve(args.overrides()?, &toml, Local::now()).context("Invalid configuration")?;
    let report_json = resolved.report_json.clone();
    let orchestrator = PipelineOrchestrator::new(resolved.settings, resolved.transform);

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel_token.clone()));

    let run_token = cancel_token.clone();
    let report = tokio::task::spawn_blocking(move || orchestrator.run(&run_token))
        .await
        .context("Transfer task aborted")?
        .context("Transfer run failed")?;

    for line in report.display_lines() {
        println!("{}", line);
    }

    if let Some(path) = report_json {
        report
            .write_json(&path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(match report.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Failed => ExitCode::from(1),
        RunStatus::Cancelled => ExitCode::from(130),
    })
}

/// Cancel the run at the next file boundary on Ctrl+C
async fn cancel_on_ctrl_c(token: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping after the current file");
            token.cancel();
        }
        Err(e) => tracing::warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
