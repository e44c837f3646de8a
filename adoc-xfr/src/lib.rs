//! adoc-xfr library interface
//!
//! Policy export transfer: unpack archived policy definitions, rewrite
//! environment-specific strings, extract the assets they reference and write
//! import-ready archives plus CSV manifests for the follow-up import commands.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::{resolve, AdocToml, CliOverrides, ResolvedConfig, XfrSettings};
pub use crate::error::{XfrError, XfrResult};
pub use crate::services::{PipelineOrchestrator, RunReport, RunStatus};
