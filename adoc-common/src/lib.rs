//! # adoc Common Library
//!
//! Shared code for the adoc migration tools including:
//! - Error types
//! - Configuration loading and value resolution
//! - Logging bootstrap

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
