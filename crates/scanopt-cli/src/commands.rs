// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the scan-orchestration CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use anyhow::{Context, Result};
use scanopt_config::ScanOptConfig;
use scanopt_core::Package;
use schemars::schema_for;
use std::path::Path;

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for a [`Package`].
    Package,
    /// JSON schema for [`ScanOptConfig`].
    Config,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Package => serde_json::to_value(schema_for!(Package))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(ScanOptConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Read and parse a packages file: a JSON array of [`Package`].
pub fn load_packages_file(path: &Path) -> Result<Vec<Package>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read packages file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parse packages from '{}'", path.display()))
}

/// Load a config file (if given) and report human-readable validation
/// diagnostics: `Ok(warnings)` on a structurally valid config, `Err` on a
/// config that fails validation outright.
pub fn config_check(path: Option<&Path>) -> Result<Vec<String>> {
    let config = scanopt_config::load_config(path).context("load config")?;
    let warnings = scanopt_config::validate_config(&config).context("validate config")?;
    Ok(warnings.iter().map(ToString::to_string).collect())
}
