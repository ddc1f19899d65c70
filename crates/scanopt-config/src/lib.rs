// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and env overlay for the
//! scan-orchestration engine.
//!
//! This crate provides [`ScanOptConfig`] — the top-level runtime settings —
//! together with helpers for loading from TOML files, applying a
//! `SCANOPT_`-prefixed environment overlay, merging overlays, and producing
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A scanner timeout is unusually large.
    LargeTimeout {
        /// Scanner name.
        scanner: String,
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { scanner, secs } => {
                write!(f, "scanner '{scanner}' has a large timeout ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Priority order for resolving a package's provenance, and the downloader's
/// preference when more than one source-code origin is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceCodeOrigin {
    /// Prefer the declared artifact descriptor.
    Artifact,
    /// Prefer the declared VCS descriptor.
    Vcs,
}

/// Top-level runtime configuration for the scan-orchestration engine.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ScanOptConfig {
    /// Directory used to persist scan results (backs the default file-based
    /// storage reader/writer pair).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,

    /// Scratch directory for per-run download staging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<String>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Priority order consulted by the package-provenance resolver, and by
    /// the downloader when a package declares more than one origin.
    #[serde(default = "default_source_code_origins")]
    pub source_code_origins: Vec<SourceCodeOrigin>,

    /// Named scanner definitions.
    #[serde(default)]
    pub scanners: BTreeMap<String, ScannerEntry>,

    /// Free-form options passed through to scanner backends, keyed by
    /// scanner name. The orchestrator and backends interpret these; the
    /// core engine never inspects their contents.
    #[serde(default)]
    pub scan_options: BTreeMap<String, serde_json::Value>,

    /// Per-scanner cache-lookup criteria overrides, keyed by scanner name.
    #[serde(default)]
    pub criteria_overrides: BTreeMap<String, CriteriaOverride>,
}

impl Default for ScanOptConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            scratch_dir: None,
            log_level: Some("info".into()),
            source_code_origins: default_source_code_origins(),
            scanners: BTreeMap::new(),
            scan_options: BTreeMap::new(),
            criteria_overrides: BTreeMap::new(),
        }
    }
}

fn default_source_code_origins() -> Vec<SourceCodeOrigin> {
    vec![SourceCodeOrigin::Vcs, SourceCodeOrigin::Artifact]
}

/// Configuration for a single scanner backend.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ScannerEntry {
    /// A mock scanner (for testing).
    #[serde(rename = "mock")]
    Mock {},
    /// A scanner invoked as a local subprocess.
    #[serde(rename = "subprocess")]
    Subprocess {
        /// Command to spawn.
        command: String,
        /// Extra CLI arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Optional timeout in seconds (1–86 400).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

/// Overrides the cache-lookup criteria used for a single scanner.
///
/// Any field left unset falls back to the scanner's own
/// [`ScannerCriteria::any`](scanopt_core::ScannerCriteria::any)-derived
/// default for that field.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CriteriaOverride {
    /// Glob pattern matched against the scanner's reported name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,
    /// Inclusive lower version bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    /// Inclusive upper version bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    /// If present, relaxes the config-compatibility predicate to an
    /// exact-string match on this value rather than the scanner's own
    /// default predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,
}

impl ScanOptConfig {
    /// Returns the [`CriteriaOverride`] configured for `scanner_name`, if any.
    #[must_use]
    pub fn criteria_overrides_for(&self, scanner_name: &str) -> Option<&CriteriaOverride> {
        self.criteria_overrides.get(scanner_name)
    }
}

/// Applies `override_` (if any) on top of `base`, producing the effective
/// [`scanopt_core::ScannerCriteria`] a scanner is matched against.
///
/// * `regScannerName` → replaces `name_pattern`.
/// * `minScannerVersion`/`maxScannerVersion` → replace `min_version`/`max_version`.
/// * `configuration` → replaces `config_predicate` with an exact-string match
///   against the scanner's reported config fingerprint, serialized to JSON
///   text.
///
/// An invalid glob or an override left unset falls back to `base`'s field.
pub fn apply_criteria_override(
    base: scanopt_core::ScannerCriteria,
    override_: Option<&CriteriaOverride>,
) -> scanopt_core::ScannerCriteria {
    let Some(override_) = override_ else {
        return base;
    };
    let scanopt_core::ScannerCriteria {
        mut name_pattern,
        mut min_version,
        mut max_version,
        mut config_predicate,
    } = base;
    if let Some(pattern) = &override_.name_pattern {
        if let Ok(glob) = globset::Glob::new(pattern) {
            name_pattern = glob;
        }
    }
    if let Some(min) = &override_.min_version {
        min_version = scanopt_core::Version(min.clone());
    }
    if let Some(max) = &override_.max_version {
        max_version = scanopt_core::Version(max.clone());
    }
    if let Some(expected) = &override_.configuration {
        let expected = expected.clone();
        config_predicate = std::sync::Arc::new(move |fingerprint: &BTreeMap<String, serde_json::Value>| {
            serde_json::to_value(fingerprint)
                .map(|actual| actual == expected)
                .unwrap_or(false)
        });
    }
    scanopt_core::ScannerCriteria {
        name_pattern,
        min_version,
        max_version,
        config_predicate,
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed timeout in seconds (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 3_600;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ScanOptConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ScanOptConfig::default()`].
///
/// `SCANOPT_`-prefixed environment variable overrides are applied on top in
/// both cases.
pub fn load_config(path: Option<&Path>) -> Result<ScanOptConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ScanOptConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ScanOptConfig`].
pub fn parse_toml(content: &str) -> Result<ScanOptConfig, ConfigError> {
    toml::from_str::<ScanOptConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply `SCANOPT_`-prefixed environment variable overrides.
///
/// Recognised variables:
/// - `SCANOPT_STORE_DIR`
/// - `SCANOPT_SCRATCH_DIR`
/// - `SCANOPT_LOG_LEVEL`
pub fn apply_env_overrides(config: &mut ScanOptConfig) {
    if let Ok(val) = std::env::var("SCANOPT_STORE_DIR") {
        config.store_dir = Some(val);
    }
    if let Ok(val) = std::env::var("SCANOPT_SCRATCH_DIR") {
        config.scratch_dir = Some(val);
    }
    if let Ok(val) = std::env::var("SCANOPT_LOG_LEVEL") {
        config.log_level = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty subprocess commands, out-of-range timeouts) are
/// returned as a [`ConfigError::ValidationError`]; soft issues come back as
/// warnings. This crate does not enforce "at least one scanner configured" —
/// that is a [`ConfigurationError`](https://docs.rs/scanopt-error)-level
/// concern surfaced by the orchestrator builder, since scanners may also be
/// registered programmatically.
pub fn validate_config(config: &ScanOptConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    for (name, scanner) in &config.scanners {
        if name.is_empty() {
            errors.push("scanner name must not be empty".into());
        }

        match scanner {
            ScannerEntry::Subprocess {
                command,
                timeout_secs,
                ..
            } => {
                if command.trim().is_empty() {
                    errors.push(format!(
                        "scanner '{name}': subprocess command must not be empty"
                    ));
                }
                if let Some(t) = timeout_secs {
                    if *t == 0 || *t > MAX_TIMEOUT_SECS {
                        errors.push(format!(
                            "scanner '{name}': timeout {t}s out of range (1..{MAX_TIMEOUT_SECS})"
                        ));
                    } else if *t > LARGE_TIMEOUT_THRESHOLD {
                        warnings.push(ConfigWarning::LargeTimeout {
                            scanner: name.clone(),
                            secs: *t,
                        });
                    }
                }
            }
            ScannerEntry::Mock {} => {}
        }
    }

    for name in config.criteria_overrides.keys() {
        if !config.scanners.contains_key(name) {
            warnings.push(ConfigWarning::MissingOptionalField {
                field: format!("criteria_overrides.{name}"),
                hint: "no scanner with this name is configured".into(),
            });
        }
    }

    if config.store_dir.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "store_dir".into(),
            hint: "scan results will not be persisted across runs".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Scanner, scan-option, and criteria-override maps are combined; on name
/// collisions the overlay entry wins.
pub fn merge_configs(base: ScanOptConfig, overlay: ScanOptConfig) -> ScanOptConfig {
    let mut scanners = base.scanners;
    scanners.extend(overlay.scanners);
    let mut scan_options = base.scan_options;
    scan_options.extend(overlay.scan_options);
    let mut criteria_overrides = base.criteria_overrides;
    criteria_overrides.extend(overlay.criteria_overrides);

    let source_code_origins = if overlay.source_code_origins == default_source_code_origins() {
        base.source_code_origins
    } else {
        overlay.source_code_origins
    };

    ScanOptConfig {
        store_dir: overlay.store_dir.or(base.store_dir),
        scratch_dir: overlay.scratch_dir.or(base.scratch_dir),
        log_level: overlay.log_level.or(base.log_level),
        source_code_origins,
        scanners,
        scan_options,
        criteria_overrides,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
