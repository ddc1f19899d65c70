// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scan results: what a scanner backend produces for a single provenance,
//! and the scanner-identity types used to cache and dedup them.

use crate::nested::NestedProvenance;
use crate::provenance::KnownProvenance;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A location within a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TextLocation {
    /// Path relative to the provenance's root.
    pub path: String,
    /// 1-based, inclusive start line.
    pub start_line: u32,
    /// 1-based, inclusive end line.
    pub end_line: u32,
}

/// A license finding at a specific location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LicenseFinding {
    /// SPDX expression or scanner-native license identifier.
    pub license: String,
    /// Where the finding occurred.
    pub location: TextLocation,
    /// Scanner-reported confidence score in `[0.0, 1.0]`, if provided.
    pub score: Option<f32>,
}

/// A copyright statement found at a specific location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CopyrightFinding {
    /// The raw copyright statement text.
    pub statement: String,
    /// Where the finding occurred.
    pub location: TextLocation,
}

/// Severity of a [`ScanIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Informational; did not affect the scan outcome.
    Hint,
    /// Worth surfacing, but the scan otherwise completed.
    Warning,
    /// The scan could not complete as requested; the result is synthetic or partial.
    Error,
}

/// A non-fatal problem recorded against a [`ScanSummary`].
///
/// Synthetic issues (download failures, scanner crashes, storage errors) are
/// how the orchestrator surfaces per-item failures without aborting the run
/// — see the error-handling design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScanIssue {
    /// Severity of the issue.
    pub severity: IssueSeverity,
    /// Where the issue originated (e.g. `"Downloader"`, or a scanner name).
    pub source: String,
    /// Human-readable message.
    pub message: String,
}

impl ScanIssue {
    /// Build an `ERROR`-severity issue tagged with the given source.
    #[must_use]
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Outcome of verifying a scan completed as expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationCode {
    /// The scanner completed without reporting any problems.
    Ok,
    /// The scanner reported partial results (e.g. a subset of files were
    /// unreadable) but did not fail outright.
    Partial,
    /// The scan did not complete; see the summary's issues for detail.
    Failed,
}

/// The body of a [`ScanResult`]: timing, verification outcome, and findings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanSummary {
    /// When the scan started.
    pub start_time: DateTime<Utc>,
    /// When the scan ended.
    pub end_time: DateTime<Utc>,
    /// Overall verification outcome.
    pub verification_code: VerificationCode,
    /// License findings.
    pub licenses: Vec<LicenseFinding>,
    /// Copyright findings.
    pub copyrights: Vec<CopyrightFinding>,
    /// Non-fatal issues encountered during the scan.
    pub issues: Vec<ScanIssue>,
}

impl ScanSummary {
    /// An empty summary carrying only the given issue, used when the
    /// orchestrator must synthesize a result in place of a real scan.
    #[must_use]
    pub fn synthetic_error(at: DateTime<Utc>, issue: ScanIssue) -> Self {
        Self {
            start_time: at,
            end_time: at,
            verification_code: VerificationCode::Failed,
            licenses: Vec::new(),
            copyrights: Vec::new(),
            issues: vec![issue],
        }
    }
}

/// Identity of the scanner that produced a [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ScannerDetails {
    /// Scanner name.
    pub name: String,
    /// Scanner version string (compared via [`Version`]).
    pub version: String,
    /// Fingerprint of the scanner's effective configuration, used to tell
    /// apart results produced under different settings.
    pub config_fingerprint: BTreeMap<String, serde_json::Value>,
}

/// A dotted numeric version, ordered component-wise.
///
/// Non-numeric components fall back to lexicographic comparison of the
/// whole string, which keeps the common `MAJOR.MINOR.PATCH` case correct
/// without pulling in a full semver implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Version(pub String);

impl Version {
    fn numeric_components(&self) -> Option<Vec<u64>> {
        self.0
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.numeric_components(), other.numeric_components()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A predicate over [`ScannerDetails`], used by storage readers to decide
/// whether a cached result is still usable.
///
/// A cached result with details `D` satisfies criteria `C` iff `C.name`
/// matches `D.name`, `D.version` lies in `[C.min_version, C.max_version]`,
/// and `C.config_predicate(D.config_fingerprint)` holds.
#[derive(Clone)]
pub struct ScannerCriteria {
    /// Glob pattern matched against [`ScannerDetails::name`].
    pub name_pattern: globset::Glob,
    /// Inclusive lower version bound.
    pub min_version: Version,
    /// Inclusive upper version bound.
    pub max_version: Version,
    /// Predicate over the scanner's configuration fingerprint.
    pub config_predicate: Arc<dyn Fn(&BTreeMap<String, serde_json::Value>) -> bool + Send + Sync>,
}

impl std::fmt::Debug for ScannerCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerCriteria")
            .field("name_pattern", &self.name_pattern.glob())
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("config_predicate", &"<fn>")
            .finish()
    }
}

impl ScannerCriteria {
    /// Criteria that accept any name, any version, and any configuration.
    #[must_use]
    pub fn any() -> Self {
        Self {
            name_pattern: globset::Glob::new("*").expect("literal glob is valid"),
            min_version: Version("0".into()),
            max_version: Version(u64::MAX.to_string()),
            config_predicate: Arc::new(|_| true),
        }
    }

    /// Returns `true` if `details` satisfies these criteria.
    #[must_use]
    pub fn matches(&self, details: &ScannerDetails) -> bool {
        let name_matches = self.name_pattern.compile_matcher().is_match(&details.name);
        let version = Version(details.version.clone());
        let version_in_range = version >= self.min_version && version <= self.max_version;
        name_matches && version_in_range && (self.config_predicate)(&details.config_fingerprint)
    }
}

/// A scanner's findings for exactly one provenance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanResult {
    /// The provenance that was scanned.
    pub provenance: KnownProvenance,
    /// Identity of the scanner that produced this result.
    pub scanner: ScannerDetails,
    /// The findings themselves.
    pub summary: ScanSummary,
}

/// Every [`ScanResult`] produced for every provenance in a [`NestedProvenance`]
/// tree, keyed by provenance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NestedProvenanceScanResult {
    /// The tree that was scanned.
    pub tree: NestedProvenance,
    /// Results for each provenance in `tree`, possibly from multiple scanners.
    pub results: BTreeMap<String, Vec<ScanResult>>,
}
