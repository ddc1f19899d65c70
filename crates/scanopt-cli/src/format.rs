// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting utilities for the scan-orchestration CLI.

use scanopt_core::VerificationCode;
use scanopt_runtime::{RunStats, ScanRunOutput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Key-value aligned table, one row per package/provenance/scanner.
    Table,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Table => "table",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "table" => Ok(Self::Table),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

fn verification_str(code: &VerificationCode) -> &'static str {
    match code {
        VerificationCode::Ok => "ok",
        VerificationCode::Partial => "partial",
        VerificationCode::Failed => "failed",
    }
}

/// Renders a [`ScanRunOutput`] according to the configured output format.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Create a new formatter with the given output format.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a completed scan run.
    #[must_use]
    pub fn format_run(&self, output: &ScanRunOutput) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(&run_json(output)).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&run_json(output)).unwrap_or_default()
            }
            OutputFormat::Table => format_run_table(output),
        }
    }
}

fn run_json(output: &ScanRunOutput) -> serde_json::Value {
    serde_json::json!({
        "results": output.results,
        "stats": stats_json(&output.stats),
    })
}

fn stats_json(stats: &RunStats) -> serde_json::Value {
    serde_json::json!({
        "cache_hits": stats.cache_hits,
        "package_granular_scans": stats.package_granular_scans,
        "provenance_granular_scans": stats.provenance_granular_scans,
        "local_scans": stats.local_scans,
        "downloads_performed": stats.downloads_performed,
        "issues_raised": stats.issues_raised,
        "total_scans_dispatched": stats.total_scans_dispatched(),
    })
}

fn format_run_table(output: &ScanRunOutput) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{:<42} {:<24} {:<10} {:>8} {:>8}",
        "package", "scanner", "verification", "licenses", "issues"
    ));
    for (pkg_id, nested) in &output.results {
        for (prov_key, results) in &nested.results {
            for result in results {
                lines.push(format!(
                    "{:<42} {:<24} {:<10} {:>8} {:>8}",
                    truncate(pkg_id, 42),
                    truncate(&result.scanner.name, 24),
                    verification_str(&result.summary.verification_code),
                    result.summary.licenses.len(),
                    result.summary.issues.len(),
                ));
                let _ = prov_key;
            }
        }
    }
    lines.push(String::new());
    let stats = &output.stats;
    lines.push(format!(
        "cache_hits={} package_granular={} provenance_granular={} local={} downloads={} issues_raised={}",
        stats.cache_hits,
        stats.package_granular_scans,
        stats.provenance_granular_scans,
        stats.local_scans,
        stats.downloads_performed,
        stats.issues_raised,
    ));
    lines.join("\n")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= max)
            .last()
            .unwrap_or(0);
        format!("{}…", &s[..cut])
    }
}
