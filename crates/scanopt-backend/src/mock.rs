//! Mock scanner backend used for local development and tests.

use crate::LocalScanner;
use async_trait::async_trait;
use chrono::Utc;
use scanopt_core::{KnownProvenance, ScanSummary, ScannerCriteria, ScannerDetails, VerificationCode};
use scanopt_error::ScanOptError;
use std::collections::BTreeMap;
use std::path::Path;

/// A scanner that always succeeds with an empty, clean result.
///
/// Does not read the directory it is pointed at. Useful for exercising the
/// orchestrator's dispatch, caching, and assembly logic without a real
/// scanner binary on hand.
#[derive(Debug, Clone)]
pub struct MockScanner {
    name: String,
    version: String,
}

impl MockScanner {
    /// A mock scanner named `name` at `version`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new("mock", "0.1.0")
    }
}

#[async_trait]
impl LocalScanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn details(&self) -> ScannerDetails {
        ScannerDetails {
            name: self.name.clone(),
            version: self.version.clone(),
            config_fingerprint: BTreeMap::new(),
        }
    }

    fn criteria(&self) -> ScannerCriteria {
        ScannerCriteria::any()
    }

    async fn scan_path(&self, _dir: &Path) -> Result<scanopt_core::ScanResult, ScanOptError> {
        let now = Utc::now();
        Ok(scanopt_core::ScanResult {
            // Overwritten by the caller; this scanner has no notion of
            // provenance, only of directories.
            provenance: KnownProvenance::Artifact {
                url: "mock://unscanned".into(),
                hash: None,
            },
            scanner: self.details(),
            summary: ScanSummary {
                start_time: now,
                end_time: now,
                verification_code: VerificationCode::Ok,
                licenses: Vec::new(),
                copyrights: Vec::new(),
                issues: Vec::new(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_scanner_reports_clean_empty_result() {
        let scanner = MockScanner::default();
        let result = scanner.scan_path(Path::new("/nonexistent")).await.unwrap();
        assert_eq!(result.summary.verification_code, VerificationCode::Ok);
        assert!(result.summary.licenses.is_empty());
        assert!(result.summary.issues.is_empty());
    }

    #[test]
    fn mock_scanner_name_and_version_are_configurable() {
        let scanner = MockScanner::new("mock-custom", "9.9.9");
        assert_eq!(scanner.name(), "mock-custom");
        assert_eq!(scanner.details().version, "9.9.9");
    }
}
