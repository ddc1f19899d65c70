// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wires a loaded [`scanopt_config::ScanOptConfig`] into a runnable
//! [`scanopt_runtime::Orchestrator`].

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use scanopt_backend::{LocalScanner, MockScanner, ScannerBackend, SubprocessScanner};
use scanopt_config::{CriteriaOverride, ScannerEntry, apply_criteria_override};
use scanopt_core::{ScanResult, ScannerCriteria, ScannerDetails};
use scanopt_download::LocalArchiveDownloader;
use scanopt_error::ScanOptError;
use scanopt_runtime::Orchestrator;
use scanopt_storage::{FsPackageStore, FsProvenanceStore};
use std::path::Path;
use std::sync::Arc;

/// Wraps a [`LocalScanner`] to report overridden [`ScannerCriteria`] instead
/// of its own default, without otherwise changing its behavior.
struct OverriddenScanner {
    inner: Arc<dyn LocalScanner>,
    criteria: ScannerCriteria,
}

#[async_trait]
impl LocalScanner for OverriddenScanner {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn details(&self) -> ScannerDetails {
        self.inner.details()
    }

    fn criteria(&self) -> ScannerCriteria {
        self.criteria.clone()
    }

    async fn scan_path(&self, dir: &Path) -> Result<ScanResult, ScanOptError> {
        self.inner.scan_path(dir).await
    }
}

fn build_scanner(
    name: &str,
    entry: &ScannerEntry,
    override_: Option<&CriteriaOverride>,
) -> Result<ScannerBackend> {
    let base: Arc<dyn LocalScanner> = match entry {
        ScannerEntry::Mock {} => Arc::new(MockScanner::new(name, "0.1.0")),
        ScannerEntry::Subprocess { command, args, .. } => {
            Arc::new(SubprocessScanner::new(name, "0.1.0", command, args.clone()))
        }
    };
    let criteria = apply_criteria_override(base.criteria(), override_);
    Ok(ScannerBackend::Local(Arc::new(OverriddenScanner {
        inner: base,
        criteria,
    })))
}

/// Build an [`Orchestrator`] wired to the file-backed storage and local
/// archive download defaults, from a loaded [`scanopt_config::ScanOptConfig`].
///
/// `store_dir` defaults to `.scanopt/store` relative to the current
/// directory when the config leaves it unset.
pub fn build_orchestrator(config: &scanopt_config::ScanOptConfig) -> Result<Orchestrator> {
    if config.scanners.is_empty() {
        bail!("no scanners configured; add a [scanners.<name>] table to the config file");
    }

    let store_dir = config
        .store_dir
        .clone()
        .unwrap_or_else(|| ".scanopt/store".to_string());
    let provenance_store = Arc::new(FsProvenanceStore::new(store_dir.clone()));
    let package_store = Arc::new(FsPackageStore::new(store_dir));

    let mut builder = Orchestrator::builder()
        .downloader(Arc::new(LocalArchiveDownloader::new()))
        .provenance_reader(provenance_store.clone())
        .package_reader(package_store.clone())
        .provenance_writer(provenance_store)
        .package_writer(package_store);

    if let Some(scratch_dir) = &config.scratch_dir {
        std::fs::create_dir_all(scratch_dir)
            .with_context(|| format!("create scratch directory {scratch_dir}"))?;
        builder = builder.scratch_root(scratch_dir.clone());
    }

    for (name, entry) in &config.scanners {
        let override_ = config.criteria_overrides_for(name);
        builder = builder.scanner(build_scanner(name, entry, override_)?);
    }

    builder.build().context("build orchestrator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanopt_config::ScanOptConfig;

    #[test]
    fn build_orchestrator_rejects_empty_scanner_list() {
        let config = ScanOptConfig::default();
        let err = build_orchestrator(&config).expect_err("should reject empty scanner list");
        assert!(err.to_string().contains("no scanners"));
    }

    #[test]
    fn build_orchestrator_accepts_mock_scanner() {
        let mut config = ScanOptConfig::default();
        config
            .scanners
            .insert("mock".to_string(), ScannerEntry::Mock {});
        assert!(build_orchestrator(&config).is_ok());
    }

    #[test]
    fn build_scanner_applies_criteria_override() {
        let override_ = CriteriaOverride {
            name_pattern: Some("mock-*".into()),
            ..Default::default()
        };
        let backend = build_scanner("mock", &ScannerEntry::Mock {}, Some(&override_)).unwrap();
        assert!(
            backend
                .criteria()
                .name_pattern
                .compile_matcher()
                .is_match("mock-one")
        );
    }
}
