// SPDX-License-Identifier: MIT OR Apache-2.0
//! File-backed storage implementations: one JSON file per (provenance,
//! scanner) pair, and one JSON file per package.

use crate::traits::{PackageReader, PackageWriter, ProvenanceReader, ProvenanceWriter};
use async_trait::async_trait;
use scanopt_core::{KnownProvenance, NestedProvenanceScanResult, Package, ScanResult, ScannerCriteria};
use scanopt_error::{ErrorCode, ScanOptError};
use std::path::PathBuf;

/// A [`ProvenanceReader`] + [`ProvenanceWriter`] backed by a directory tree.
///
/// Layout: `<root>/<sanitized provenance key>/<sanitized scanner name>.json`,
/// one file per (provenance, scanner details) pair, overwritten on every
/// write — this is what makes the writer idempotent.
pub struct FsProvenanceStore {
    root: PathBuf,
}

impl FsProvenanceStore {
    /// Use `root` as the backing directory, creating it lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_for(&self, known: &KnownProvenance) -> PathBuf {
        self.root.join(sanitize(&known.canonical_key()))
    }
}

#[async_trait]
impl ProvenanceReader for FsProvenanceStore {
    async fn read(
        &self,
        known: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<ScanResult>, ScanOptError> {
        let dir = self.dir_for(known);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "provenance store read failed");
                return Err(ScanOptError::new(ErrorCode::StorageReadFailed, "failed to list provenance directory")
                    .with_context("path", dir.display().to_string())
                    .with_source(err));
            }
        };

        let mut results = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "provenance store directory entry failed");
                    return Err(ScanOptError::new(ErrorCode::StorageReadFailed, "failed to iterate provenance directory")
                        .with_source(err));
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await.map_err(|err| {
                ScanOptError::new(ErrorCode::StorageReadFailed, "failed to read scan result")
                    .with_context("path", path.display().to_string())
                    .with_source(err)
            })?;
            let result: ScanResult = serde_json::from_slice(&bytes).map_err(|err| {
                ScanOptError::new(ErrorCode::StorageReadFailed, "stored scan result is not valid JSON")
                    .with_context("path", path.display().to_string())
                    .with_source(err)
            })?;
            if criteria.matches(&result.scanner) {
                results.push(result);
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl ProvenanceWriter for FsProvenanceStore {
    async fn write(&self, known: &KnownProvenance, result: &ScanResult) -> Result<(), ScanOptError> {
        let dir = self.dir_for(known);
        tokio::fs::create_dir_all(&dir).await.map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to create provenance directory")
                .with_context("path", dir.display().to_string())
                .with_source(err)
        })?;
        let path = dir.join(format!("{}.json", sanitize(&result.scanner.name)));
        let body = serde_json::to_vec_pretty(result).map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to serialize scan result")
                .with_source(err)
        })?;
        tokio::fs::write(&path, body).await.map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to write scan result")
                .with_context("path", path.display().to_string())
                .with_source(err)
        })
    }
}

/// A [`PackageReader`] + [`PackageWriter`] backed by one JSON file per package.
pub struct FsPackageStore {
    root: PathBuf,
}

impl FsPackageStore {
    /// Use `root` as the backing directory, creating it lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, pkg_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(pkg_id)))
    }
}

#[async_trait]
impl PackageReader for FsPackageStore {
    async fn read(
        &self,
        pkg: &Package,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<NestedProvenanceScanResult>, ScanOptError> {
        let path = self.path_for(&pkg.id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ScanOptError::new(ErrorCode::StorageReadFailed, "failed to read package result")
                    .with_context("path", path.display().to_string())
                    .with_source(err));
            }
        };
        let nested: NestedProvenanceScanResult = serde_json::from_slice(&bytes).map_err(|err| {
            ScanOptError::new(ErrorCode::StorageReadFailed, "stored package result is not valid JSON")
                .with_context("path", path.display().to_string())
                .with_source(err)
        })?;
        let satisfies = nested
            .results
            .values()
            .flatten()
            .any(|r| criteria.matches(&r.scanner));
        Ok(if satisfies { vec![nested] } else { Vec::new() })
    }
}

#[async_trait]
impl PackageWriter for FsPackageStore {
    async fn write(
        &self,
        pkg: &Package,
        nested: &NestedProvenanceScanResult,
    ) -> Result<(), ScanOptError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to create package store directory")
                .with_context("path", self.root.display().to_string())
                .with_source(err)
        })?;
        let path = self.path_for(&pkg.id);
        let body = serde_json::to_vec_pretty(nested).map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to serialize nested result")
                .with_source(err)
        })?;
        tokio::fs::write(&path, body).await.map_err(|err| {
            ScanOptError::new(ErrorCode::StorageWriteFailed, "failed to write nested result")
                .with_context("path", path.display().to_string())
                .with_source(err)
        })
    }
}

/// Replace path separators and other filesystem-hostile characters so a
/// canonical key or package id can be used as a file/directory name.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanopt_core::{NestedProvenance, ScanSummary, ScannerDetails, VerificationCode};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn art(tag: &str) -> KnownProvenance {
        KnownProvenance::Artifact {
            url: format!("https://example.com/{tag}.tar.gz"),
            hash: None,
        }
    }

    fn result(provenance: KnownProvenance, scanner: &str) -> ScanResult {
        let now = Utc::now();
        ScanResult {
            provenance,
            scanner: ScannerDetails {
                name: scanner.into(),
                version: "1.0.0".into(),
                config_fingerprint: BTreeMap::new(),
            },
            summary: ScanSummary {
                start_time: now,
                end_time: now,
                verification_code: VerificationCode::Ok,
                licenses: Vec::new(),
                copyrights: Vec::new(),
                issues: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let store = FsProvenanceStore::new(dir.path());
        let known = art("pkg");
        store.write(&known, &result(known.clone(), "scancode")).await.unwrap();

        let found = store.read(&known, &ScannerCriteria::any()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scanner.name, "scancode");
    }

    #[tokio::test]
    async fn read_for_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsProvenanceStore::new(dir.path());
        let found = store.read(&art("missing"), &ScannerCriteria::any()).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn write_is_idempotent_per_scanner() {
        let dir = tempdir().unwrap();
        let store = FsProvenanceStore::new(dir.path());
        let known = art("pkg");
        store.write(&known, &result(known.clone(), "scancode")).await.unwrap();
        store.write(&known, &result(known.clone(), "scancode")).await.unwrap();

        let found = store.read(&known, &ScannerCriteria::any()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn multiple_scanners_coexist() {
        let dir = tempdir().unwrap();
        let store = FsProvenanceStore::new(dir.path());
        let known = art("pkg");
        store.write(&known, &result(known.clone(), "scancode")).await.unwrap();
        store.write(&known, &result(known.clone(), "licensee")).await.unwrap();

        let found = store.read(&known, &ScannerCriteria::any()).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn package_store_roundtrips() {
        let dir = tempdir().unwrap();
        let store = FsPackageStore::new(dir.path());
        let pkg = Package {
            id: "pkg:generic/foo@1.0.0".into(),
            artifact: None,
            vcs: None,
        };
        let known = art("pkg");
        let mut results = BTreeMap::new();
        results.insert(known.canonical_key(), vec![result(known.clone(), "scancode")]);
        let nested = NestedProvenanceScanResult {
            tree: NestedProvenance::trivial(known),
            results,
        };
        store.write(&pkg, &nested).await.unwrap();

        let found = store.read(&pkg, &ScannerCriteria::any()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn sanitize_handles_path_hostile_ids() {
        let dir = tempdir().unwrap();
        let store = FsPackageStore::new(dir.path());
        let pkg = Package {
            id: "pkg:generic/foo@1.0.0?arch=x86_64".into(),
            artifact: None,
            vcs: None,
        };
        let known = art("pkg");
        let nested = NestedProvenanceScanResult {
            tree: NestedProvenance::trivial(known),
            results: BTreeMap::new(),
        };
        store.write(&pkg, &nested).await.unwrap();
        let found = store.read(&pkg, &ScannerCriteria::any()).await.unwrap();
        // No results satisfy `any()` criteria since the results map is empty.
        assert!(found.is_empty());
    }
}
