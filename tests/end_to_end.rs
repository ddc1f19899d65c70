// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end coverage of the orchestrator pipeline across crate boundaries,
//! exercising the scenarios named in the scan-orchestration design notes:
//! two packages sharing a resolved provenance are scanned once each; a
//! cache hit skips the backend and the writer entirely; a download failure
//! for a local scanner becomes a synthetic error result instead of aborting
//! the run.

use async_trait::async_trait;
use scanopt::backend::{LocalScanner, ScannerBackend};
use scanopt::core::{
    ArtifactDescriptor, KnownProvenance, Package, ScanResult, ScanSummary, ScannerCriteria,
    ScannerDetails, VcsDescriptor, VcsKind, VerificationCode,
};
use scanopt::download::FakeDownloader;
use scanopt::error::ScanOptError;
use scanopt::runtime::Orchestrator;
use scanopt::storage::memory::MemoryProvenanceStore;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn artifact_pkg(id: &str, url: &str) -> Package {
    Package {
        id: id.into(),
        artifact: Some(ArtifactDescriptor {
            url: url.into(),
            hash: None,
        }),
        vcs: None,
    }
}

fn vcs_pkg(id: &str, url: &str, revision: &str) -> Package {
    Package {
        id: id.into(),
        artifact: None,
        vcs: Some(VcsDescriptor {
            vcs: VcsKind::Git,
            url: url.into(),
            requested_revision: revision.into(),
            path: String::new(),
        }),
    }
}

/// A [`LocalScanner`] that counts invocations per distinct directory and
/// always reports a clean, empty summary.
struct CountingLocalScanner {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LocalScanner for CountingLocalScanner {
    fn name(&self) -> &str {
        "counting-local-scanner"
    }

    fn details(&self) -> ScannerDetails {
        ScannerDetails {
            name: self.name().into(),
            version: "1.0.0".into(),
            config_fingerprint: BTreeMap::new(),
        }
    }

    fn criteria(&self) -> ScannerCriteria {
        ScannerCriteria::any()
    }

    async fn scan_path(&self, _dir: &Path) -> Result<ScanResult, ScanOptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now();
        Ok(ScanResult {
            provenance: KnownProvenance::Artifact {
                url: "placeholder".into(),
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

/// Two packages whose VCS descriptors resolve to the *same* provenance
/// (same URL, revision, and path) must be scanned exactly once: the
/// de-duplication invariant keys on resolved provenance, not on package
/// identity.
#[tokio::test]
async fn shared_provenance_is_scanned_once_across_two_packages() {
    let calls = Arc::new(AtomicUsize::new(0));
    let scanner = Arc::new(CountingLocalScanner {
        calls: Arc::clone(&calls),
    });
    let orchestrator = Orchestrator::builder()
        .scanner(ScannerBackend::Local(scanner))
        .downloader(Arc::new(FakeDownloader::succeeding()))
        .build()
        .expect("builder with one backend always succeeds");

    let packages = vec![
        vcs_pkg("pkg:generic/one@1.0.0", "https://example.com/shared.git", "rev1"),
        vcs_pkg("pkg:generic/two@1.0.0", "https://example.com/shared.git", "rev1"),
    ];
    let output = orchestrator.scan(packages).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "scan_path invoked once per provenance, not per package");
    assert_eq!(output.stats.local_scans, 1);
    assert_eq!(output.results.len(), 2, "both packages still get a nested result");

    let shared_key = KnownProvenance::Repository {
        vcs: VcsKind::Git,
        url: "https://example.com/shared.git".into(),
        requested_revision: "rev1".into(),
        resolved_revision: "rev1".into(),
        path: String::new(),
    }
    .canonical_key();

    for nested in output.results.values() {
        let results = nested.results.get(&shared_key).expect("shared provenance present in every tree");
        assert_eq!(results.len(), 1);
    }
}

/// A provenance-keyed reader that already holds a satisfying result must
/// suppress the backend call and the writer fan-out entirely.
#[tokio::test]
async fn cache_hit_suppresses_backend_and_writer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let scanner = Arc::new(CountingLocalScanner {
        calls: Arc::clone(&calls),
    });

    let known = KnownProvenance::Artifact {
        url: "https://example.com/cached.tar.gz".into(),
        hash: None,
    };
    let reader_store = Arc::new(MemoryProvenanceStore::new());
    let now = chrono::Utc::now();
    let cached_result = ScanResult {
        provenance: known.clone(),
        scanner: ScannerDetails {
            name: "counting-local-scanner".into(),
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
    };
    scanopt::storage::ProvenanceWriter::write(reader_store.as_ref(), &known, &cached_result)
        .await
        .unwrap();

    let writer_store = Arc::new(MemoryProvenanceStore::new());

    let orchestrator = Orchestrator::builder()
        .scanner(ScannerBackend::Local(scanner))
        .provenance_reader(reader_store)
        .provenance_writer(Arc::clone(&writer_store) as Arc<dyn scanopt::storage::ProvenanceWriter>)
        .build()
        .unwrap();

    let output = orchestrator
        .scan(vec![artifact_pkg(
            "pkg:generic/cached@1.0.0",
            "https://example.com/cached.tar.gz",
        )])
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0, "backend must not run on a cache hit");
    assert_eq!(output.stats.cache_hits, 1);
    assert_eq!(output.stats.local_scans, 0);

    let found = scanopt::storage::ProvenanceReader::read(writer_store.as_ref(), &known, &ScannerCriteria::any())
        .await
        .unwrap();
    assert!(found.is_empty(), "writer must not be invoked when nothing new was scanned");
}

/// A download failure for a local scanner must not abort the run: it
/// becomes a synthetic error result tagged with the Downloader source, and
/// other packages in the same run are unaffected.
#[tokio::test]
async fn download_failure_yields_synthetic_error_without_aborting_run() {
    let scanner = Arc::new(CountingLocalScanner {
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let orchestrator = Orchestrator::builder()
        .scanner(ScannerBackend::Local(scanner))
        .downloader(Arc::new(FakeDownloader::failing()))
        .build()
        .unwrap();

    let output = orchestrator
        .scan(vec![artifact_pkg(
            "pkg:generic/broken@1.0.0",
            "https://example.com/broken.tar.gz",
        )])
        .await;

    let nested = &output.results["pkg:generic/broken@1.0.0"];
    let (_, results) = nested.results.iter().next().expect("one provenance in a trivial tree");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].summary.verification_code, VerificationCode::Failed);
    assert_eq!(results[0].summary.issues.len(), 1);
    assert_eq!(results[0].summary.issues[0].source, "Downloader");
    assert_eq!(output.stats.issues_raised, 1);
}
