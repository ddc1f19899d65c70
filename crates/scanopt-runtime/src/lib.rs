// SPDX-License-Identifier: MIT OR Apache-2.0
//! scanopt-runtime
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The orchestrator: drives package-to-provenance resolution, nested-provenance
//! resolution, cache lookup, scanner dispatch under a de-duplication
//! invariant, on-demand downloads for local scanners, and result assembly
//! and write-back.
//!
//! [`Orchestrator::scan`] is the single entry point. Construction is
//! fallible ([`OrchestratorError`]) and validated eagerly in
//! [`OrchestratorBuilder::build`]; the run itself never aborts on a
//! per-item failure — see [`Orchestrator::scan_cancellable`].

/// Cancellation primitives threaded through a scan run.
pub mod cancel;
/// Package-provenance and nested-provenance resolution.
pub mod resolver;
/// Run-level counters.
pub mod telemetry;

pub use cancel::{CancellableRun, CancellationReason, CancellationToken};
pub use resolver::{
    NestedProvenanceResolver, PackageProvenanceResolver, PriorityPackageResolver,
    StaticNestedProvenanceResolver, SubmoduleDeclaration, TrivialNestedProvenanceResolver,
};
pub use telemetry::RunStats;

use futures::future::join_all;
use scanopt_backend::ScannerBackend;
use scanopt_core::{
    IssueSeverity, KnownProvenance, NestedProvenance, NestedProvenanceScanResult, Package,
    Provenance, ScanIssue, ScanResult, ScanSummary, ScannerDetails,
};
use scanopt_download::{Downloader, LocalArchiveDownloader};
use scanopt_error::{ErrorCode, ScanOptError};
use scanopt_storage::{PackageReader, PackageWriter, ProvenanceReader, ProvenanceWriter};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Mutex, OnceCell};

const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// OrchestratorError
// ---------------------------------------------------------------------------

/// Errors surfaced synchronously at [`OrchestratorBuilder::build`].
///
/// Nothing in [`Orchestrator::scan`] returns this type — per-item failures
/// during a run are carried as [`ScanIssue`]s on synthetic results instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No scanner backends were registered on the builder.
    #[error("no scanner backends were configured")]
    NoBackends,
    /// A scanner's own cache-lookup criteria describe an unsatisfiable version range.
    #[error("scanner {name:?} has an unsatisfiable version range: min {min} > max {max}")]
    ContradictoryCriteria {
        /// The offending scanner's name.
        name: String,
        /// The criteria's declared minimum version.
        min: String,
        /// The criteria's declared maximum version.
        max: String,
    },
}

impl OrchestratorError {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoBackends => ErrorCode::ConfigNoBackends,
            Self::ContradictoryCriteria { .. } => ErrorCode::ConfigContradictoryCriteria,
        }
    }
}

impl From<OrchestratorError> for ScanOptError {
    fn from(err: OrchestratorError) -> Self {
        let code = err.error_code();
        ScanOptError::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Readers: a combined, registration-ordered list
// ---------------------------------------------------------------------------

enum ReaderSlot {
    Provenance(Arc<dyn ProvenanceReader>),
    Package(Arc<dyn PackageReader>),
}

// ---------------------------------------------------------------------------
// OrchestratorBuilder
// ---------------------------------------------------------------------------

/// Builds an [`Orchestrator`], validating configuration eagerly.
pub struct OrchestratorBuilder {
    scanners: Vec<ScannerBackend>,
    readers: Vec<ReaderSlot>,
    provenance_writers: Vec<Arc<dyn ProvenanceWriter>>,
    package_writers: Vec<Arc<dyn PackageWriter>>,
    downloader: Option<Arc<dyn Downloader>>,
    package_resolver: Option<Arc<dyn PackageProvenanceResolver>>,
    nested_resolver: Option<Arc<dyn NestedProvenanceResolver>>,
    scan_timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl OrchestratorBuilder {
    fn new() -> Self {
        Self {
            scanners: Vec::new(),
            readers: Vec::new(),
            provenance_writers: Vec::new(),
            package_writers: Vec::new(),
            downloader: None,
            package_resolver: None,
            nested_resolver: None,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scratch_root: None,
        }
    }

    /// Register a scanner backend. Registration order determines the order
    /// results are folded in, and is stable across a run.
    #[must_use]
    pub fn scanner(mut self, backend: ScannerBackend) -> Self {
        self.scanners.push(backend);
        self
    }

    /// Register a provenance-keyed reader. Readers (of either keying flavor)
    /// are consulted together in the order they were registered.
    #[must_use]
    pub fn provenance_reader(mut self, reader: Arc<dyn ProvenanceReader>) -> Self {
        self.readers.push(ReaderSlot::Provenance(reader));
        self
    }

    /// Register a package-keyed reader.
    #[must_use]
    pub fn package_reader(mut self, reader: Arc<dyn PackageReader>) -> Self {
        self.readers.push(ReaderSlot::Package(reader));
        self
    }

    /// Register a provenance-keyed writer. Every newly produced provenance-level
    /// result is delivered to every registered writer.
    #[must_use]
    pub fn provenance_writer(mut self, writer: Arc<dyn ProvenanceWriter>) -> Self {
        self.provenance_writers.push(writer);
        self
    }

    /// Register a package-keyed writer.
    #[must_use]
    pub fn package_writer(mut self, writer: Arc<dyn PackageWriter>) -> Self {
        self.package_writers.push(writer);
        self
    }

    /// Set the downloader used to materialize provenances for local scanners.
    /// Defaults to [`LocalArchiveDownloader`].
    #[must_use]
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Set the package-provenance resolver. Defaults to
    /// [`PriorityPackageResolver::default`].
    #[must_use]
    pub fn package_resolver(mut self, resolver: Arc<dyn PackageProvenanceResolver>) -> Self {
        self.package_resolver = Some(resolver);
        self
    }

    /// Set the nested-provenance resolver. Defaults to
    /// [`TrivialNestedProvenanceResolver`].
    #[must_use]
    pub fn nested_resolver(mut self, resolver: Arc<dyn NestedProvenanceResolver>) -> Self {
        self.nested_resolver = Some(resolver);
        self
    }

    /// Set the per-invocation scanner timeout. Defaults to 600 seconds.
    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the root directory under which per-download scratch directories
    /// are created. Defaults to the system temporary directory.
    #[must_use]
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Validate and build the [`Orchestrator`].
    ///
    /// Fails if no scanner is registered, or if any registered scanner's
    /// criteria describe an unsatisfiable version range.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        if self.scanners.is_empty() {
            return Err(OrchestratorError::NoBackends);
        }
        for scanner in &self.scanners {
            let criteria = scanner.criteria();
            if criteria.min_version > criteria.max_version {
                return Err(OrchestratorError::ContradictoryCriteria {
                    name: scanner.name().to_string(),
                    min: criteria.min_version.to_string(),
                    max: criteria.max_version.to_string(),
                });
            }
        }
        Ok(Orchestrator {
            scanners: self.scanners,
            readers: self.readers,
            provenance_writers: self.provenance_writers,
            package_writers: self.package_writers,
            downloader: self
                .downloader
                .unwrap_or_else(|| Arc::new(LocalArchiveDownloader::new())),
            package_resolver: self
                .package_resolver
                .unwrap_or_else(|| Arc::new(PriorityPackageResolver::default())),
            nested_resolver: self
                .nested_resolver
                .unwrap_or_else(|| Arc::new(TrivialNestedProvenanceResolver)),
            scan_timeout: self.scan_timeout,
            scratch_root: self.scratch_root,
        })
    }
}

// ---------------------------------------------------------------------------
// ScanRunOutput
// ---------------------------------------------------------------------------

/// The output of [`Orchestrator::scan`]: one [`NestedProvenanceScanResult`]
/// per input package whose provenance resolved to something known, plus
/// run-level [`RunStats`].
///
/// Packages whose provenance could not be resolved to anything known are
/// omitted here; resolution failures are logged as they occur.
#[derive(Debug, Clone)]
pub struct ScanRunOutput {
    /// Assembled nested results, keyed by [`Package::id`].
    pub results: BTreeMap<String, NestedProvenanceScanResult>,
    /// Counters accumulated over the run.
    pub stats: RunStats,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

type ScannerResults = BTreeMap<usize, BTreeMap<String, Vec<ScanResult>>>;
type DownloadCache = Mutex<BTreeMap<String, Arc<OnceCell<Arc<Result<Arc<TempDir>, String>>>>>>;

/// Drives the scan-orchestration pipeline over a set of [`Package`]s.
pub struct Orchestrator {
    scanners: Vec<ScannerBackend>,
    readers: Vec<ReaderSlot>,
    provenance_writers: Vec<Arc<dyn ProvenanceWriter>>,
    package_writers: Vec<Arc<dyn PackageWriter>>,
    downloader: Arc<dyn Downloader>,
    package_resolver: Arc<dyn PackageProvenanceResolver>,
    nested_resolver: Arc<dyn NestedProvenanceResolver>,
    scan_timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl Orchestrator {
    /// Start building an [`Orchestrator`].
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run a scan over `packages`, never aborting on a per-item failure.
    ///
    /// Equivalent to [`Orchestrator::scan_cancellable`] with a token that is
    /// never cancelled.
    pub async fn scan(&self, packages: Vec<Package>) -> ScanRunOutput {
        self.scan_cancellable(packages, CancellationToken::new()).await
    }

    /// Run a scan over `packages`, checking `cancel` between pipeline
    /// phases.
    ///
    /// On cancellation, work already dispatched for the current phase is
    /// still awaited to completion (spawned tasks are never abandoned
    /// mid-call), but no further phase is entered and nothing produced after
    /// the cancellation point is written to storage.
    pub async fn scan_cancellable(
        &self,
        packages: Vec<Package>,
        cancel: CancellationToken,
    ) -> ScanRunOutput {
        let mut stats = RunStats::default();

        // Step 1: resolve package provenances.
        let mut prov_p: BTreeMap<String, Provenance> = BTreeMap::new();
        for pkg in &packages {
            let resolved = match self.package_resolver.resolve(pkg).await {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(package = %pkg.id, error = %err, "package-provenance resolution failed");
                    Provenance::Unknown
                }
            };
            if resolved.is_unknown() {
                tracing::warn!(package = %pkg.id, "package provenance is unknown; omitting from results");
            }
            prov_p.insert(pkg.id.clone(), resolved);
        }

        // Step 2: resolve nested provenances for packages with a known provenance,
        // building the single canonical-key-deduplicated provenance set that the
        // de-duplication invariant relies on.
        let mut nested: BTreeMap<String, NestedProvenance> = BTreeMap::new();
        let mut all_prov: BTreeMap<String, KnownProvenance> = BTreeMap::new();
        for pkg in &packages {
            let Some(known) = prov_p[&pkg.id].known() else {
                continue;
            };
            let tree = match self.nested_resolver.resolve(&known).await {
                Ok(tree) => tree,
                Err(err) => {
                    tracing::warn!(package = %pkg.id, error = %err, "nested-provenance resolution failed");
                    NestedProvenance::trivial(known.clone())
                }
            };
            for p in tree.all_provenances() {
                all_prov.insert(p.canonical_key(), p.clone());
            }
            nested.insert(pkg.id.clone(), tree);
        }

        // Step 3: read cache, in reader-registration order, across both reader
        // kinds. A package-keyed reader's answer can satisfy any still-uncovered
        // provenance in that package's tree, not only the one nominally queried.
        let mut results: ScannerResults = BTreeMap::new();
        let resolved_packages: Vec<&Package> =
            packages.iter().filter(|p| nested.contains_key(&p.id)).collect();
        for (s_idx, scanner) in self.scanners.iter().enumerate() {
            let criteria = scanner.criteria();
            let mut remaining: BTreeSet<String> = all_prov.keys().cloned().collect();
            let scanner_results = results.entry(s_idx).or_default();

            for slot in &self.readers {
                if remaining.is_empty() {
                    break;
                }
                match slot {
                    ReaderSlot::Provenance(reader) => {
                        for key in remaining.clone() {
                            let known = &all_prov[&key];
                            match reader.read(known, &criteria).await {
                                Ok(found) if !found.is_empty() => {
                                    scanner_results.insert(key.clone(), found);
                                    remaining.remove(&key);
                                }
                                Ok(_) => {}
                                Err(err) => {
                                    tracing::warn!(provenance = %key, error = %err, "provenance reader failed");
                                }
                            }
                        }
                    }
                    ReaderSlot::Package(reader) => {
                        for pkg in &resolved_packages {
                            match reader.read(pkg, &criteria).await {
                                Ok(found) => {
                                    for npsr in found {
                                        for (prov_key, vec) in npsr.results {
                                            if remaining.contains(&prov_key) && !vec.is_empty() {
                                                scanner_results.insert(prov_key.clone(), vec);
                                                remaining.remove(&prov_key);
                                            }
                                        }
                                    }
                                }
                                Err(err) => {
                                    tracing::warn!(package = %pkg.id, error = %err, "package reader failed");
                                }
                            }
                        }
                    }
                }
            }
        }
        stats.cache_hits = results.values().map(|m| m.len() as u64).sum();

        if cancel.is_cancelled() {
            return self.assemble(&packages, &nested, &results, stats).await;
        }

        // Step 4: identify incomplete packages.
        let incomplete_pkgs = self.incomplete_packages(&packages, &prov_p, &nested, &results);

        // Step 5: dispatch package-granular scans and fold split results in.
        let mut package_granular_tasks = Vec::new();
        for (pkg_id, scanner_idxs) in &incomplete_pkgs {
            let pkg = packages
                .iter()
                .find(|p| &p.id == pkg_id)
                .expect("incomplete_packages only names known package ids")
                .clone();
            for &s_idx in scanner_idxs {
                if let ScannerBackend::PackageGranular(scanner) = &self.scanners[s_idx] {
                    let scanner = Arc::clone(scanner);
                    let pkg = pkg.clone();
                    let pkg_id = pkg_id.clone();
                    let timeout = self.scan_timeout;
                    package_granular_tasks.push(tokio::spawn(async move {
                        let details = scanner.details();
                        let name = scanner.name().to_string();
                        let root = package_fallback_provenance(&pkg);
                        let outcome = tokio::time::timeout(timeout, scanner.scan_package(&pkg)).await;
                        let result = match outcome {
                            Ok(Ok(result)) => result,
                            Ok(Err(err)) => synthetic_result(root, details, &name, err.message),
                            Err(_) => synthetic_result(
                                root,
                                details,
                                &name,
                                format!("scan_package timed out after {timeout:?}"),
                            ),
                        };
                        (pkg_id, s_idx, result)
                    }));
                }
            }
        }
        for outcome in join_all(package_granular_tasks).await {
            let Ok((pkg_id, s_idx, result)) = outcome else {
                tracing::error!("package-granular scan task panicked");
                continue;
            };
            stats.package_granular_scans += 1;
            let Some(tree) = nested.get(&pkg_id) else {
                continue;
            };
            let slices = scanopt_split::split(&result, tree);
            let scanner_results = results.entry(s_idx).or_default();
            for (key, slice) in slices {
                scanner_results.entry(key).or_default().push(slice);
            }
        }

        if cancel.is_cancelled() {
            return self.assemble(&packages, &nested, &results, stats).await;
        }

        // Step 6: identify incomplete provenances over the deduplicated set.
        let mut incomplete_prov: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for key in all_prov.keys() {
            for (s_idx, scanner) in self.scanners.iter().enumerate() {
                if matches!(scanner, ScannerBackend::PackageGranular(_)) {
                    continue;
                }
                if !covered(&results, s_idx, key) {
                    incomplete_prov.entry(key.clone()).or_default().push(s_idx);
                }
            }
        }

        // Step 7: dispatch provenance-granular and local scans. Local scanners
        // targeting the same provenance share one download via `downloads`.
        let downloads: Arc<DownloadCache> = Arc::new(Mutex::new(BTreeMap::new()));
        let mut provenance_tasks = Vec::new();
        for (key, scanner_idxs) in &incomplete_prov {
            let known = all_prov[key].clone();
            for &s_idx in scanner_idxs {
                match &self.scanners[s_idx] {
                    ScannerBackend::PackageGranular(_) => unreachable!("filtered above"),
                    ScannerBackend::ProvenanceGranular(scanner) => {
                        let scanner = Arc::clone(scanner);
                        let known = known.clone();
                        let timeout = self.scan_timeout;
                        let key = key.clone();
                        provenance_tasks.push(tokio::spawn(async move {
                            let details = scanner.details();
                            let name = scanner.name().to_string();
                            let outcome =
                                tokio::time::timeout(timeout, scanner.scan_provenance(&known)).await;
                            let result = match outcome {
                                Ok(Ok(result)) => result,
                                Ok(Err(err)) => {
                                    synthetic_result(known.clone(), details, &name, err.message)
                                }
                                Err(_) => synthetic_result(
                                    known.clone(),
                                    details,
                                    &name,
                                    format!("scan_provenance timed out after {timeout:?}"),
                                ),
                            };
                            (key, s_idx, result, true)
                        }));
                    }
                    ScannerBackend::Local(scanner) => {
                        let scanner = Arc::clone(scanner);
                        let known = known.clone();
                        let timeout = self.scan_timeout;
                        let key = key.clone();
                        let downloader = Arc::clone(&self.downloader);
                        let downloads = Arc::clone(&downloads);
                        let scratch_root = self.scratch_root.clone();
                        provenance_tasks.push(tokio::spawn(async move {
                            let details = scanner.details();
                            let name = scanner.name().to_string();
                            let dir_result = ensure_downloaded(
                                &downloader,
                                &known,
                                &downloads,
                                scratch_root.as_deref(),
                            )
                            .await;
                            let result = match dir_result.as_ref() {
                                Ok(dir) => {
                                    let outcome =
                                        tokio::time::timeout(timeout, scanner.scan_path(dir.path()))
                                            .await;
                                    match outcome {
                                        Ok(Ok(mut result)) => {
                                            result.provenance = known.clone();
                                            result
                                        }
                                        Ok(Err(err)) => {
                                            synthetic_result(known.clone(), details, &name, err.message)
                                        }
                                        Err(_) => synthetic_result(
                                            known.clone(),
                                            details,
                                            &name,
                                            format!("scan_path timed out after {timeout:?}"),
                                        ),
                                    }
                                }
                                Err(message) => {
                                    synthetic_result(known.clone(), details, "Downloader", message.clone())
                                }
                            };
                            (key, s_idx, result, false)
                        }));
                    }
                }
            }
        }
        let provenance_outcomes = join_all(provenance_tasks).await;
        let mut new_provenance_results: Vec<(String, ScanResult)> = Vec::new();
        for outcome in provenance_outcomes {
            let Ok((key, s_idx, result, is_remote)) = outcome else {
                tracing::error!("provenance scan task panicked");
                continue;
            };
            if is_remote {
                stats.provenance_granular_scans += 1;
            } else {
                stats.local_scans += 1;
            }
            results
                .entry(s_idx)
                .or_default()
                .entry(key.clone())
                .or_default()
                .push(result.clone());
            new_provenance_results.push((key, result));
        }
        stats.downloads_performed = downloads.lock().await.len() as u64;

        if !cancel.is_cancelled() {
            for (key, result) in &new_provenance_results {
                let Some(known) = all_prov.get(key) else {
                    continue;
                };
                for writer in &self.provenance_writers {
                    if let Err(err) = writer.write(known, result).await {
                        tracing::warn!(provenance = %key, error = %err, "provenance writer failed");
                    }
                }
            }
        }

        let output = self.assemble(&packages, &nested, &results, stats).await;

        // Step 9: write package-keyed results for packages that needed rescanning.
        if !cancel.is_cancelled() {
            for pkg in &packages {
                if !incomplete_pkgs.contains_key(&pkg.id) {
                    continue;
                }
                let Some(nested_result) = output.results.get(&pkg.id) else {
                    continue;
                };
                for writer in &self.package_writers {
                    if let Err(err) = writer.write(pkg, nested_result).await {
                        tracing::warn!(package = %pkg.id, error = %err, "package writer failed");
                    }
                }
            }
        }

        output
    }

    /// Package ids whose scanner coverage is incomplete: either the root
    /// provenance or some sub-repository provenance is not yet covered by
    /// that scanner.
    fn incomplete_packages(
        &self,
        packages: &[Package],
        prov_p: &BTreeMap<String, Provenance>,
        nested: &BTreeMap<String, NestedProvenance>,
        results: &ScannerResults,
    ) -> BTreeMap<String, Vec<usize>> {
        let mut incomplete = BTreeMap::new();
        for pkg in packages {
            let Some(root) = prov_p[&pkg.id].known() else {
                continue;
            };
            let Some(tree) = nested.get(&pkg.id) else {
                continue;
            };
            let root_key = root.canonical_key();
            for (s_idx, scanner) in self.scanners.iter().enumerate() {
                if !matches!(scanner, ScannerBackend::PackageGranular(_)) {
                    continue;
                }
                let root_covered = covered(results, s_idx, &root_key);
                let all_covered = tree
                    .all_provenances()
                    .all(|p| covered(results, s_idx, &p.canonical_key()));
                if !root_covered || !all_covered {
                    incomplete.entry(pkg.id.clone()).or_insert_with(Vec::new).push(s_idx);
                }
            }
        }
        incomplete
    }

    /// Steps 8 and 10: assemble nested results per package and tally
    /// run-level issue counts. Package-keyed write-back (step 9) happens in
    /// the caller, since it needs the assembled output.
    async fn assemble(
        &self,
        packages: &[Package],
        nested: &BTreeMap<String, NestedProvenance>,
        results: &ScannerResults,
        mut stats: RunStats,
    ) -> ScanRunOutput {
        let mut final_results = BTreeMap::new();
        for pkg in packages {
            let Some(tree) = nested.get(&pkg.id) else {
                continue;
            };
            let mut per_prov: BTreeMap<String, Vec<ScanResult>> = BTreeMap::new();
            for p in tree.all_provenances() {
                let key = p.canonical_key();
                let mut combined = Vec::new();
                for s_idx in 0..self.scanners.len() {
                    if let Some(v) = results.get(&s_idx).and_then(|m| m.get(&key)) {
                        combined.extend(v.iter().cloned());
                    }
                }
                per_prov.insert(key, combined);
            }
            final_results.insert(
                pkg.id.clone(),
                NestedProvenanceScanResult {
                    tree: tree.clone(),
                    results: per_prov,
                },
            );
        }

        for nested_result in final_results.values() {
            for r in nested_result.results.values().flatten() {
                stats.issues_raised += r
                    .summary
                    .issues
                    .iter()
                    .filter(|issue| issue.severity == IssueSeverity::Error)
                    .count() as u64;
            }
        }

        ScanRunOutput {
            results: final_results,
            stats,
        }
    }
}

fn covered(results: &ScannerResults, s_idx: usize, key: &str) -> bool {
    results
        .get(&s_idx)
        .and_then(|m| m.get(key))
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

/// Fallback provenance a package-granular synthetic error result is rooted
/// at, used only when a scanner invocation fails before it gets the chance
/// to report its own.
fn package_fallback_provenance(pkg: &Package) -> KnownProvenance {
    if let Some(artifact) = &pkg.artifact {
        KnownProvenance::Artifact {
            url: artifact.url.clone(),
            hash: artifact.hash.clone(),
        }
    } else if let Some(vcs) = &pkg.vcs {
        KnownProvenance::Repository {
            vcs: vcs.vcs,
            url: vcs.url.clone(),
            requested_revision: vcs.requested_revision.clone(),
            resolved_revision: vcs.requested_revision.clone(),
            path: vcs.path.clone(),
        }
    } else {
        KnownProvenance::Artifact {
            url: pkg.id.clone(),
            hash: None,
        }
    }
}

fn synthetic_result(
    provenance: KnownProvenance,
    scanner: ScannerDetails,
    source: &str,
    message: String,
) -> ScanResult {
    let now = chrono::Utc::now();
    ScanResult {
        provenance,
        scanner,
        summary: ScanSummary::synthetic_error(now, ScanIssue::error(source, message)),
    }
}

async fn ensure_downloaded(
    downloader: &Arc<dyn Downloader>,
    known: &KnownProvenance,
    cache: &DownloadCache,
    scratch_root: Option<&std::path::Path>,
) -> Arc<Result<Arc<TempDir>, String>> {
    let cell = {
        let mut guard = cache.lock().await;
        guard
            .entry(known.canonical_key())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    };
    cell.get_or_init(|| async {
        let made = match scratch_root {
            Some(root) => tempfile::Builder::new().prefix("scanopt-").tempdir_in(root),
            None => tempfile::tempdir(),
        };
        match made {
            Ok(dir) => match downloader.download(known, dir.path()).await {
                Ok(()) => Arc::new(Ok(Arc::new(dir))),
                Err(err) => Arc::new(Err(err.message)),
            },
            Err(err) => Arc::new(Err(err.to_string())),
        }
    })
    .await
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scanopt_backend::{LocalScanner, PackageGranularScanner};
    use scanopt_core::{ArtifactDescriptor, ScanSummary, ScannerCriteria, VerificationCode};
    use scanopt_download::FakeDownloader;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pkg(id: &str, url: &str) -> Package {
        Package {
            id: id.into(),
            artifact: Some(ArtifactDescriptor {
                url: url.into(),
                hash: None,
            }),
            vcs: None,
        }
    }

    fn clean_summary() -> ScanSummary {
        let now = chrono::Utc::now();
        ScanSummary {
            start_time: now,
            end_time: now,
            verification_code: VerificationCode::Ok,
            licenses: Vec::new(),
            copyrights: Vec::new(),
            issues: Vec::new(),
        }
    }

    struct CountingPackageScanner {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PackageGranularScanner for CountingPackageScanner {
        fn name(&self) -> &str {
            "counting-package-scanner"
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

        async fn scan_package(&self, pkg: &Package) -> Result<ScanResult, ScanOptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ScanResult {
                provenance: package_fallback_provenance(pkg),
                scanner: self.details(),
                summary: clean_summary(),
            })
        }
    }

    struct FailingLocalScanner;

    #[async_trait]
    impl LocalScanner for FailingLocalScanner {
        fn name(&self) -> &str {
            "failing-local-scanner"
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

        async fn scan_path(&self, _path: &Path) -> Result<ScanResult, ScanOptError> {
            unreachable!("never invoked when download fails")
        }
    }

    #[test]
    fn builder_rejects_empty_scanner_list() {
        let err = Orchestrator::builder().build().unwrap_err();
        assert!(matches!(err, OrchestratorError::NoBackends));
        assert_eq!(err.error_code(), ErrorCode::ConfigNoBackends);
    }

    #[tokio::test]
    async fn scan_package_invoked_once_per_package() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = Arc::new(CountingPackageScanner {
            calls: Arc::clone(&calls),
        });
        let orchestrator = Orchestrator::builder()
            .scanner(ScannerBackend::PackageGranular(scanner))
            .build()
            .unwrap();

        let packages = vec![
            pkg("pkg:generic/a@1.0.0", "https://example.com/a.tar.gz"),
            pkg("pkg:generic/b@1.0.0", "https://example.com/b.tar.gz"),
        ];
        let output = orchestrator.scan(packages).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(output.stats.package_granular_scans, 2);
        assert_eq!(output.results.len(), 2);
    }

    #[tokio::test]
    async fn cache_hit_skips_backend_entirely() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = Arc::new(CountingPackageScanner {
            calls: Arc::clone(&calls),
        });
        let known = KnownProvenance::Artifact {
            url: "https://example.com/a.tar.gz".into(),
            hash: None,
        };
        let store = Arc::new(scanopt_storage::memory::MemoryProvenanceStore::new());
        store
            .write(
                &known,
                &ScanResult {
                    provenance: known.clone(),
                    scanner: ScannerDetails {
                        name: "counting-package-scanner".into(),
                        version: "1.0.0".into(),
                        config_fingerprint: BTreeMap::new(),
                    },
                    summary: clean_summary(),
                },
            )
            .await
            .unwrap();

        let orchestrator = Orchestrator::builder()
            .scanner(ScannerBackend::PackageGranular(scanner))
            .provenance_reader(store)
            .build()
            .unwrap();

        let output = orchestrator
            .scan(vec![pkg("pkg:generic/a@1.0.0", "https://example.com/a.tar.gz")])
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.stats.cache_hits, 1);
        assert_eq!(output.stats.package_granular_scans, 0);
    }

    #[tokio::test]
    async fn local_scanner_download_failure_becomes_synthetic_error() {
        let scanner = Arc::new(FailingLocalScanner);
        let orchestrator = Orchestrator::builder()
            .scanner(ScannerBackend::Local(scanner))
            .downloader(Arc::new(FakeDownloader::failing()))
            .build()
            .unwrap();

        let output = orchestrator
            .scan(vec![pkg(
                "pkg:generic/a@1.0.0",
                "https://example.com/a.tar.gz",
            )])
            .await;

        assert_eq!(output.stats.local_scans, 1);
        let result = &output.results["pkg:generic/a@1.0.0"];
        let (_, issues) = result.results.iter().next().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].summary.issues[0].source, "Downloader");
        assert_eq!(issues[0].summary.verification_code, VerificationCode::Failed);
    }
}
