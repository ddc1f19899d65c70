#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Scanner-backend trait and the three invocation shapes a backend may
//! implement.
//!
//! A scanner backend is polymorphic over exactly one of three shapes:
//! package-granular ([`PackageGranularScanner`]), provenance-granular
//! ([`ProvenanceGranularScanner`]), or local ([`LocalScanner`]). All three
//! additionally expose `name`, `details`, and `criteria`; [`ScannerBackend`]
//! is the dispatch-friendly enum the orchestrator actually holds.

use async_trait::async_trait;
use scanopt_core::{KnownProvenance, Package, ScanResult, ScannerCriteria, ScannerDetails};
use scanopt_error::ScanOptError;
use std::path::Path;
use std::sync::Arc;

pub mod mock;
pub mod subprocess;

pub use mock::MockScanner;
pub use subprocess::SubprocessScanner;

/// A scanner backend that resolves its own source and scans a whole package.
///
/// Used when the backend has its own source-fetching pipeline; the
/// returned [`ScanResult`] already carries a populated `provenance` field.
#[async_trait]
pub trait PackageGranularScanner: Send + Sync {
    /// Scanner name, stable across versions.
    fn name(&self) -> &str;
    /// Identity of this scanner instance (name, version, config fingerprint).
    fn details(&self) -> ScannerDetails;
    /// Cache-lookup criteria this scanner's results should be matched against.
    fn criteria(&self) -> ScannerCriteria;

    /// Scan a whole package, resolving and fetching its source internally.
    async fn scan_package(&self, pkg: &Package) -> Result<ScanResult, ScanOptError>;
}

/// A scanner backend that fetches from a known provenance and scans it.
#[async_trait]
pub trait ProvenanceGranularScanner: Send + Sync {
    /// Scanner name, stable across versions.
    fn name(&self) -> &str;
    /// Identity of this scanner instance.
    fn details(&self) -> ScannerDetails;
    /// Cache-lookup criteria this scanner's results should be matched against.
    fn criteria(&self) -> ScannerCriteria;

    /// Scan a single provenance, fetching its source internally.
    async fn scan_provenance(&self, known: &KnownProvenance) -> Result<ScanResult, ScanOptError>;
}

/// A scanner backend that only scans an already-materialized directory.
///
/// The caller (the orchestrator) is responsible for downloading the
/// provenance and for stamping the correct provenance onto the returned
/// result — local backends have no knowledge of where `dir` came from.
#[async_trait]
pub trait LocalScanner: Send + Sync {
    /// Scanner name, stable across versions.
    fn name(&self) -> &str;
    /// Identity of this scanner instance.
    fn details(&self) -> ScannerDetails;
    /// Cache-lookup criteria this scanner's results should be matched against.
    fn criteria(&self) -> ScannerCriteria;

    /// Scan a local directory. The `provenance` field of the returned
    /// result is meaningless and is overwritten by the caller.
    async fn scan_path(&self, dir: &Path) -> Result<ScanResult, ScanOptError>;
}

/// One of the three scanner-backend shapes, as configured on the orchestrator.
///
/// Cloning is cheap: each variant wraps an `Arc` to the underlying
/// implementation, so a `ScannerBackend` can be shared across concurrent
/// dispatch tasks.
#[derive(Clone)]
pub enum ScannerBackend {
    /// A [`PackageGranularScanner`].
    PackageGranular(Arc<dyn PackageGranularScanner>),
    /// A [`ProvenanceGranularScanner`].
    ProvenanceGranular(Arc<dyn ProvenanceGranularScanner>),
    /// A [`LocalScanner`].
    Local(Arc<dyn LocalScanner>),
}

impl ScannerBackend {
    /// Scanner name, regardless of shape.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PackageGranular(s) => s.name(),
            Self::ProvenanceGranular(s) => s.name(),
            Self::Local(s) => s.name(),
        }
    }

    /// Scanner identity, regardless of shape.
    #[must_use]
    pub fn details(&self) -> ScannerDetails {
        match self {
            Self::PackageGranular(s) => s.details(),
            Self::ProvenanceGranular(s) => s.details(),
            Self::Local(s) => s.details(),
        }
    }

    /// Cache-lookup criteria, regardless of shape.
    #[must_use]
    pub fn criteria(&self) -> ScannerCriteria {
        match self {
            Self::PackageGranular(s) => s.criteria(),
            Self::ProvenanceGranular(s) => s.criteria(),
            Self::Local(s) => s.criteria(),
        }
    }
}

impl std::fmt::Debug for ScannerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Self::PackageGranular(_) => "PackageGranular",
            Self::ProvenanceGranular(_) => "ProvenanceGranular",
            Self::Local(_) => "Local",
        };
        f.debug_struct("ScannerBackend")
            .field("shape", &shape)
            .field("name", &self.name())
            .finish()
    }
}
