// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storage-reader and storage-writer traits, split by caching granularity.

use async_trait::async_trait;
use scanopt_core::{KnownProvenance, NestedProvenanceScanResult, Package, ScanResult, ScannerCriteria};
use scanopt_error::ScanOptError;

/// Reads cached [`ScanResult`]s keyed by provenance.
#[async_trait]
pub trait ProvenanceReader: Send + Sync {
    /// Return every stored result for `known` whose scanner details satisfy `criteria`.
    ///
    /// An empty `Vec` and a read failure both mean "treat as uncovered" from
    /// the orchestrator's point of view; failures are logged and do not
    /// abort the run.
    async fn read(
        &self,
        known: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<ScanResult>, ScanOptError>;
}

/// Persists [`ScanResult`]s keyed by provenance.
#[async_trait]
pub trait ProvenanceWriter: Send + Sync {
    /// Persist `result` for `known`.
    ///
    /// Idempotent per (provenance, scanner details): writing the same
    /// (provenance, scanner) pair twice leaves storage in the same state as
    /// writing it once.
    async fn write(&self, known: &KnownProvenance, result: &ScanResult) -> Result<(), ScanOptError>;
}

/// Reads cached [`NestedProvenanceScanResult`]s keyed by package.
///
/// Used when the original scan that produced the stored result was
/// package-granular.
#[async_trait]
pub trait PackageReader: Send + Sync {
    /// Return previously stored nested results for `pkg` whose contained
    /// scan results satisfy `criteria`.
    async fn read(
        &self,
        pkg: &Package,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<NestedProvenanceScanResult>, ScanOptError>;
}

/// Persists [`NestedProvenanceScanResult`]s keyed by package.
#[async_trait]
pub trait PackageWriter: Send + Sync {
    /// Persist `nested` for `pkg`.
    async fn write(
        &self,
        pkg: &Package,
        nested: &NestedProvenanceScanResult,
    ) -> Result<(), ScanOptError>;
}
