// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory storage implementations, primarily useful for tests and for a
//! process-local result cache layered in front of a slower backing store.

use crate::traits::{PackageReader, PackageWriter, ProvenanceReader, ProvenanceWriter};
use async_trait::async_trait;
use scanopt_core::{KnownProvenance, NestedProvenanceScanResult, Package, ScanResult, ScannerCriteria};
use scanopt_error::ScanOptError;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// An in-memory, process-local [`ProvenanceReader`] + [`ProvenanceWriter`].
#[derive(Default)]
pub struct MemoryProvenanceStore {
    by_key: Mutex<BTreeMap<String, Vec<ScanResult>>>,
}

impl MemoryProvenanceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProvenanceReader for MemoryProvenanceStore {
    async fn read(
        &self,
        known: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<ScanResult>, ScanOptError> {
        let guard = self.by_key.lock().expect("memory store lock poisoned");
        Ok(guard
            .get(&known.canonical_key())
            .map(|results| {
                results
                    .iter()
                    .filter(|r| criteria.matches(&r.scanner))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProvenanceWriter for MemoryProvenanceStore {
    async fn write(&self, known: &KnownProvenance, result: &ScanResult) -> Result<(), ScanOptError> {
        let mut guard = self.by_key.lock().expect("memory store lock poisoned");
        let entries = guard.entry(known.canonical_key()).or_default();
        entries.retain(|existing| existing.scanner != result.scanner);
        entries.push(result.clone());
        Ok(())
    }
}

/// An in-memory, process-local [`PackageReader`] + [`PackageWriter`].
#[derive(Default)]
pub struct MemoryPackageStore {
    by_id: Mutex<BTreeMap<String, NestedProvenanceScanResult>>,
}

impl MemoryPackageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageReader for MemoryPackageStore {
    async fn read(
        &self,
        pkg: &Package,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<NestedProvenanceScanResult>, ScanOptError> {
        let guard = self.by_id.lock().expect("memory store lock poisoned");
        Ok(guard
            .get(&pkg.id)
            .filter(|nested| {
                nested
                    .results
                    .values()
                    .flatten()
                    .any(|r| criteria.matches(&r.scanner))
            })
            .cloned()
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl PackageWriter for MemoryPackageStore {
    async fn write(
        &self,
        pkg: &Package,
        nested: &NestedProvenanceScanResult,
    ) -> Result<(), ScanOptError> {
        let mut guard = self.by_id.lock().expect("memory store lock poisoned");
        guard.insert(pkg.id.clone(), nested.clone());
        Ok(())
    }
}
