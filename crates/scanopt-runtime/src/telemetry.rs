// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run-level counters returned alongside a scan run's results.

use serde::Serialize;

/// Counts accumulated over one [`crate::Orchestrator::scan`] call.
///
/// Collected on the aggregation task as the run progresses — no atomics
/// needed since nothing outside that task ever mutates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Provenances whose scanner coverage was satisfied entirely from cache.
    pub cache_hits: u64,
    /// `scan_package` invocations dispatched.
    pub package_granular_scans: u64,
    /// `scan_provenance` invocations dispatched.
    pub provenance_granular_scans: u64,
    /// `scan_path` invocations dispatched.
    pub local_scans: u64,
    /// Provenance downloads performed (shared across local scanners per provenance).
    pub downloads_performed: u64,
    /// Total `ERROR`-severity issues raised across all results in the run.
    pub issues_raised: u64,
}

impl RunStats {
    /// Total scanner invocations dispatched, regardless of shape.
    #[must_use]
    pub fn total_scans_dispatched(&self) -> u64 {
        self.package_granular_scans + self.provenance_granular_scans + self.local_scans
    }
}
