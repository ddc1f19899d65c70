#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Partitions a package-wide [`ScanResult`] across a [`NestedProvenance`]
//! tree by path prefix.
//!
//! Used after a package-granular scanner returns one result covering the
//! whole package: the orchestrator needs a separate result per provenance
//! so cache writes stay keyed at provenance granularity.

use scanopt_core::{CopyrightFinding, KnownProvenance, LicenseFinding, NestedProvenance, ScanResult};
use std::collections::BTreeMap;

/// Split `result` across `tree`, producing one [`ScanResult`] per provenance
/// that carries only the findings whose [`TextLocation::path`](scanopt_core::TextLocation::path)
/// falls under that provenance's mount point.
///
/// Each slice keeps the same scanner details, the same time bounds, and a
/// full copy of `result`'s issues (issues are not path-scoped). Verification
/// codes are copied as-is and are not recomputed per slice — this is a
/// known approximation, not a bug: a package-granular scan verifies the
/// whole tree at once, and there is no principled way to attribute that
/// verdict to an individual sub-repository after the fact.
///
/// The returned map is keyed by [`KnownProvenance::canonical_key`].
#[must_use]
pub fn split(result: &ScanResult, tree: &NestedProvenance) -> BTreeMap<String, ScanResult> {
    let pairs = tree.prefix_pairs();

    let mut licenses_by_key: BTreeMap<String, Vec<LicenseFinding>> = BTreeMap::new();
    let mut copyrights_by_key: BTreeMap<String, Vec<CopyrightFinding>> = BTreeMap::new();
    let mut provenance_by_key: BTreeMap<String, &KnownProvenance> = BTreeMap::new();

    for (_, provenance) in &pairs {
        provenance_by_key
            .entry(provenance.canonical_key())
            .or_insert(*provenance);
    }

    for finding in &result.summary.licenses {
        if let Some((_, provenance)) = matching_pair(&pairs, &finding.location.path) {
            licenses_by_key
                .entry(provenance.canonical_key())
                .or_default()
                .push(finding.clone());
        }
    }
    for finding in &result.summary.copyrights {
        if let Some((_, provenance)) = matching_pair(&pairs, &finding.location.path) {
            copyrights_by_key
                .entry(provenance.canonical_key())
                .or_default()
                .push(finding.clone());
        }
    }

    provenance_by_key
        .into_iter()
        .map(|(key, provenance)| {
            let summary = scanopt_core::ScanSummary {
                start_time: result.summary.start_time,
                end_time: result.summary.end_time,
                verification_code: result.summary.verification_code,
                licenses: licenses_by_key.remove(&key).unwrap_or_default(),
                copyrights: copyrights_by_key.remove(&key).unwrap_or_default(),
                issues: result.summary.issues.clone(),
            };
            (
                key,
                ScanResult {
                    provenance: provenance.clone(),
                    scanner: result.scanner.clone(),
                    summary,
                },
            )
        })
        .collect()
}

/// Finds the first `(prefix, provenance)` pair — pairs must already be
/// sorted by descending prefix length — whose prefix is a path-boundary
/// prefix of `path`.
///
/// A prefix `p` matches `path` iff `p == ""`, or `path == p`, or `path`
/// starts with `p + "/"`.
fn matching_pair<'a>(
    pairs: &'a [(&'a str, &'a KnownProvenance)],
    path: &str,
) -> Option<(&'a str, &'a KnownProvenance)> {
    pairs
        .iter()
        .find(|(prefix, _)| {
            prefix.is_empty() || path == *prefix || path.starts_with(&format!("{prefix}/"))
        })
        .copied()
}
