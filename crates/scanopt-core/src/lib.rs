// SPDX-License-Identifier: MIT OR Apache-2.0
//! scanopt-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable data model shared by every other crate in this workspace:
//! provenance, packages, nested-provenance trees, and scan results.
//!
//! If you only take one dependency, take this one.

/// Nested-provenance trees: a root plus mounted sub-repositories.
pub mod nested;
/// Packages: the orchestrator's input type.
pub mod package;
/// Source provenance and its resolved subset.
pub mod provenance;
/// Scan results, findings, and scanner identity.
pub mod scan;

pub use nested::{NestedProvenance, NestedProvenanceError};
pub use package::{ArtifactDescriptor, OriginKind, Package, VcsDescriptor};
pub use provenance::{KnownProvenance, Provenance, VcsKind};
pub use scan::{
    CopyrightFinding, IssueSeverity, LicenseFinding, NestedProvenanceScanResult, ScanIssue,
    ScanResult, ScanSummary, ScannerCriteria, ScannerDetails, TextLocation, VerificationCode,
    Version,
};
