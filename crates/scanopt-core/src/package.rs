// SPDX-License-Identifier: MIT OR Apache-2.0
//! The package-provenance resolver's input type.

use crate::provenance::VcsKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A software package as handed to the orchestrator.
///
/// Input-only: the core never mutates a `Package`, only resolves it to a
/// [`crate::provenance::Provenance`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Package {
    /// Package identifier (e.g. a purl or a coordinate string).
    pub id: String,
    /// Declared source-artifact descriptor, if any.
    pub artifact: Option<ArtifactDescriptor>,
    /// Declared and processed VCS descriptor, if any.
    pub vcs: Option<VcsDescriptor>,
}

/// Declared remote-archive origin for a [`Package`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactDescriptor {
    /// Location of the archive.
    pub url: String,
    /// Optional declared content hash.
    pub hash: Option<String>,
}

/// Declared version-control origin for a [`Package`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VcsDescriptor {
    /// Version-control system kind.
    pub vcs: VcsKind,
    /// Repository URL.
    pub url: String,
    /// The revision as declared by the package metadata (branch, tag, ref).
    pub requested_revision: String,
    /// In-repo path, relative to the repository root (`""` for the root).
    pub path: String,
}

/// Priority order in which origin kinds are consulted by the
/// package-provenance resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Prefer the declared artifact descriptor.
    Artifact,
    /// Prefer the declared VCS descriptor.
    Vcs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_with_no_origin_round_trips() {
        let p = Package {
            id: "pkg:generic/foo@1.0.0".into(),
            artifact: None,
            vcs: None,
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Package = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, p.id);
        assert!(back.artifact.is_none());
        assert!(back.vcs.is_none());
    }
}
