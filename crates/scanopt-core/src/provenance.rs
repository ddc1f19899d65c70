// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source provenance: where a package's source tree actually came from.
//!
//! [`Provenance`] is the tagged variant produced by package-provenance
//! resolution (see the orchestrator's first pipeline stage). Its
//! [`KnownProvenance`] subset — everything except [`Provenance::Unknown`] —
//! is what flows through nested-provenance resolution, scanning, and
//! storage; equality and hashing on it are defined structurally so that two
//! packages that happen to share the same resolved source are recognised as
//! the same cache key.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Kind of version-control system backing a [`Provenance::Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VcsKind {
    /// Git.
    Git,
    /// Mercurial.
    Mercurial,
    /// Subversion.
    Subversion,
    /// CVS.
    Cvs,
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Git => "git",
            Self::Mercurial => "hg",
            Self::Subversion => "svn",
            Self::Cvs => "cvs",
        };
        f.write_str(s)
    }
}

/// Where a source tree came from.
///
/// Tagged variant with three cases. [`Provenance::Artifact`] and
/// [`Provenance::Repository`] together form the [`KnownProvenance`] subset;
/// [`Provenance::Unknown`] means resolution could not determine an origin.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// A remote source archive identified by URL and an optional content hash.
    Artifact {
        /// Location of the archive.
        url: String,
        /// Optional content hash (e.g. `sha256:...`) used for integrity checks.
        hash: Option<String>,
    },
    /// A version-control location.
    Repository {
        /// Version-control system kind.
        vcs: VcsKind,
        /// Repository URL.
        url: String,
        /// The revision as originally requested (branch, tag, or ref).
        requested_revision: String,
        /// The concrete immutable revision `requested_revision` pointed to at
        /// resolution time. Populated only once resolution has run.
        resolved_revision: Option<String>,
        /// In-repo path, relative to the repository root (`""` for the root).
        path: String,
    },
    /// No source location could be determined.
    Unknown,
}

impl Provenance {
    /// Returns the [`KnownProvenance`] subset, or `None` for [`Provenance::Unknown`].
    #[must_use]
    pub fn known(&self) -> Option<KnownProvenance> {
        match self {
            Self::Artifact { url, hash } => Some(KnownProvenance::Artifact {
                url: url.clone(),
                hash: hash.clone(),
            }),
            Self::Repository {
                vcs,
                url,
                requested_revision,
                resolved_revision,
                path,
            } => resolved_revision.as_ref().map(|resolved| KnownProvenance::Repository {
                vcs: *vcs,
                url: url.clone(),
                requested_revision: requested_revision.clone(),
                resolved_revision: resolved.clone(),
                path: path.clone(),
            }),
            Self::Unknown => None,
        }
    }

    /// Returns `true` for [`Provenance::Unknown`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<KnownProvenance> for Provenance {
    fn from(known: KnownProvenance) -> Self {
        match known {
            KnownProvenance::Artifact { url, hash } => Self::Artifact { url, hash },
            KnownProvenance::Repository {
                vcs,
                url,
                requested_revision,
                resolved_revision,
                path,
            } => Self::Repository {
                vcs,
                url,
                requested_revision,
                resolved_revision: Some(resolved_revision),
                path,
            },
        }
    }
}

/// The resolved subset of [`Provenance`]: either [`Artifact`](Self::Artifact)
/// or [`Repository`](Self::Repository).
///
/// Equality, hashing, and ordering are structural but deliberately ignore
/// [`Repository::requested_revision`]: two repository provenances that
/// resolve to the same immutable revision are the same cache key regardless
/// of which branch or tag was originally requested. This is what makes
/// caching sound — the orchestrator never compares requested revisions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnownProvenance {
    /// A remote source archive.
    Artifact {
        /// Location of the archive.
        url: String,
        /// Optional content hash.
        hash: Option<String>,
    },
    /// A version-control location, resolved to an immutable revision.
    Repository {
        /// Version-control system kind.
        vcs: VcsKind,
        /// Repository URL.
        url: String,
        /// The revision as originally requested. Carried for diagnostics only
        /// and excluded from equality/hashing/ordering.
        requested_revision: String,
        /// The concrete immutable revision.
        resolved_revision: String,
        /// In-repo path, relative to the repository root (`""` for the root).
        path: String,
    },
}

impl KnownProvenance {
    /// The canonical string key used to index storage and dedup state.
    ///
    /// Forms:
    /// - `artifact:<url>|<hash-or-empty>`
    /// - `vcs:<kind>|<url>|<resolved-revision>|<path>`
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self {
            Self::Artifact { url, hash } => {
                format!("artifact:{url}|{}", hash.as_deref().unwrap_or(""))
            }
            Self::Repository {
                vcs,
                url,
                resolved_revision,
                path,
                ..
            } => format!("vcs:{vcs}|{url}|{resolved_revision}|{path}"),
        }
    }

    /// Returns the in-repo path for a repository provenance, or `""` for an
    /// artifact (artifacts have no internal mount path of their own).
    #[must_use]
    pub fn mount_path(&self) -> &str {
        match self {
            Self::Artifact { .. } => "",
            Self::Repository { path, .. } => path,
        }
    }
}

impl PartialEq for KnownProvenance {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for KnownProvenance {}

impl Hash for KnownProvenance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl PartialOrd for KnownProvenance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KnownProvenance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_key().cmp(&other.canonical_key())
    }
}
