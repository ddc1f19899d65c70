// SPDX-License-Identifier: MIT OR Apache-2.0
//! Package-provenance resolution (spec step 1) and nested-provenance
//! resolution (spec step 2).

use async_trait::async_trait;
use scanopt_core::{KnownProvenance, NestedProvenance, OriginKind, Package, Provenance, VcsKind};
use scanopt_error::{ErrorCode, ScanOptError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves a [`Package`] to a [`Provenance`] by walking a priority-ordered
/// list of origin kinds.
#[async_trait]
pub trait PackageProvenanceResolver: Send + Sync {
    /// Resolve `pkg` to its provenance. Always succeeds unless an injected
    /// validator rejects the candidate.
    async fn resolve(&self, pkg: &Package) -> Result<Provenance, ScanOptError>;
}

/// Default [`PackageProvenanceResolver`]: the first origin kind in priority
/// order whose corresponding descriptor is present on the package wins.
///
/// A resolver with no validator treats the declared revision as already
/// immutable — `resolved_revision` is always populated, per the contract,
/// just equal to `requested_revision` until a validator says otherwise.
pub struct PriorityPackageResolver {
    priority: Vec<OriginKind>,
    validator: Option<Arc<dyn Fn(Provenance) -> Result<Provenance, ScanOptError> + Send + Sync>>,
}

impl PriorityPackageResolver {
    /// Build a resolver that consults `priority` in order.
    #[must_use]
    pub fn new(priority: Vec<OriginKind>) -> Self {
        Self {
            priority,
            validator: None,
        }
    }

    /// Inject a validation hook run on the candidate provenance before it is
    /// returned — e.g. to HEAD-probe an artifact URL or resolve a VCS
    /// revision to an immutable commit.
    #[must_use]
    pub fn with_validator(
        mut self,
        validator: impl Fn(Provenance) -> Result<Provenance, ScanOptError> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl Default for PriorityPackageResolver {
    /// Defaults to `[Vcs, Artifact]`, matching `scanopt-config`'s default
    /// `source_code_origins`.
    fn default() -> Self {
        Self::new(vec![OriginKind::Vcs, OriginKind::Artifact])
    }
}

#[async_trait]
impl PackageProvenanceResolver for PriorityPackageResolver {
    async fn resolve(&self, pkg: &Package) -> Result<Provenance, ScanOptError> {
        let mut candidate = Provenance::Unknown;
        for kind in &self.priority {
            match kind {
                OriginKind::Artifact => {
                    if let Some(artifact) = &pkg.artifact {
                        candidate = Provenance::Artifact {
                            url: artifact.url.clone(),
                            hash: artifact.hash.clone(),
                        };
                        break;
                    }
                }
                OriginKind::Vcs => {
                    if let Some(vcs) = &pkg.vcs {
                        candidate = Provenance::Repository {
                            vcs: vcs.vcs,
                            url: vcs.url.clone(),
                            requested_revision: vcs.requested_revision.clone(),
                            resolved_revision: Some(vcs.requested_revision.clone()),
                            path: vcs.path.clone(),
                        };
                        break;
                    }
                }
            }
        }
        match &self.validator {
            Some(validator) => validator(candidate),
            None => Ok(candidate),
        }
    }
}

/// A declared sub-repository of a [`scanopt_core::provenance::Provenance::Repository`],
/// as enumerated by a [`NestedProvenanceResolver`].
#[derive(Debug, Clone)]
pub struct SubmoduleDeclaration {
    /// In-tree path the sub-repository is mounted at.
    pub path: String,
    /// Version-control system kind of the sub-repository.
    pub vcs: VcsKind,
    /// Sub-repository URL.
    pub url: String,
    /// Revision requested for the sub-repository as of the parent's checkout.
    pub requested_revision: String,
}

/// Resolves a [`KnownProvenance`] to a [`NestedProvenance`] by enumerating
/// declared sub-repositories.
#[async_trait]
pub trait NestedProvenanceResolver: Send + Sync {
    /// Resolve `known` to its nested tree. Idempotent and pure over the pair
    /// (provenance, sub-module declarations as of that revision).
    async fn resolve(&self, known: &KnownProvenance) -> Result<NestedProvenance, ScanOptError>;
}

/// A [`NestedProvenanceResolver`] that never finds sub-repositories.
///
/// Correct for [`KnownProvenance::Artifact`] and for any [`KnownProvenance::Repository`]
/// with no declared sub-modules — the common case in the absence of an
/// actual VCS integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialNestedProvenanceResolver;

#[async_trait]
impl NestedProvenanceResolver for TrivialNestedProvenanceResolver {
    async fn resolve(&self, known: &KnownProvenance) -> Result<NestedProvenance, ScanOptError> {
        Ok(NestedProvenance::trivial(known.clone()))
    }
}

/// A [`NestedProvenanceResolver`] test double returning pre-declared
/// sub-modules for specific root provenances, keyed by canonical key.
///
/// Treats each declared revision as already resolved — this is a fixture,
/// not a real VCS integration.
#[derive(Debug, Clone, Default)]
pub struct StaticNestedProvenanceResolver {
    declarations: BTreeMap<String, Vec<SubmoduleDeclaration>>,
}

impl StaticNestedProvenanceResolver {
    /// An empty resolver — behaves like [`TrivialNestedProvenanceResolver`]
    /// until submodules are declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `submodules` for the tree rooted at `root`.
    #[must_use]
    pub fn declare(mut self, root: &KnownProvenance, submodules: Vec<SubmoduleDeclaration>) -> Self {
        self.declarations.insert(root.canonical_key(), submodules);
        self
    }
}

#[async_trait]
impl NestedProvenanceResolver for StaticNestedProvenanceResolver {
    async fn resolve(&self, known: &KnownProvenance) -> Result<NestedProvenance, ScanOptError> {
        let Some(declared) = self.declarations.get(&known.canonical_key()) else {
            return Ok(NestedProvenance::trivial(known.clone()));
        };
        let mut subs = BTreeMap::new();
        for decl in declared {
            let sub = KnownProvenance::Repository {
                vcs: decl.vcs,
                url: decl.url.clone(),
                requested_revision: decl.requested_revision.clone(),
                resolved_revision: decl.requested_revision.clone(),
                path: decl.path.clone(),
            };
            subs.insert(decl.path.clone(), sub);
        }
        NestedProvenance::new(known.clone(), subs).map_err(|err| {
            ScanOptError::new(ErrorCode::ResolutionNestedTreeFailed, err.to_string())
                .with_context("root", known.canonical_key())
        })
    }
}
