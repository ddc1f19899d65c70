// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nested-provenance trees: a root source plus the sub-repositories mounted
//! inside it.

use crate::provenance::KnownProvenance;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A rooted tree of provenance: a root [`KnownProvenance`] plus a map from
/// in-tree path to the [`KnownProvenance`] of each sub-repository mounted
/// there.
///
/// Invariants, enforced by [`NestedProvenance::new`]:
/// - `""` (the root path) is never a key in `sub_repositories`.
/// - All keys are distinct (guaranteed by the `BTreeMap` itself).
/// - Every path is in normal form: no `./` segment, no trailing `/`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NestedProvenance {
    /// The provenance of the tree's root.
    pub root: KnownProvenance,
    /// Sub-repositories mounted inside the root, keyed by in-tree path.
    pub sub_repositories: BTreeMap<String, KnownProvenance>,
}

/// A path failed the normal-form / non-root invariant checked by
/// [`NestedProvenance::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NestedProvenanceError {
    /// The reserved root path `""` was used as a sub-repository key.
    #[error("\"\" is reserved for the tree root and cannot be used as a sub-repository path")]
    RootPathReused,
    /// A path was not in normal form (contained `./` or a trailing `/`).
    #[error("path {0:?} is not in normal form")]
    NotNormalForm(String),
}

impl NestedProvenance {
    /// Build a tree, validating every sub-repository path.
    pub fn new(
        root: KnownProvenance,
        sub_repositories: BTreeMap<String, KnownProvenance>,
    ) -> Result<Self, NestedProvenanceError> {
        for path in sub_repositories.keys() {
            if path.is_empty() {
                return Err(NestedProvenanceError::RootPathReused);
            }
            if !is_normal_form(path) {
                return Err(NestedProvenanceError::NotNormalForm(path.clone()));
            }
        }
        Ok(Self {
            root,
            sub_repositories,
        })
    }

    /// A tree with no sub-repositories.
    #[must_use]
    pub fn trivial(root: KnownProvenance) -> Self {
        Self {
            root,
            sub_repositories: BTreeMap::new(),
        }
    }

    /// Iterate over every provenance in the tree: the root first, then each
    /// sub-repository in path order.
    pub fn all_provenances(&self) -> impl Iterator<Item = &KnownProvenance> {
        std::iter::once(&self.root).chain(self.sub_repositories.values())
    }

    /// Path-prefix pairs used by the result splitter, sorted by descending
    /// prefix length so the longest (most specific) match is tried first.
    ///
    /// Always includes `("", root)`.
    #[must_use]
    pub fn prefix_pairs(&self) -> Vec<(&str, &KnownProvenance)> {
        let mut pairs: Vec<(&str, &KnownProvenance)> = std::iter::once(("", &self.root))
            .chain(self.sub_repositories.iter().map(|(p, kp)| (p.as_str(), kp)))
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        pairs
    }
}

fn is_normal_form(path: &str) -> bool {
    if path.is_empty() || path.ends_with('/') {
        return false;
    }
    !path.split('/').any(|seg| seg.is_empty() || seg == ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(tag: &str) -> KnownProvenance {
        KnownProvenance::Artifact {
            url: format!("https://example.com/{tag}.tar.gz"),
            hash: None,
        }
    }

    #[test]
    fn trivial_tree_has_only_root() {
        let t = NestedProvenance::trivial(art("root"));
        assert_eq!(t.all_provenances().count(), 1);
        assert_eq!(t.prefix_pairs(), vec![("", &t.root)]);
    }

    #[test]
    fn rejects_root_path_as_subrepo_key() {
        let mut subs = BTreeMap::new();
        subs.insert(String::new(), art("sub"));
        let err = NestedProvenance::new(art("root"), subs).unwrap_err();
        assert_eq!(err, NestedProvenanceError::RootPathReused);
    }

    #[test]
    fn rejects_trailing_slash() {
        let mut subs = BTreeMap::new();
        subs.insert("vendor/".to_string(), art("sub"));
        let err = NestedProvenance::new(art("root"), subs).unwrap_err();
        assert!(matches!(err, NestedProvenanceError::NotNormalForm(_)));
    }

    #[test]
    fn rejects_dot_segment() {
        let mut subs = BTreeMap::new();
        subs.insert("vendor/./lib".to_string(), art("sub"));
        let err = NestedProvenance::new(art("root"), subs).unwrap_err();
        assert!(matches!(err, NestedProvenanceError::NotNormalForm(_)));
    }

    #[test]
    fn accepts_well_formed_tree() {
        let mut subs = BTreeMap::new();
        subs.insert("vendor/lib".to_string(), art("sub1"));
        subs.insert("third_party".to_string(), art("sub2"));
        let tree = NestedProvenance::new(art("root"), subs).unwrap();
        assert_eq!(tree.all_provenances().count(), 3);
    }

    #[test]
    fn prefix_pairs_sorted_longest_first() {
        let mut subs = BTreeMap::new();
        subs.insert("a".to_string(), art("a"));
        subs.insert("a/b/c".to_string(), art("abc"));
        subs.insert("a/b".to_string(), art("ab"));
        let tree = NestedProvenance::new(art("root"), subs).unwrap();
        let pairs = tree.prefix_pairs();
        let lengths: Vec<usize> = pairs.iter().map(|(p, _)| p.len()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
        assert_eq!(pairs.last().unwrap().0, "");
    }
}
