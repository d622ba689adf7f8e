//! RevisionTree - a document's full revision history
//!
//! Nodes are keyed by `(generation, hash)` and point at a parent exactly one
//! generation below. Declared chains are merged as-is: an oldest entry that
//! is not already present becomes a new root, so a chain never has to prove
//! its ancestry to be accepted.
//!
//! Winner rule: the leaf with the highest generation wins, ties going to the
//! lexically greatest hash. Every other leaf is a conflict.

use std::collections::{BTreeMap, BTreeSet};

use super::chain::RevisionChain;
use super::errors::{RevisionError, RevisionResult};
use super::id::RevisionId;

/// Result of merging a declared chain into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The leaf was new; the tree grew.
    Inserted,
    /// The leaf was already in the tree; nothing changed.
    AlreadyPresent,
}

/// Picks the winning revision among `leaves`.
pub fn winning_revision(leaves: &[RevisionId]) -> Option<&RevisionId> {
    leaves.iter().max()
}

/// Revision tree for one document.
#[derive(Debug, Clone, Default)]
pub struct RevisionTree {
    /// child -> parent
    nodes: BTreeMap<RevisionId, Option<RevisionId>>,
}

impl RevisionTree {
    /// Creates a tree holding a single root revision.
    pub fn with_root(root: RevisionId) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(root, None);
        Self { nodes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, rev: &RevisionId) -> bool {
        self.nodes.contains_key(rev)
    }

    /// Adds `child` directly under `parent`.
    ///
    /// This is the ordinary edit path, so `parent` must be a leaf and
    /// `child` must sit one generation above it.
    pub fn extend_leaf(&mut self, parent: &RevisionId, child: RevisionId) -> RevisionResult<()> {
        if !self.is_leaf(parent) {
            return Err(RevisionError::MalformedChain(format!(
                "{} is not a leaf",
                parent
            )));
        }
        if child.generation() != parent.generation() + 1 {
            return Err(RevisionError::MalformedChain(format!(
                "{} does not follow {}",
                child, parent
            )));
        }
        self.nodes.insert(child, Some(parent.clone()));
        Ok(())
    }

    /// Merges a declared ancestor path, oldest entry first.
    ///
    /// A node already linked to a parent keeps it. A node recorded as a
    /// root because its ancestry was unknown is linked to the parent this
    /// chain declares for it.
    pub fn merge_chain(&mut self, chain: &RevisionChain) -> RevisionResult<MergeOutcome> {
        let path = chain.revisions()?;
        let present = self.contains(&path[0]);

        let mut parent: Option<RevisionId> = None;
        for rev in path.into_iter().rev() {
            let recorded = self.nodes.entry(rev.clone()).or_insert(None);
            if recorded.is_none() {
                *recorded = parent;
            }
            parent = Some(rev);
        }

        if present {
            Ok(MergeOutcome::AlreadyPresent)
        } else {
            Ok(MergeOutcome::Inserted)
        }
    }

    fn is_leaf(&self, rev: &RevisionId) -> bool {
        self.contains(rev) && !self.nodes.values().any(|p| p.as_ref() == Some(rev))
    }

    /// All leaves, winner first.
    pub fn leaves(&self) -> Vec<RevisionId> {
        let parents: BTreeSet<&RevisionId> = self.nodes.values().flatten().collect();
        self.nodes
            .keys()
            .rev()
            .filter(|rev| !parents.contains(rev))
            .cloned()
            .collect()
    }

    /// The winning leaf.
    pub fn winner(&self) -> Option<RevisionId> {
        winning_revision(&self.leaves()).cloned()
    }

    /// Every non-winning leaf, in descending order.
    pub fn conflicts(&self) -> Vec<RevisionId> {
        let mut leaves = self.leaves();
        if !leaves.is_empty() {
            leaves.remove(0);
        }
        leaves
    }

    /// Ancestry of `rev` back to its root, as a chain.
    pub fn ancestry(&self, rev: &RevisionId) -> Option<RevisionChain> {
        let mut ids = Vec::new();
        let mut cursor = Some(rev);
        while let Some(current) = cursor {
            let parent = self.nodes.get(current)?;
            ids.push(current.hash().to_string());
            cursor = parent.as_ref();
        }
        Some(RevisionChain::new(rev.generation(), ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(s: &str) -> RevisionId {
        RevisionId::parse(s).unwrap()
    }

    fn chain(start: u64, ids: &[&str]) -> RevisionChain {
        RevisionChain::new(start, ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_single_root_is_winner() {
        let tree = RevisionTree::with_root(rev("1-a"));
        assert_eq!(tree.winner(), Some(rev("1-a")));
        assert!(tree.conflicts().is_empty());
    }

    #[test]
    fn test_extend_leaf_linear() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        tree.extend_leaf(&rev("1-a"), rev("2-b")).unwrap();
        assert_eq!(tree.leaves(), vec![rev("2-b")]);

        // 1-a is no longer a leaf
        assert!(tree.extend_leaf(&rev("1-a"), rev("2-c")).is_err());
        // generation gap
        assert!(tree.extend_leaf(&rev("2-b"), rev("4-c")).is_err());
    }

    #[test]
    fn test_sibling_branches_conflict() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        assert_eq!(tree.merge_chain(&chain(2, &["x", "a"])).unwrap(), MergeOutcome::Inserted);
        assert_eq!(tree.merge_chain(&chain(2, &["y", "a"])).unwrap(), MergeOutcome::Inserted);

        assert_eq!(tree.leaves(), vec![rev("2-y"), rev("2-x")]);
        assert_eq!(tree.winner(), Some(rev("2-y")));
        assert_eq!(tree.conflicts(), vec![rev("2-x")]);
    }

    #[test]
    fn test_higher_generation_wins_over_hash() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        tree.merge_chain(&chain(2, &["zzz", "a"])).unwrap();
        tree.merge_chain(&chain(3, &["aaa", "m", "a"])).unwrap();
        assert_eq!(tree.winner(), Some(rev("3-aaa")));
        assert_eq!(tree.conflicts(), vec![rev("2-zzz")]);
    }

    #[test]
    fn test_merge_same_chain_is_noop() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        let c = chain(2, &["x", "a"]);
        tree.merge_chain(&c).unwrap();
        let size = tree.len();
        assert_eq!(tree.merge_chain(&c).unwrap(), MergeOutcome::AlreadyPresent);
        assert_eq!(tree.len(), size);
    }

    #[test]
    fn test_unknown_ancestry_becomes_new_root() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        tree.merge_chain(&chain(3, &["c", "b"])).unwrap();
        // 2-b was never linked to 1-a, so both 1-a and 3-c are leaves
        assert_eq!(tree.leaves(), vec![rev("3-c"), rev("1-a")]);
    }

    #[test]
    fn test_later_chain_links_orphan_root() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        tree.merge_chain(&chain(3, &["c"])).unwrap();
        assert_eq!(tree.leaves(), vec![rev("3-c"), rev("1-a")]);

        tree.merge_chain(&chain(4, &["d", "c", "b"])).unwrap();
        // 3-c now hangs under 2-b, so it is no longer a leaf
        assert_eq!(tree.leaves(), vec![rev("4-d"), rev("1-a")]);
        assert_eq!(tree.ancestry(&rev("4-d")).unwrap(), chain(4, &["d", "c", "b"]));
    }

    #[test]
    fn test_ancestry_walks_to_root() {
        let mut tree = RevisionTree::with_root(rev("1-a"));
        tree.merge_chain(&chain(3, &["c", "b", "a"])).unwrap();
        let path = tree.ancestry(&rev("3-c")).unwrap();
        assert_eq!(path, chain(3, &["c", "b", "a"]));
        assert!(tree.ancestry(&rev("9-z")).is_none());
    }

    #[test]
    fn test_winning_revision_empty() {
        assert!(winning_revision(&[]).is_none());
    }
}
