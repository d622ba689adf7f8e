//! RevisionChain - a declared ancestor path, newest-first
//!
//! Wire shape matches the store's `_revisions` field:
//!
//! ```json
//! { "start": 4, "ids": ["cc", "bb", "aa"] }
//! ```
//!
//! `ids[i]` sits at generation `start - i`, so the example above declares
//! `4-cc → 3-bb → 2-aa` with `4-cc` as the leaf.

use serde::{Deserialize, Serialize};

use super::errors::{RevisionError, RevisionResult};
use super::id::{is_valid_token, RevisionId};

/// A newest-first ancestor path ending at a leaf revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionChain {
    /// Generation of the leaf entry `ids[0]`.
    pub start: u64,
    /// Hash tokens, newest first.
    pub ids: Vec<String>,
}

impl RevisionChain {
    /// Creates a chain without validating it.
    ///
    /// Use [`RevisionChain::validate`] before trusting the shape.
    pub fn new(start: u64, ids: Vec<String>) -> Self {
        Self { start, ids }
    }

    /// Number of declared entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks structural invariants.
    ///
    /// This never asks whether the ancestors exist anywhere; a chain is
    /// well-formed as long as every entry maps to a generation ≥ 1.
    pub fn validate(&self) -> RevisionResult<()> {
        if self.ids.is_empty() {
            return Err(RevisionError::MalformedChain("chain has no ids".into()));
        }
        if self.ids.len() as u64 > self.start {
            return Err(RevisionError::MalformedChain(format!(
                "{} ids cannot fit below start generation {}",
                self.ids.len(),
                self.start
            )));
        }
        if let Some(bad) = self.ids.iter().find(|t| !is_valid_token(t)) {
            return Err(RevisionError::MalformedChain(format!(
                "invalid hash token '{}'",
                bad
            )));
        }
        Ok(())
    }

    /// The leaf revision this chain asserts.
    pub fn leaf(&self) -> RevisionResult<RevisionId> {
        let hash = self
            .ids
            .first()
            .ok_or_else(|| RevisionError::MalformedChain("chain has no ids".into()))?;
        RevisionId::new(self.start, hash.clone())
    }

    /// The oldest declared entry.
    pub fn anchor(&self) -> RevisionResult<RevisionId> {
        let hash = self
            .ids
            .last()
            .ok_or_else(|| RevisionError::MalformedChain("chain has no ids".into()))?;
        let generation = self
            .start
            .checked_sub(self.ids.len() as u64 - 1)
            .filter(|g| *g >= 1)
            .ok_or_else(|| RevisionError::MalformedChain("chain underflows generation 1".into()))?;
        RevisionId::new(generation, hash.clone())
    }

    /// Every declared revision, newest first.
    pub fn revisions(&self) -> RevisionResult<Vec<RevisionId>> {
        self.validate()?;
        self.ids
            .iter()
            .enumerate()
            .map(|(i, hash)| RevisionId::new(self.start - i as u64, hash.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(start: u64, ids: &[&str]) -> RevisionChain {
        RevisionChain::new(start, ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_leaf_and_anchor() {
        let c = chain(4, &["cc", "bb", "aa"]);
        assert_eq!(c.leaf().unwrap().to_string(), "4-cc");
        assert_eq!(c.anchor().unwrap().to_string(), "2-aa");
    }

    #[test]
    fn test_anchor_at_max_start() {
        let c = chain(u64::MAX, &["b", "a"]);
        assert_eq!(c.anchor().unwrap(), RevisionId::new(u64::MAX - 1, "a").unwrap());
    }

    #[test]
    fn test_revisions_newest_first() {
        let c = chain(3, &["c", "b", "a"]);
        let revs: Vec<String> = c.revisions().unwrap().iter().map(|r| r.to_string()).collect();
        assert_eq!(revs, vec!["3-c", "2-b", "1-a"]);
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            chain(1, &[]).validate(),
            Err(RevisionError::MalformedChain(_))
        ));
    }

    #[test]
    fn test_validate_rejects_too_long() {
        assert!(chain(2, &["c", "b", "a"]).validate().is_err());
        assert!(chain(3, &["c", "b", "a"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_token() {
        assert!(chain(2, &["ok", "not ok"]).validate().is_err());
    }

    #[test]
    fn test_wire_shape() {
        let c = chain(4, &["cc", "bb"]);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!({"start": 4, "ids": ["cc", "bb"]}));
    }
}
