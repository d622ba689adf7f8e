//! RevisionId - generation number plus opaque hash token
//!
//! Serialized form is `<generation>-<hash>`. The hash is never interpreted:
//! it is whatever the store assigned, restricted to ASCII alphanumerics.
//!
//! Ordering is `(generation, hash)`, which is also the order the store uses
//! to pick a winning leaf.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{RevisionError, RevisionResult};

fn revision_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([1-9][0-9]*)-([A-Za-z0-9]+)$").expect("revision pattern is valid")
    })
}

/// Returns true if `token` is usable as a revision hash.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// A single node identity in a document's revision tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId {
    generation: u64,
    hash: String,
}

impl RevisionId {
    /// Creates a revision id, validating both components.
    pub fn new(generation: u64, hash: impl Into<String>) -> RevisionResult<Self> {
        let hash = hash.into();
        if generation == 0 || !is_valid_token(&hash) {
            return Err(RevisionError::MalformedRevision(format!(
                "{}-{}",
                generation, hash
            )));
        }
        Ok(Self { generation, hash })
    }

    /// Parses `<generation>-<hash>`.
    pub fn parse(serialized: &str) -> RevisionResult<Self> {
        let caps = revision_pattern()
            .captures(serialized)
            .ok_or_else(|| RevisionError::MalformedRevision(serialized.to_string()))?;

        let generation = caps[1]
            .parse::<u64>()
            .map_err(|_| RevisionError::MalformedRevision(serialized.to_string()))?;

        Ok(Self {
            generation,
            hash: caps[2].to_string(),
        })
    }

    /// Serialized form. Inverse of [`RevisionId::parse`].
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// The revision one generation above this one, carrying `hash`.
    ///
    /// Fails when the generation is already `u64::MAX`.
    pub fn next(&self, hash: impl Into<String>) -> RevisionResult<RevisionId> {
        let generation = self.generation.checked_add(1).ok_or_else(|| {
            RevisionError::MalformedRevision(format!("{} has no next generation", self))
        })?;
        Ok(RevisionId {
            generation,
            hash: hash.into(),
        })
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl FromStr for RevisionId {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RevisionId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let rev = RevisionId::parse("3-917fa2381192822767f010b95b45325b").unwrap();
        assert_eq!(rev.generation(), 3);
        assert_eq!(rev.hash(), "917fa2381192822767f010b95b45325b");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "abc", "-abc", "1-", "0-abc", "01-abc", "1-ab-c", "x-abc", "1-ab c", " 1-abc"] {
            let err = RevisionId::parse(bad).unwrap_err();
            assert!(
                matches!(err, RevisionError::MalformedRevision(_)),
                "expected rejection of {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_format_roundtrip() {
        let s = "12-deadbeef";
        assert_eq!(RevisionId::parse(s).unwrap().format(), s);
    }

    #[test]
    fn test_next_increments_generation() {
        let rev = RevisionId::parse("1-aaa").unwrap();
        let next = rev.next("bbb").unwrap();
        assert_eq!(next.generation(), 2);
        assert_eq!(next.hash(), "bbb");
        // original untouched
        assert_eq!(rev.generation(), 1);
    }

    #[test]
    fn test_next_at_max_generation_fails() {
        let rev = RevisionId::new(u64::MAX, "aaa").unwrap();
        assert!(matches!(
            rev.next("bbb"),
            Err(RevisionError::MalformedRevision(_))
        ));
    }

    #[test]
    fn test_new_validates() {
        assert!(RevisionId::new(0, "abc").is_err());
        assert!(RevisionId::new(1, "").is_err());
        assert!(RevisionId::new(1, "a-b").is_err());
        assert!(RevisionId::new(1, "abc").is_ok());
    }

    #[test]
    fn test_ordering_generation_then_hash() {
        let a = RevisionId::parse("2-aaa").unwrap();
        let b = RevisionId::parse("2-bbb").unwrap();
        let c = RevisionId::parse("3-000").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_serde_as_string() {
        let rev = RevisionId::parse("4-cafe").unwrap();
        let json = serde_json::to_string(&rev).unwrap();
        assert_eq!(json, "\"4-cafe\"");

        let back: RevisionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rev);

        assert!(serde_json::from_str::<RevisionId>("\"nope\"").is_err());
    }
}
