//! Revision Error Types
//!
//! Parsing and shape errors are local and never recoverable by retrying:
//! the input itself is wrong.

use thiserror::Error;

/// Result type for revision operations
pub type RevisionResult<T> = Result<T, RevisionError>;

/// Revision identifier and ancestor chain errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    /// Serialized revision does not match `<generation>-<hash>`
    #[error("Malformed revision '{0}'")]
    MalformedRevision(String),

    /// Ancestor chain violates its structural invariants
    #[error("Malformed revision chain: {0}")]
    MalformedChain(String),
}

impl RevisionError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            RevisionError::MalformedRevision(_) => "REVFORGE_MALFORMED_REVISION",
            RevisionError::MalformedChain(_) => "REVFORGE_MALFORMED_CHAIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RevisionError::MalformedRevision("x".into()).code(),
            "REVFORGE_MALFORMED_REVISION"
        );
        assert_eq!(
            RevisionError::MalformedChain("x".into()).code(),
            "REVFORGE_MALFORMED_CHAIN"
        );
    }

    #[test]
    fn test_display_includes_input() {
        let err = RevisionError::MalformedRevision("abc".into());
        assert!(err.to_string().contains("abc"));
    }
}
