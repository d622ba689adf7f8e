//! Document Store Error Types
//!
//! Errors raised at the store boundary. Per-document bulk outcomes are NOT
//! errors; they are reported through `WriteResult`. A `StoreError` means the
//! whole call failed.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport-level failure (connection, timeout, store offline)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Ordinary edit against a revision that is not a current leaf
    #[error("Document update conflict: {0}")]
    Conflict(String),

    /// Store refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Store answered with something this client cannot interpret
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "REVFORGE_STORE_UNAVAILABLE",
            StoreError::NotFound(_) => "REVFORGE_STORE_NOT_FOUND",
            StoreError::Conflict(_) => "REVFORGE_STORE_CONFLICT",
            StoreError::Rejected(_) => "REVFORGE_STORE_REJECTED",
            StoreError::Protocol(_) => "REVFORGE_STORE_PROTOCOL",
        }
    }

    /// True for transport failures, which abort a whole scenario.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transport() {
        assert!(StoreError::Unavailable("down".into()).is_unavailable());
        assert!(!StoreError::NotFound("x".into()).is_unavailable());
        assert!(!StoreError::Conflict("x".into()).is_unavailable());
        assert!(!StoreError::Rejected("x".into()).is_unavailable());
        assert!(!StoreError::Protocol("x".into()).is_unavailable());
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            StoreError::Unavailable(String::new()).code(),
            StoreError::NotFound(String::new()).code(),
            StoreError::Conflict(String::new()).code(),
            StoreError::Rejected(String::new()).code(),
            StoreError::Protocol(String::new()).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
