//! Conflict Injection Error Types
//!
//! Propagation policy:
//! - Construction errors (`MalformedRevision`, `ChainConstruction`) abort
//!   only the affected chain or branch
//! - Per-document write rejections are NOT errors; they are reported in
//!   `WriteResult`
//! - Orchestration errors (`StoreUnavailable`, `AncestryNotTrusted`,
//!   `Cancelled`, ...) abort the whole scenario
//!
//! Nothing here is retried internally.

use thiserror::Error;

use crate::revision::RevisionError;
use crate::store::StoreError;

/// Result type for conflict injection operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Conflict injection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    /// Revision string or chain could not be parsed
    #[error(transparent)]
    MalformedRevision(#[from] RevisionError),

    /// Decoy creation failed; no chain was produced
    #[error("Chain construction failed at step {step}: {reason}")]
    ChainConstruction { step: u64, reason: String },

    /// Store refused a forced write
    #[error("Forced write for {id} rejected: {reason}")]
    WriteRejected { id: String, reason: String },

    /// Transport-level failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store answered, but not successfully
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Store does not honour declared ancestor chains
    #[error("Store does not accept declared ancestry; forced writes are impossible")]
    AncestryNotTrusted,

    /// Every branch failed before divergence could be observed
    #[error("No branch was accepted")]
    NoBranchAccepted,

    /// Observed leaf set differs from the expected one
    #[error("Expected {expected} leaves, observed {observed}")]
    UnexpectedLeafSet { expected: usize, observed: usize },

    /// Run was cancelled before every branch was issued
    #[error("Simulation cancelled")]
    Cancelled,

    /// State machine misuse
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl From<StoreError> for ForgeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => ForgeError::StoreUnavailable(msg),
            other => ForgeError::Store(other),
        }
    }
}

impl ForgeError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            ForgeError::MalformedRevision(e) => e.code(),
            ForgeError::ChainConstruction { .. } => "REVFORGE_CHAIN_CONSTRUCTION",
            ForgeError::WriteRejected { .. } => "REVFORGE_WRITE_REJECTED",
            ForgeError::StoreUnavailable(_) => "REVFORGE_STORE_UNAVAILABLE",
            ForgeError::Store(e) => e.code(),
            ForgeError::AncestryNotTrusted => "REVFORGE_ANCESTRY_NOT_TRUSTED",
            ForgeError::NoBranchAccepted => "REVFORGE_NO_BRANCH_ACCEPTED",
            ForgeError::UnexpectedLeafSet { .. } => "REVFORGE_UNEXPECTED_LEAF_SET",
            ForgeError::Cancelled => "REVFORGE_CANCELLED",
            ForgeError::IllegalTransition { .. } => "REVFORGE_ILLEGAL_TRANSITION",
        }
    }

    /// True if this error ends the whole scenario rather than one branch.
    pub fn aborts_scenario(&self) -> bool {
        matches!(
            self,
            ForgeError::StoreUnavailable(_)
                | ForgeError::AncestryNotTrusted
                | ForgeError::Cancelled
                | ForgeError::IllegalTransition { .. }
        )
    }
}
