//! Revision Domain Types
//!
//! Vocabulary for a document store's MVCC history:
//! - `RevisionId` - generation + opaque hash, serialized `<generation>-<hash>`
//! - `RevisionChain` - declared ancestor path, newest-first (`_revisions`)
//! - `RevisionTree` - merged history with leaf/winner/conflict queries
//!
//! Hash tokens are never recomputed or validated against any algorithm;
//! only their character set is checked.

mod chain;
mod errors;
mod id;
mod tree;

pub use chain::RevisionChain;
pub use errors::{RevisionError, RevisionResult};
pub use id::{is_valid_token, RevisionId};
pub use tree::{winning_revision, MergeOutcome, RevisionTree};
