//! revforge - revision-tree conflict injection for MVCC document stores
//!
//! Forces sibling revisions into a document's revision tree so that
//! conflict detection, winner selection and resolution can be exercised
//! deterministically.

pub mod cli;
pub mod forge;
pub mod observability;
pub mod revision;
pub mod store;
