//! Document Store Collaborator
//!
//! The conflict injector never owns documents. Everything it does goes
//! through `DocumentStore`:
//! - `create` - new document, store assigns generation 1
//! - `update` - ordinary single-parent edit
//! - `get` - winning revision, optionally with conflicts and ancestry
//! - `bulk_write` - non-interactive write that places each document at the
//!   position its declared ancestor chain names
//! - `bulk_update` - interactive bulk edit, each document obeys the same
//!   single-parent rule as `update`
//!
//! Whether a store honours declared ancestry is an explicit capability, not
//! an assumption. See `StoreCapabilities`.
//!
//! Implementations:
//! - `MemoryDocumentStore` - deterministic in-process revision trees
//! - `CouchDocumentStore` - CouchDB-compatible HTTP API

mod couch;
mod errors;
mod memory;

pub use couch::{CouchConfig, CouchDocumentStore};
pub use errors::{StoreError, StoreResult};
pub use memory::{MemoryDocumentStore, StoreOp};

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::revision::{RevisionChain, RevisionId};

/// Document body: a JSON object without store metadata fields.
pub type Body = Map<String, Value>;

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// What a store is willing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// `bulk_write` inserts at the declared position without checking
    /// that the declared ancestors exist.
    pub trusts_declared_ancestry: bool,
}

/// Read options for `DocumentStore::get`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Report non-winning leaves
    pub conflicts: bool,
    /// Report the winner's ancestry
    pub revs: bool,
}

impl GetOptions {
    /// Conflicts and ancestry both enabled.
    pub fn with_conflicts() -> Self {
        Self {
            conflicts: true,
            revs: true,
        }
    }
}

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Winning revision
    pub revision: RevisionId,
    pub body: Body,
    /// Non-winning leaves, only filled when requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<RevisionId>,
    /// Ancestry of the winning revision, only filled when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<RevisionChain>,
}

impl Document {
    /// Winner followed by every conflicting leaf.
    pub fn leaves(&self) -> Vec<RevisionId> {
        std::iter::once(self.revision.clone())
            .chain(self.conflicts.iter().cloned())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        1 + self.conflicts.len()
    }
}

/// One document in a non-interactive bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedUpdate {
    pub id: String,
    /// Revision the document claims to be (`_rev`)
    pub declared_revision: RevisionId,
    /// Ancestor chain the document claims (`_revisions`)
    pub ancestry: RevisionChain,
    pub body: Body,
}

impl ForcedUpdate {
    /// Wire form: body fields plus `_id`, `_rev` and `_revisions`.
    pub fn to_json(&self) -> Value {
        let mut doc = self.body.clone();
        doc.insert("_id".to_string(), Value::String(self.id.clone()));
        doc.insert(
            "_rev".to_string(),
            Value::String(self.declared_revision.to_string()),
        );
        doc.insert(
            "_revisions".to_string(),
            serde_json::json!({
                "start": self.ancestry.start,
                "ids": self.ancestry.ids,
            }),
        );
        Value::Object(doc)
    }
}

/// One document in an interactive bulk edit.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveUpdate {
    pub id: String,
    /// Leaf the edit builds on (`_rev`)
    pub base_revision: RevisionId,
    pub body: Body,
}

impl InteractiveUpdate {
    pub fn new(id: impl Into<String>, base_revision: RevisionId, body: Body) -> Self {
        Self {
            id: id.into(),
            base_revision,
            body,
        }
    }

    /// Wire form: body fields plus `_id` and `_rev`.
    pub fn to_json(&self) -> Value {
        let mut doc = self.body.clone();
        doc.insert("_id".to_string(), Value::String(self.id.clone()));
        doc.insert(
            "_rev".to_string(),
            Value::String(self.base_revision.to_string()),
        );
        Value::Object(doc)
    }
}

/// Why a single document in a bulk write was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Store refused the document
    WriteRejected,
    /// Declared chain is structurally invalid
    MalformedChain,
    /// Declared chain starts below the document's current generation
    StaleGeneration,
    /// Store reported an edit conflict
    Conflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::WriteRejected => "write_rejected",
            ErrorKind::MalformedChain => "malformed_chain",
            ErrorKind::StaleGeneration => "stale_generation",
            ErrorKind::Conflict => "conflict",
        }
    }
}

/// Per-document outcome of a bulk write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
    /// Revision the document now has at the declared position
    pub revision: Option<RevisionId>,
    pub accepted: bool,
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Accepted, but the revision was already present.
    #[serde(default)]
    pub noop: bool,
}

impl WriteResult {
    pub fn accepted(id: impl Into<String>, revision: RevisionId, noop: bool) -> Self {
        Self {
            id: id.into(),
            revision: Some(revision),
            accepted: true,
            error: None,
            reason: None,
            noop,
        }
    }

    pub fn rejected(id: impl Into<String>, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            accepted: false,
            error: Some(kind),
            reason: Some(reason.into()),
            noop: false,
        }
    }
}

/// Document store operations consumed by the conflict injector.
pub trait DocumentStore: Send + Sync {
    /// What this store supports.
    fn capabilities(&self) -> StoreCapabilities;

    /// Creates a document. The store picks an id when `id` is `None`.
    fn create(&self, id: Option<String>, body: Body) -> StoreFuture<'_, Document>;

    /// Ordinary edit: `rev` must be a current leaf.
    fn update<'a>(
        &'a self,
        id: &'a str,
        rev: &'a RevisionId,
        body: Body,
    ) -> StoreFuture<'a, Document>;

    /// Reads the winning revision.
    fn get<'a>(&'a self, id: &'a str, options: GetOptions) -> StoreFuture<'a, Document>;

    /// Non-interactive bulk write. One result per update, in order.
    fn bulk_write(&self, updates: Vec<ForcedUpdate>) -> StoreFuture<'_, Vec<WriteResult>>;

    /// Interactive bulk edit, applied in order. An update whose base is no
    /// longer a current leaf is rejected with `ErrorKind::Conflict` and
    /// adds nothing to the tree. One result per update, in order.
    fn bulk_update(&self, updates: Vec<InteractiveUpdate>) -> StoreFuture<'_, Vec<WriteResult>>;
}
