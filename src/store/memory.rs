//! In-memory document store
//!
//! Keeps one `RevisionTree` per document and applies the same rules a
//! CouchDB-style store applies:
//! - `create` assigns generation 1
//! - `update` only extends a current leaf
//! - `bulk_write` merges declared chains without checking ancestry, even
//!   when the chain sits below the current winner
//! - `bulk_update` applies interactive edits in order, so a second edit on
//!   the same base revision conflicts
//!
//! Hash tokens are the first 16 bytes of a SHA-256 over id, parent revision
//! and body, hex encoded. Ids are assigned sequentially. Both are
//! deterministic, so identical call sequences produce identical trees.
//!
//! Faults can be injected per operation to exercise failure paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::errors::{StoreError, StoreResult};
use super::{
    Body, Document, DocumentStore, ErrorKind, ForcedUpdate, GetOptions, InteractiveUpdate,
    StoreCapabilities, StoreFuture, WriteResult,
};
use crate::revision::{MergeOutcome, RevisionId, RevisionTree};

/// Store operation, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    Get,
    BulkWrite,
    BulkUpdate,
}

#[derive(Debug, Default)]
struct StoredDocument {
    tree: RevisionTree,
    bodies: HashMap<RevisionId, Body>,
}

#[derive(Debug, Default)]
struct MemoryState {
    docs: BTreeMap<String, StoredDocument>,
    next_id: u64,
    faults: HashMap<StoreOp, u32>,
    offline: bool,
    calls: HashMap<StoreOp, u64>,
}

impl MemoryState {
    fn enter(&mut self, op: StoreOp) -> StoreResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        if self.offline {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        if let Some(remaining) = self.faults.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!("injected {:?} fault", op)));
            }
        }
        Ok(())
    }
}

/// Deterministic in-process `DocumentStore`.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
    capabilities: StoreCapabilities,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// A store that trusts declared ancestry on bulk writes.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            capabilities: StoreCapabilities {
                trusts_declared_ancestry: true,
            },
        }
    }

    /// A store whose bulk path refuses declared ancestry.
    pub fn strict() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            capabilities: StoreCapabilities {
                trusts_declared_ancestry: false,
            },
        }
    }

    /// Makes the next `times` calls of `op` fail as unavailable.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn fail_next(&self, op: StoreOp, times: u32) {
        self.harness_state().faults.insert(op, times);
    }

    /// Takes the whole store offline or back online.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn set_offline(&self, offline: bool) {
        self.harness_state().offline = offline;
    }

    /// Number of documents held, decoys included.
    pub fn document_count(&self) -> usize {
        self.harness_state().docs.len()
    }

    /// Number of times `op` was attempted, failed attempts included.
    pub fn call_count(&self, op: StoreOp) -> u64 {
        self.harness_state().calls.get(&op).copied().unwrap_or(0)
    }

    // harness helpers have no error channel, so a poisoned lock panics
    fn harness_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock poisoned")
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn revision_hash(id: &str, parent: Option<&RevisionId>, body: &Body) -> StoreResult<String> {
        let encoded =
            serde_json::to_string(body).map_err(|e| StoreError::Protocol(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(encoded.as_bytes());
        let digest = hasher.finalize();

        Ok(digest[..16].iter().map(|b| format!("{:02x}", b)).collect())
    }

    fn create_now(&self, id: Option<String>, body: Body) -> StoreResult<Document> {
        let mut state = self.lock()?;
        state.enter(StoreOp::Create)?;

        let id = match id {
            Some(id) => id,
            None => {
                state.next_id += 1;
                format!("doc-{:06}", state.next_id)
            }
        };
        if state.docs.contains_key(&id) {
            return Err(StoreError::Conflict(format!("document {} already exists", id)));
        }

        let hash = Self::revision_hash(&id, None, &body)?;
        let revision =
            RevisionId::new(1, hash).map_err(|e| StoreError::Protocol(e.to_string()))?;

        let mut stored = StoredDocument {
            tree: RevisionTree::with_root(revision.clone()),
            bodies: HashMap::new(),
        };
        stored.bodies.insert(revision.clone(), body.clone());
        state.docs.insert(id.clone(), stored);

        Ok(Document {
            id,
            revision,
            body,
            conflicts: Vec::new(),
            revisions: None,
        })
    }

    fn update_now(&self, id: &str, rev: &RevisionId, body: Body) -> StoreResult<Document> {
        let mut state = self.lock()?;
        state.enter(StoreOp::Update)?;

        let stored = state
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let next = Self::edit_leaf(stored, id, rev, body.clone())?;

        Ok(Document {
            id: id.to_string(),
            revision: next,
            body,
            conflicts: Vec::new(),
            revisions: None,
        })
    }

    fn edit_leaf(
        stored: &mut StoredDocument,
        id: &str,
        rev: &RevisionId,
        body: Body,
    ) -> StoreResult<RevisionId> {
        let hash = Self::revision_hash(id, Some(rev), &body)?;
        let next = rev
            .next(hash)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        stored
            .tree
            .extend_leaf(rev, next.clone())
            .map_err(|_| StoreError::Conflict(format!("{} is not a current leaf of {}", rev, id)))?;
        stored.bodies.insert(next.clone(), body);
        Ok(next)
    }

    fn get_now(&self, id: &str, options: GetOptions) -> StoreResult<Document> {
        let mut state = self.lock()?;
        state.enter(StoreOp::Get)?;

        let stored = state
            .docs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let winner = stored
            .tree
            .winner()
            .ok_or_else(|| StoreError::Protocol(format!("{} has an empty revision tree", id)))?;

        Ok(Document {
            id: id.to_string(),
            body: stored.bodies.get(&winner).cloned().unwrap_or_default(),
            conflicts: if options.conflicts {
                stored.tree.conflicts()
            } else {
                Vec::new()
            },
            revisions: if options.revs {
                stored.tree.ancestry(&winner)
            } else {
                None
            },
            revision: winner,
        })
    }

    fn bulk_write_now(&self, updates: Vec<ForcedUpdate>) -> StoreResult<Vec<WriteResult>> {
        let mut state = self.lock()?;
        state.enter(StoreOp::BulkWrite)?;

        let trusting = self.capabilities.trusts_declared_ancestry;
        Ok(updates
            .into_iter()
            .map(|update| {
                if !trusting {
                    return WriteResult::rejected(
                        update.id,
                        ErrorKind::WriteRejected,
                        "store does not accept declared ancestry",
                    );
                }
                Self::apply_forced(&mut state.docs, update)
            })
            .collect())
    }

    fn bulk_update_now(&self, updates: Vec<InteractiveUpdate>) -> StoreResult<Vec<WriteResult>> {
        let mut state = self.lock()?;
        state.enter(StoreOp::BulkUpdate)?;

        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            let InteractiveUpdate {
                id,
                base_revision,
                body,
            } = update;

            let Some(stored) = state.docs.get_mut(&id) else {
                results.push(WriteResult::rejected(id, ErrorKind::Conflict, "document not found"));
                continue;
            };
            let result = match Self::edit_leaf(stored, &id, &base_revision, body) {
                Ok(next) => WriteResult::accepted(id, next, false),
                Err(StoreError::Conflict(reason)) => {
                    WriteResult::rejected(id, ErrorKind::Conflict, reason)
                }
                Err(e) => WriteResult::rejected(id, ErrorKind::WriteRejected, e.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    fn apply_forced(docs: &mut BTreeMap<String, StoredDocument>, update: ForcedUpdate) -> WriteResult {
        let ForcedUpdate {
            id,
            declared_revision,
            ancestry,
            body,
        } = update;

        if let Err(e) = ancestry.validate() {
            return WriteResult::rejected(id, ErrorKind::MalformedChain, e.to_string());
        }
        match ancestry.leaf() {
            Ok(leaf) if leaf == declared_revision => {}
            _ => {
                return WriteResult::rejected(
                    id,
                    ErrorKind::MalformedChain,
                    format!("declared revision {} is not the chain leaf", declared_revision),
                )
            }
        }

        let stored = docs.entry(id.clone()).or_default();
        match stored.tree.merge_chain(&ancestry) {
            Ok(MergeOutcome::AlreadyPresent) => WriteResult::accepted(id, declared_revision, true),
            Ok(MergeOutcome::Inserted) => {
                stored.bodies.insert(declared_revision.clone(), body);
                WriteResult::accepted(id, declared_revision, false)
            }
            Err(e) => WriteResult::rejected(id, ErrorKind::MalformedChain, e.to_string()),
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    fn create(&self, id: Option<String>, body: Body) -> StoreFuture<'_, Document> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.create_now(id, body)
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        rev: &'a RevisionId,
        body: Body,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.update_now(id, rev, body)
        })
    }

    fn get<'a>(&'a self, id: &'a str, options: GetOptions) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.get_now(id, options)
        })
    }

    fn bulk_write(&self, updates: Vec<ForcedUpdate>) -> StoreFuture<'_, Vec<WriteResult>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.bulk_write_now(updates)
        })
    }

    fn bulk_update(&self, updates: Vec<InteractiveUpdate>) -> StoreFuture<'_, Vec<WriteResult>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.bulk_update_now(updates)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::RevisionChain;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Body {
        value.as_object().cloned().unwrap_or_default()
    }

    fn forced(id: &str, start: u64, ids: &[&str]) -> ForcedUpdate {
        let ancestry = RevisionChain::new(start, ids.iter().map(|s| s.to_string()).collect());
        ForcedUpdate {
            id: id.to_string(),
            declared_revision: ancestry.leaf().unwrap(),
            ancestry,
            body: body(json!({"forced": true})),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_generation_one() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(None, body(json!({"count": 0}))).await.unwrap();
        assert_eq!(doc.revision.generation(), 1);
        assert_eq!(doc.revision.hash().len(), 32);
        assert_eq!(doc.id, "doc-000001");
    }

    #[tokio::test]
    async fn test_create_is_deterministic() {
        let a = MemoryDocumentStore::new();
        let b = MemoryDocumentStore::new();
        let ra = a.create(Some("x".into()), body(json!({"n": 1}))).await.unwrap();
        let rb = b.create(Some("x".into()), body(json!({"n": 1}))).await.unwrap();
        assert_eq!(ra.revision, rb.revision);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_conflicts() {
        let store = MemoryDocumentStore::new();
        store.create(Some("x".into()), Body::new()).await.unwrap();
        let err = store.create(Some("x".into()), Body::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_requires_current_leaf() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), Body::new()).await.unwrap();
        let updated = store
            .update("x", &doc.revision, body(json!({"count": 1})))
            .await
            .unwrap();
        assert_eq!(updated.revision.generation(), 2);

        let err = store
            .update("x", &doc.revision, body(json!({"count": 2})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bulk_write_trusts_declared_ancestry() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), Body::new()).await.unwrap();
        let base = doc.revision.hash().to_string();

        let results = store
            .bulk_write(vec![
                forced("x", 2, &["aaaa", base.as_str()]),
                forced("x", 2, &["bbbb", base.as_str()]),
            ])
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.accepted && !r.noop));

        let fetched = store.get("x", GetOptions::with_conflicts()).await.unwrap();
        assert_eq!(fetched.revision.to_string(), "2-bbbb");
        assert_eq!(fetched.conflicts.len(), 1);
        assert_eq!(fetched.conflicts[0].to_string(), "2-aaaa");
        assert_eq!(fetched.body["forced"], true);
    }

    #[tokio::test]
    async fn test_bulk_write_reports_per_document() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), Body::new()).await.unwrap();
        let base = doc.revision.hash().to_string();

        let mut mismatched = forced("x", 2, &["cccc", base.as_str()]);
        mismatched.declared_revision = RevisionId::parse("2-dddd").unwrap();

        let results = store
            .bulk_write(vec![forced("x", 2, &["aaaa", base.as_str()]), mismatched])
            .await
            .unwrap();
        assert!(results[0].accepted);
        assert!(!results[1].accepted);
        assert_eq!(results[1].error, Some(ErrorKind::MalformedChain));
    }

    #[tokio::test]
    async fn test_bulk_write_accepts_chain_below_winner() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), Body::new()).await.unwrap();
        let doc = store.update("x", &doc.revision, Body::new()).await.unwrap();
        let doc = store.update("x", &doc.revision, Body::new()).await.unwrap();
        assert_eq!(doc.revision.generation(), 3);

        let results = store
            .bulk_write(vec![forced("x", 2, &["eeee", "ffff"])])
            .await
            .unwrap();
        assert!(results[0].accepted);

        let fetched = store.get("x", GetOptions::with_conflicts()).await.unwrap();
        assert_eq!(fetched.revision, doc.revision);
        assert_eq!(fetched.conflicts[0].to_string(), "2-eeee");
    }

    #[tokio::test]
    async fn test_bulk_write_same_chain_twice_is_noop() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), Body::new()).await.unwrap();
        let base = doc.revision.hash().to_string();

        let first = store.bulk_write(vec![forced("x", 2, &["aaaa", base.as_str()])]).await.unwrap();
        let second = store.bulk_write(vec![forced("x", 2, &["aaaa", base.as_str()])]).await.unwrap();
        assert!(first[0].accepted && !first[0].noop);
        assert!(second[0].accepted && second[0].noop);
        assert_eq!(first[0].revision, second[0].revision);
    }

    #[tokio::test]
    async fn test_strict_store_rejects_forced_writes() {
        let store = MemoryDocumentStore::strict();
        assert!(!store.capabilities().trusts_declared_ancestry);
        let results = store.bulk_write(vec![forced("x", 1, &["aaaa"])]).await.unwrap();
        assert_eq!(results[0].error, Some(ErrorKind::WriteRejected));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryDocumentStore::new();
        store.fail_next(StoreOp::Create, 1);
        let err = store.create(None, Body::new()).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.create(None, Body::new()).await.is_ok());
        assert_eq!(store.call_count(StoreOp::Create), 2);

        store.set_offline(true);
        assert!(store.get("doc-000001", GetOptions::default()).await.is_err());
        store.set_offline(false);
        assert!(store.get("doc-000001", GetOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_update_same_base_twice_conflicts() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Some("x".into()), body(json!({"count": 0}))).await.unwrap();

        let results = store
            .bulk_update(vec![
                InteractiveUpdate::new("x", doc.revision.clone(), body(json!({"count": 1}))),
                InteractiveUpdate::new("x", doc.revision.clone(), body(json!({"count": 2}))),
            ])
            .await
            .unwrap();

        assert!(results[0].accepted);
        assert_eq!(results[0].revision.as_ref().unwrap().generation(), 2);
        assert!(!results[1].accepted);
        assert_eq!(results[1].error, Some(ErrorKind::Conflict));
        assert!(results[1].revision.is_none());

        let fetched = store.get("x", GetOptions::with_conflicts()).await.unwrap();
        assert_eq!(Some(&fetched.revision), results[0].revision.as_ref());
        assert!(fetched.conflicts.is_empty());
        assert_eq!(fetched.body["count"], 1);
    }

    #[tokio::test]
    async fn test_bulk_update_missing_document() {
        let store = MemoryDocumentStore::new();
        let results = store
            .bulk_update(vec![InteractiveUpdate::new(
                "nope",
                RevisionId::parse("1-aaaa").unwrap(),
                Body::new(),
            )])
            .await
            .unwrap();
        assert_eq!(results[0].error, Some(ErrorKind::Conflict));
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.call_count(StoreOp::BulkUpdate), 1);
    }

    #[test]
    #[should_panic(expected = "memory store lock poisoned")]
    fn test_fault_injection_on_poisoned_lock_panics() {
        let store = std::sync::Arc::new(MemoryDocumentStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poisoning the store lock");
        })
        .join();

        store.fail_next(StoreOp::Create, 1);
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let store = MemoryDocumentStore::new();
        let err = store.get("nope", GetOptions::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
