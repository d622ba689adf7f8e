//! ForcedRevisionWriter - submits documents at a declared tree position
//!
//! Each update carries `_rev = <start>-<ids[0]>` and `_revisions = chain`,
//! and goes through the store's non-interactive bulk path. That path places
//! the document where the chain says without checking that the declared
//! ancestors exist, which is exactly what makes a deliberate branch possible.
//! The writer never re-checks ancestry against the store.
//!
//! Local shape checks only:
//! - chain must be structurally valid
//! - chain must not start below the supplied document's generation
//!
//! A failed check rejects that one document; the rest of the batch is still
//! submitted. Nothing is retried: resubmitting an identical write is a no-op,
//! but resubmitting a freshly fabricated chain is a new conflict.

use std::sync::Arc;

use super::errors::{ForgeError, ForgeResult};
use crate::observability::Event;
use crate::observe;
use crate::revision::RevisionChain;
use crate::store::{Body, Document, DocumentStore, ErrorKind, ForcedUpdate, WriteResult};

/// One forced write request.
#[derive(Debug, Clone)]
pub struct ForcedWrite {
    /// Document being forked; supplies the id and current generation
    pub document: Document,
    /// Fabricated ancestry
    pub chain: RevisionChain,
    /// Body of the new revision
    pub body: Body,
}

/// Submits forced revisions through a store's trusting bulk path.
#[derive(Clone)]
pub struct ForcedRevisionWriter {
    store: Arc<dyn DocumentStore>,
}

impl ForcedRevisionWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Builds the wire update for `doc`, or the rejection it earns locally.
    pub fn prepare(
        doc: &Document,
        chain: RevisionChain,
        body: Body,
    ) -> Result<ForcedUpdate, WriteResult> {
        if let Err(e) = chain.validate() {
            return Err(WriteResult::rejected(
                doc.id.clone(),
                ErrorKind::MalformedChain,
                e.to_string(),
            ));
        }
        if chain.start < doc.revision.generation() {
            return Err(WriteResult::rejected(
                doc.id.clone(),
                ErrorKind::StaleGeneration,
                format!(
                    "chain starts at generation {} below current {}",
                    chain.start, doc.revision
                ),
            ));
        }
        let declared_revision = chain.leaf().map_err(|e| {
            WriteResult::rejected(doc.id.clone(), ErrorKind::MalformedChain, e.to_string())
        })?;

        Ok(ForcedUpdate {
            id: doc.id.clone(),
            declared_revision,
            ancestry: chain,
            body,
        })
    }

    /// Forces a single revision. Returns the store's per-document results.
    pub async fn write(
        &self,
        doc: &Document,
        chain: RevisionChain,
        body: Body,
    ) -> ForgeResult<Vec<WriteResult>> {
        self.write_batch(vec![ForcedWrite {
            document: doc.clone(),
            chain,
            body,
        }])
        .await
    }

    /// Forces every request in one bulk call.
    ///
    /// Returns one result per request, in request order. Fails as a whole
    /// only when the store cannot be reached or does not honour declared
    /// ancestry.
    pub async fn write_batch(&self, requests: Vec<ForcedWrite>) -> ForgeResult<Vec<WriteResult>> {
        if !self.store.capabilities().trusts_declared_ancestry {
            return Err(ForgeError::AncestryNotTrusted);
        }

        let mut slots: Vec<Option<WriteResult>> = Vec::with_capacity(requests.len());
        let mut submitted: Vec<(usize, ForcedUpdate)> = Vec::new();
        for (index, request) in requests.into_iter().enumerate() {
            match Self::prepare(&request.document, request.chain, request.body) {
                Ok(update) => {
                    slots.push(None);
                    submitted.push((index, update));
                }
                Err(rejected) => slots.push(Some(rejected)),
            }
        }

        if !submitted.is_empty() {
            let (indexes, updates): (Vec<usize>, Vec<ForcedUpdate>) =
                submitted.into_iter().unzip();

            observe!(Event::ForcedWriteSubmitted, documents = updates.len());

            let ids: Vec<String> = updates.iter().map(|u| u.id.clone()).collect();
            let mut results = self.store.bulk_write(updates).await?.into_iter();

            for (index, id) in indexes.into_iter().zip(ids) {
                let result = results.next().unwrap_or_else(|| {
                    WriteResult::rejected(id, ErrorKind::WriteRejected, "store reported no outcome")
                });
                slots[index] = Some(result);
            }
        }

        let results: Vec<WriteResult> = slots.into_iter().flatten().collect();
        for result in &results {
            if result.accepted {
                let rev = result
                    .revision
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                observe!(
                    Event::ForcedWriteAccepted,
                    id = %result.id,
                    rev = %rev,
                    noop = result.noop
                );
            } else {
                observe!(
                    Event::ForcedWriteRejected,
                    id = %result.id,
                    error = result.error.map(|k| k.as_str()).unwrap_or("unknown")
                );
            }
        }
        Ok(results)
    }
}
