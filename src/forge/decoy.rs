//! Decoy factories
//!
//! A decoy factory hands out one hash token per call. Tokens become the
//! fabricated ancestors of a forced revision, so they must be valid for the
//! target store without this crate knowing its hash algorithm.
//!
//! - `StoreDecoyFactory` inserts a throwaway document and harvests the hash
//!   of the revision the store assigned
//! - `SequenceDecoyFactory` replays a fixed list, for deterministic runs

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{ForgeError, ForgeResult};
use crate::observability::Event;
use crate::observe;
use crate::store::{Body, DocumentStore};

/// Boxed future yielding one hash token
pub type DecoyFuture<'a> = Pin<Box<dyn Future<Output = ForgeResult<String>> + Send + 'a>>;

/// Source of hash tokens for fabricated ancestors.
pub trait DecoyFactory: Send {
    /// Produces the next token.
    fn next_token(&mut self) -> DecoyFuture<'_>;
}

/// Harvests tokens by creating decoy documents in the store.
///
/// Decoys are left in place. The store owns them once created.
pub struct StoreDecoyFactory {
    store: Arc<dyn DocumentStore>,
    decoy_of: String,
    branch: String,
    created: u64,
}

impl StoreDecoyFactory {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        decoy_of: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            store,
            decoy_of: decoy_of.into(),
            branch: branch.into(),
            created: 0,
        }
    }

    /// Number of decoys this factory has created.
    pub fn created(&self) -> u64 {
        self.created
    }

    fn decoy_body(&self, seq: u64) -> Body {
        let mut body = Body::new();
        body.insert("decoy_of".into(), Value::String(self.decoy_of.clone()));
        body.insert("branch".into(), Value::String(self.branch.clone()));
        body.insert("seq".into(), Value::from(seq));
        body
    }
}

impl DecoyFactory for StoreDecoyFactory {
    fn next_token(&mut self) -> DecoyFuture<'_> {
        Box::pin(async move {
            let body = self.decoy_body(self.created + 1);
            let decoy = self.store.create(None, body).await?;
            self.created += 1;

            observe!(
                Event::DecoyCreated,
                branch = %self.branch,
                decoy_id = %decoy.id,
                rev = %decoy.revision
            );
            Ok(decoy.revision.hash().to_string())
        })
    }
}

/// Replays a fixed token list. Fails once the list is exhausted.
#[derive(Debug, Clone, Default)]
pub struct SequenceDecoyFactory {
    tokens: VecDeque<String>,
    served: u64,
}

impl SequenceDecoyFactory {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            served: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }
}

impl DecoyFactory for SequenceDecoyFactory {
    fn next_token(&mut self) -> DecoyFuture<'_> {
        Box::pin(async move {
            let token = self.tokens.pop_front().ok_or(ForgeError::ChainConstruction {
                step: self.served + 1,
                reason: "decoy sequence exhausted".into(),
            })?;
            self.served += 1;
            Ok(token)
        })
    }
}
