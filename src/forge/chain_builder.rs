//! RevisionChainBuilder - fabricates an ancestor chain above a revision
//!
//! Given `current = g-h0` and `steps = n`, the builder pulls tokens
//! `d1..dn` from a decoy factory and returns
//!
//! ```text
//! start = g + n
//! ids   = [dn, ..., d1, h0]
//! ```
//!
//! so `current` is the oldest entry and each decoy extends it by one
//! generation. Tokens are pulled strictly in order; the chain only exists
//! once every token has arrived.

use super::decoy::DecoyFactory;
use super::errors::{ForgeError, ForgeResult};
use crate::observability::Event;
use crate::observe;
use crate::revision::{RevisionChain, RevisionError, RevisionId};

/// Builds fabricated ancestor chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisionChainBuilder;

impl RevisionChainBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Fabricates `steps` generations above `current`.
    ///
    /// All-or-nothing: if the factory fails at any step, the error names
    /// that step and no chain is returned. Decoys created before the
    /// failure stay in the store.
    pub async fn build(
        &self,
        current: &RevisionId,
        steps: u64,
        factory: &mut dyn DecoyFactory,
    ) -> ForgeResult<RevisionChain> {
        let start = current.generation().checked_add(steps).ok_or_else(|| {
            RevisionError::MalformedChain(format!(
                "{} steps above {} overflows the generation counter",
                steps, current
            ))
        })?;

        // sized by tokens received, never by `steps`
        let mut oldest_first = Vec::new();
        oldest_first.push(current.hash().to_string());

        for step in 1..=steps {
            let token = factory.next_token().await.map_err(|e| {
                let reason = match e {
                    ForgeError::ChainConstruction { reason, .. } => reason,
                    other => other.to_string(),
                };
                ForgeError::ChainConstruction { step, reason }
            })?;
            oldest_first.push(token);
        }

        oldest_first.reverse();
        let chain = RevisionChain::new(start, oldest_first);
        chain.validate()?;

        observe!(
            Event::ChainBuilt,
            anchor = %current,
            start = chain.start,
            length = chain.len()
        );
        Ok(chain)
    }
}
