//! Conflict forging
//!
//! Builds deliberate conflicts in a document's revision tree:
//! - `DecoyFactory` supplies hash tokens for fabricated ancestors
//! - `RevisionChainBuilder` turns tokens into an ancestor chain above a revision
//! - `ForcedRevisionWriter` submits a document at the chain's declared position
//! - `ConflictSimulationDriver` forks one base into N branches and observes
//!   the resulting leaf set
//!
//! Everything here talks to the store through `crate::store::DocumentStore`.

mod cancel;
mod chain_builder;
mod decoy;
mod driver;
mod errors;
mod scenario;
mod state;
mod writer;

pub use cancel::CancellationToken;
pub use chain_builder::RevisionChainBuilder;
pub use decoy::{DecoyFactory, DecoyFuture, SequenceDecoyFactory, StoreDecoyFactory};
pub use driver::ConflictSimulationDriver;
pub use errors::{ForgeError, ForgeResult};
pub use scenario::{BranchMode, BranchOutcome, BranchPlan, ConflictScenario, SimulationReport};
pub use state::SimulationState;
pub use writer::{ForcedRevisionWriter, ForcedWrite};
