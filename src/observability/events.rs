//! Observability events for revforge
//!
//! Every lifecycle point of a conflict simulation has a typed event with a
//! stable upper-case name. Names never change once published; log
//! consumers match on them.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Scenario lifecycle
    /// Scenario run begins
    ScenarioBegin,
    /// Base document created (and advanced, if requested)
    BaseCreated,
    /// Branch divergence begins
    DivergenceBegin,
    /// Scenario reached Done
    ScenarioComplete,
    /// Scenario reached Failed
    ScenarioFailed,
    /// Cancellation observed; no further branches issued
    ScenarioCancelled,

    // Chain construction
    /// Decoy document inserted to harvest a hash token
    DecoyCreated,
    /// Ancestor chain fabricated
    ChainBuilt,

    // Forced writes
    /// Bulk write with declared ancestry submitted
    ForcedWriteSubmitted,
    /// Forced write accepted for one document
    ForcedWriteAccepted,
    /// Forced write rejected for one document
    ForcedWriteRejected,
    /// Branch ended without an accepted write
    BranchFailed,

    // Observation
    /// Leaf set re-read from the store
    LeavesObserved,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::ScenarioBegin => "SCENARIO_BEGIN",
            Event::BaseCreated => "BASE_CREATED",
            Event::DivergenceBegin => "DIVERGENCE_BEGIN",
            Event::ScenarioComplete => "SCENARIO_COMPLETE",
            Event::ScenarioFailed => "SCENARIO_FAILED",
            Event::ScenarioCancelled => "SCENARIO_CANCELLED",

            Event::DecoyCreated => "DECOY_CREATED",
            Event::ChainBuilt => "CHAIN_BUILT",

            Event::ForcedWriteSubmitted => "FORCED_WRITE_SUBMITTED",
            Event::ForcedWriteAccepted => "FORCED_WRITE_ACCEPTED",
            Event::ForcedWriteRejected => "FORCED_WRITE_REJECTED",
            Event::BranchFailed => "BRANCH_FAILED",

            Event::LeavesObserved => "LEAVES_OBSERVED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ScenarioFailed
                | Event::ScenarioCancelled
                | Event::ForcedWriteRejected
                | Event::BranchFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
