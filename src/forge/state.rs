//! Simulation State Machine
//!
//! ```text
//! Init → BaseCreated → Diverging → Observed → Done
//!   └──────────┴────────────┴──────────┴────→ Failed
//! ```
//!
//! - Transitions are explicit method calls, never inferred
//! - Any non-terminal state may fail
//! - `Done` and `Failed` are terminal

use serde::Serialize;

use super::errors::{ForgeError, ForgeResult};

/// Conflict simulation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationState {
    /// Nothing written yet
    Init,
    /// Base document exists in the store
    BaseCreated,
    /// Branches are being forced
    Diverging,
    /// Leaf set re-read from the store
    Observed,
    /// Observed leaves match expectations
    Done,
    /// Run ended early or leaves did not match
    Failed,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::Init
    }
}

impl SimulationState {
    /// Get the state name for observability.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::BaseCreated => "BaseCreated",
            Self::Diverging => "Diverging",
            Self::Observed => "Observed",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn forbidden(self, to: &'static str) -> ForgeError {
        ForgeError::IllegalTransition {
            from: self.state_name(),
            to,
        }
    }

    /// Init → BaseCreated
    pub fn base_created(self) -> ForgeResult<Self> {
        match self {
            Self::Init => Ok(Self::BaseCreated),
            _ => Err(self.forbidden("BaseCreated")),
        }
    }

    /// BaseCreated → Diverging
    pub fn begin_diverging(self) -> ForgeResult<Self> {
        match self {
            Self::BaseCreated => Ok(Self::Diverging),
            _ => Err(self.forbidden("Diverging")),
        }
    }

    /// Diverging → Observed
    pub fn observed(self) -> ForgeResult<Self> {
        match self {
            Self::Diverging => Ok(Self::Observed),
            _ => Err(self.forbidden("Observed")),
        }
    }

    /// Observed → Done
    pub fn complete(self) -> ForgeResult<Self> {
        match self {
            Self::Observed => Ok(Self::Done),
            _ => Err(self.forbidden("Done")),
        }
    }

    /// Any non-terminal state → Failed
    pub fn fail(self) -> ForgeResult<Self> {
        if self.is_terminal() {
            return Err(self.forbidden("Failed"));
        }
        Ok(Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SimulationState::default()
            .base_created()
            .and_then(SimulationState::begin_diverging)
            .and_then(SimulationState::observed)
            .and_then(SimulationState::complete)
            .unwrap();
        assert_eq!(state, SimulationState::Done);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        let err = SimulationState::Init.observed().unwrap_err();
        assert_eq!(
            err,
            ForgeError::IllegalTransition {
                from: "Init",
                to: "Observed"
            }
        );
        assert!(SimulationState::BaseCreated.complete().is_err());
    }

    #[test]
    fn test_any_live_state_can_fail() {
        for state in [
            SimulationState::Init,
            SimulationState::BaseCreated,
            SimulationState::Diverging,
            SimulationState::Observed,
        ] {
            assert_eq!(state.fail().unwrap(), SimulationState::Failed);
        }
    }

    #[test]
    fn test_terminal_states_cannot_fail() {
        assert!(SimulationState::Done.fail().is_err());
        assert!(SimulationState::Failed.fail().is_err());
    }
}
