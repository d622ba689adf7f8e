//! Conflict scenarios and their reports
//!
//! A `ConflictScenario` says what to fork and how; a `SimulationReport` says
//! what happened. Reports are produced for every run, including failed
//! ones, so "no conflict formed" is always distinguishable from "the run
//! crashed before conflicts could form".

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::errors::ForgeError;
use super::state::SimulationState;
use crate::revision::{RevisionChain, RevisionId};
use crate::store::{Body, Document, WriteResult};

/// How branches are issued against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchMode {
    /// One branch at a time, in plan order
    #[default]
    Sequential,
    /// All branches at once
    Concurrent,
}

/// One divergent branch to force.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchPlan {
    pub label: String,
    /// Generations fabricated above the base revision
    pub steps: u64,
    /// Body of the forced revision; the base body when `None`
    pub body: Option<Body>,
    /// Fixed decoy tokens; decoys are created in the store when `None`
    pub decoys: Option<Vec<String>>,
}

impl BranchPlan {
    pub fn new(label: impl Into<String>, steps: u64) -> Self {
        Self {
            label: label.into(),
            steps,
            body: None,
            decoys: None,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_decoys<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decoys = Some(tokens.into_iter().map(Into::into).collect());
        self
    }
}

/// A single conflict simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictScenario {
    /// Base document id; the store picks one when `None`
    pub base_id: Option<String>,
    pub base_body: Body,
    /// Ordinary updates applied to the base before diverging
    pub advance: u32,
    pub branches: Vec<BranchPlan>,
    /// Leaves expected after divergence; defaults to the number of
    /// distinct accepted branch revisions
    pub expected_leaf_count: Option<usize>,
    pub mode: BranchMode,
}

impl ConflictScenario {
    pub fn new(base_body: Body) -> Self {
        Self {
            base_id: None,
            base_body,
            advance: 0,
            branches: Vec::new(),
            expected_leaf_count: None,
            mode: BranchMode::Sequential,
        }
    }

    /// Adds `count` store-decoy branches of `steps` generations each.
    pub fn with_branches(mut self, count: usize, steps: u64) -> Self {
        let offset = self.branches.len();
        self.branches
            .extend((1..=count).map(|i| BranchPlan::new(format!("branch-{}", offset + i), steps)));
        self
    }

    pub fn with_branch(mut self, plan: BranchPlan) -> Self {
        self.branches.push(plan);
        self
    }

    pub fn with_base_id(mut self, id: impl Into<String>) -> Self {
        self.base_id = Some(id.into());
        self
    }

    pub fn with_advance(mut self, advance: u32) -> Self {
        self.advance = advance;
        self
    }

    pub fn expecting_leaves(mut self, count: usize) -> Self {
        self.expected_leaf_count = Some(count);
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.mode = BranchMode::Concurrent;
        self
    }
}

/// What happened to one branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchOutcome {
    pub label: String,
    /// Fabricated chain, if construction got that far
    pub chain: Option<RevisionChain>,
    /// Per-document store outcomes
    pub results: Vec<WriteResult>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ForgeError>,
}

impl BranchOutcome {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            chain: None,
            results: Vec::new(),
            error: None,
        }
    }

    pub fn failed(label: impl Into<String>, error: ForgeError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(label)
        }
    }

    /// True if every submitted document was accepted.
    pub fn accepted(&self) -> bool {
        self.error.is_none() && !self.results.is_empty() && self.results.iter().all(|r| r.accepted)
    }

    /// Revision the branch placed in the tree.
    pub fn revision(&self) -> Option<&RevisionId> {
        self.results.iter().find_map(|r| r.revision.as_ref())
    }
}

/// Terminal report of one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario_id: Uuid,
    pub state: SimulationState,
    pub base: Option<Document>,
    pub branches: Vec<BranchOutcome>,
    pub observed: Option<Document>,
    /// Winner first, then conflicts
    pub leaves: Vec<RevisionId>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ForgeError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SimulationReport {
    pub fn new(scenario_id: Uuid) -> Self {
        Self {
            scenario_id,
            state: SimulationState::Init,
            base: None,
            branches: Vec::new(),
            observed: None,
            leaves: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == SimulationState::Done
    }

    pub fn accepted_branches(&self) -> usize {
        self.branches.iter().filter(|b| b.accepted()).count()
    }

    /// Distinct revisions placed by accepted branches.
    pub fn accepted_revisions(&self) -> BTreeSet<RevisionId> {
        self.branches
            .iter()
            .filter(|b| b.accepted())
            .filter_map(|b| b.revision().cloned())
            .collect()
    }

    pub fn winner(&self) -> Option<&RevisionId> {
        self.leaves.first()
    }

    pub fn conflicts(&self) -> &[RevisionId] {
        self.leaves.get(1..).unwrap_or(&[])
    }
}

fn serialize_error<S: Serializer>(error: &Option<ForgeError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serde_json::json!({ "code": e.code(), "message": e.to_string() })
            .serialize(serializer),
        None => Value::Null.serialize(serializer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_branches_labels() {
        let scenario = ConflictScenario::new(Body::new())
            .with_branches(2, 1)
            .with_branches(1, 3);
        let labels: Vec<&str> = scenario.branches.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["branch-1", "branch-2", "branch-3"]);
        assert_eq!(scenario.branches[2].steps, 3);
        assert_eq!(scenario.mode, BranchMode::Sequential);
    }

    #[test]
    fn test_branch_outcome_accepted() {
        let mut outcome = BranchOutcome::new("b");
        assert!(!outcome.accepted());

        outcome
            .results
            .push(WriteResult::accepted("foo", RevisionId::parse("2-a").unwrap(), false));
        assert!(outcome.accepted());
        assert_eq!(outcome.revision().unwrap().to_string(), "2-a");

        let failed = BranchOutcome::failed("c", ForgeError::NoBranchAccepted);
        assert!(!failed.accepted());
    }

    #[test]
    fn test_report_serializes_errors_with_code() {
        let mut report = SimulationReport::new(Uuid::new_v4());
        report.error = Some(ForgeError::Cancelled);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error"]["code"], "REVFORGE_CANCELLED");
        assert_eq!(json["state"], "init");
    }

    #[test]
    fn test_report_leaf_accessors() {
        let mut report = SimulationReport::new(Uuid::new_v4());
        assert!(report.winner().is_none());
        assert!(report.conflicts().is_empty());

        report.leaves = vec![
            RevisionId::parse("2-b").unwrap(),
            RevisionId::parse("2-a").unwrap(),
        ];
        assert_eq!(report.winner().unwrap().to_string(), "2-b");
        assert_eq!(report.conflicts().len(), 1);
    }
}
