//! ConflictSimulationDriver - runs one conflict scenario end to end
//!
//! 1. Create the base document (generation 1), then apply `advance`
//!    ordinary updates
//! 2. For each branch, fabricate a chain anchored at the SAME base revision
//!    with its own decoys, and force it. Sharing the anchor is what makes
//!    the branches collide at one generation with different hashes
//! 3. Re-read the base with conflicts enabled and compare the leaf set
//!
//! Branches are independent: a branch that fails to build or gets rejected
//! is recorded and the others carry on. A transport failure or cancellation
//! in any branch fails the run, and observation only happens when at least
//! one branch was accepted.
//!
//! The report always carries every branch's outcome.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::chain_builder::RevisionChainBuilder;
use super::decoy::{DecoyFactory, SequenceDecoyFactory, StoreDecoyFactory};
use super::errors::{ForgeError, ForgeResult};
use super::scenario::{BranchMode, BranchOutcome, BranchPlan, ConflictScenario, SimulationReport};
use super::state::SimulationState;
use super::writer::ForcedRevisionWriter;
use crate::observability::{Event, ObservationScope};
use crate::observe;
use crate::store::{Body, Document, DocumentStore, GetOptions};

/// Drives conflict scenarios against a document store.
pub struct ConflictSimulationDriver {
    store: Arc<dyn DocumentStore>,
    writer: ForcedRevisionWriter,
    builder: RevisionChainBuilder,
    cancel: CancellationToken,
}

impl ConflictSimulationDriver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            writer: ForcedRevisionWriter::new(store.clone()),
            builder: RevisionChainBuilder::new(),
            cancel: CancellationToken::new(),
            store,
        }
    }

    /// Uses `token` to stop issuing branches.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `scenario` to a terminal state.
    pub async fn run(&self, scenario: &ConflictScenario) -> SimulationReport {
        let mut report = SimulationReport::new(Uuid::new_v4());
        let span = tracing::info_span!(
            "simulation",
            scenario = %report.scenario_id,
            branches = scenario.branches.len()
        );
        let scope = ObservationScope::in_span("SIMULATION", span);
        let span = scope.span().clone();

        span.in_scope(|| {
            observe!(Event::ScenarioBegin, mode = ?scenario.mode, advance = scenario.advance)
        });

        match self.drive(scenario, &mut report).instrument(span.clone()).await {
            Ok(()) => {
                span.in_scope(|| observe!(Event::ScenarioComplete, leaves = report.leaves.len()));
                scope.complete();
            }
            Err(error) => {
                let reason = error.to_string();
                report.state = report.state.fail().unwrap_or(SimulationState::Failed);
                span.in_scope(|| {
                    observe!(Event::ScenarioFailed, code = error.code(), reason = %reason)
                });
                report.error = Some(error);
                scope.fail(&reason);
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    async fn drive(
        &self,
        scenario: &ConflictScenario,
        report: &mut SimulationReport,
    ) -> ForgeResult<()> {
        let base = self.create_base(scenario).await?;
        report.state = report.state.base_created()?;
        report.base = Some(base.clone());
        observe!(Event::BaseCreated, id = %base.id, rev = %base.revision);

        if !self.store.capabilities().trusts_declared_ancestry {
            return Err(ForgeError::AncestryNotTrusted);
        }

        report.state = report.state.begin_diverging()?;
        observe!(Event::DivergenceBegin);
        report.branches = self.diverge(&base, scenario).await;

        // last scenario-level failure wins
        if let Some(error) = report
            .branches
            .iter()
            .rev()
            .filter_map(|b| b.error.as_ref())
            .find(|e| e.aborts_scenario())
        {
            return Err(error.clone());
        }
        if report.accepted_branches() == 0 {
            return Err(ForgeError::NoBranchAccepted);
        }

        let observed = self
            .store
            .get(&base.id, GetOptions::with_conflicts())
            .await?;
        report.state = report.state.observed()?;
        report.leaves = observed.leaves();
        report.observed = Some(observed);

        let winner = report.winner().map(|r| r.to_string()).unwrap_or_default();
        observe!(
            Event::LeavesObserved,
            id = %base.id,
            winner = %winner,
            conflicts = report.conflicts().len()
        );

        let expected = scenario
            .expected_leaf_count
            .unwrap_or_else(|| report.accepted_revisions().len());
        if report.leaves.len() != expected {
            return Err(ForgeError::UnexpectedLeafSet {
                expected,
                observed: report.leaves.len(),
            });
        }

        report.state = report.state.complete()?;
        Ok(())
    }

    async fn create_base(&self, scenario: &ConflictScenario) -> ForgeResult<Document> {
        let mut doc = self
            .store
            .create(scenario.base_id.clone(), scenario.base_body.clone())
            .await?;

        for step in 1..=scenario.advance {
            let mut body = scenario.base_body.clone();
            body.insert("advance".to_string(), Value::from(step));
            doc = self.store.update(&doc.id, &doc.revision, body).await?;
        }
        Ok(doc)
    }

    async fn diverge(&self, base: &Document, scenario: &ConflictScenario) -> Vec<BranchOutcome> {
        match scenario.mode {
            BranchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(scenario.branches.len());
                for plan in &scenario.branches {
                    outcomes.push(self.run_branch(base, plan).await);
                }
                outcomes
            }
            BranchMode::Concurrent => {
                join_all(
                    scenario
                        .branches
                        .iter()
                        .map(|plan| self.run_branch(base, plan)),
                )
                .await
            }
        }
    }

    async fn run_branch(&self, base: &Document, plan: &BranchPlan) -> BranchOutcome {
        if self.cancel.is_cancelled() {
            observe!(Event::ScenarioCancelled, branch = %plan.label);
            return BranchOutcome::failed(plan.label.clone(), ForgeError::Cancelled);
        }

        let mut outcome = BranchOutcome::new(plan.label.clone());
        let mut factory: Box<dyn DecoyFactory> = match &plan.decoys {
            Some(tokens) => Box::new(SequenceDecoyFactory::new(tokens.clone())),
            None => Box::new(StoreDecoyFactory::new(
                self.store.clone(),
                base.id.clone(),
                plan.label.clone(),
            )),
        };

        match self
            .builder
            .build(&base.revision, plan.steps, factory.as_mut())
            .await
        {
            Ok(chain) => {
                let body = plan
                    .body
                    .clone()
                    .unwrap_or_else(|| branch_body(&base.body, &plan.label));

                match self.writer.write(base, chain.clone(), body).await {
                    Ok(results) => {
                        if let Some(rejected) = results.iter().find(|r| !r.accepted) {
                            outcome.error = Some(ForgeError::WriteRejected {
                                id: rejected.id.clone(),
                                reason: rejected
                                    .reason
                                    .clone()
                                    .or_else(|| rejected.error.map(|k| k.as_str().to_string()))
                                    .unwrap_or_default(),
                            });
                        }
                        outcome.results = results;
                    }
                    Err(e) => outcome.error = Some(e),
                }
                outcome.chain = Some(chain);
            }
            Err(e) => outcome.error = Some(e),
        }

        if let Some(error) = &outcome.error {
            observe!(
                Event::BranchFailed,
                branch = %plan.label,
                code = error.code(),
                reason = %error
            );
        }
        outcome
    }
}

/// Base body tagged with the branch label.
fn branch_body(base: &Body, label: &str) -> Body {
    let mut body = base.clone();
    body.insert("branch".to_string(), Value::String(label.to_string()));
    body
}
