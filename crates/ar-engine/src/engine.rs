//! The cycle engine
//!
//! Drives repeated evaluation passes over the fact store to a fixed point
//! and owns mutation-commit ordering. The engine is single-threaded
//! cooperative: one cycle runs to completion before the next event batch is
//! admitted, so the snapshot needs no locking and binding scope is trivial.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use ulid::Ulid;

use ar_core::{Asset, AttributeEvent, AttributeRef};
use ar_facts::{FactStore, FactsError, FactsHandle};

use crate::clock::RulesClock;
use crate::deployment::{DeployError, RulesetDeployment};
use crate::rule::Ruleset;
use crate::writer::{AssetWriter, WriteError};

/// Default cap on evaluation passes per cycle; a ruleset that needs more is
/// looping, not converging
pub const DEFAULT_MAX_PASSES: usize = 100;

/// Engine tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Maximum evaluation passes per cycle before the cycle is declared
    /// non-convergent
    pub max_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// Where the engine is inside a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Evaluating,
    Firing,
    Committing,
}

/// Phase a rule failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePhase {
    When,
    Then,
}

/// One rule's recovered failure within a cycle
#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub phase: RulePhase,
    pub message: String,
}

/// What one cycle did
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    /// Correlation id stamped on this evaluation run
    pub run_id: String,

    /// Evaluation passes executed
    pub passes: usize,

    /// Names of rules whose `then` completed, in firing order
    pub fired: Vec<String>,

    /// Mutations committed across all passes
    pub mutations: usize,

    /// Whether the cycle reached a fixed point within the pass cap
    pub converged: bool,

    /// Whether the cycle was cancelled cooperatively
    pub cancelled: bool,

    /// Per-rule failures recovered during the cycle
    pub failures: Vec<RuleFailure>,
}

/// Fatal error while applying queued mutations
///
/// Partial application would corrupt the snapshot, so this propagates to the
/// caller instead of being recovered per rule.
#[derive(Debug, Error)]
pub enum CommitFailure {
    #[error("failed to apply committed write: {0}")]
    Apply(#[from] FactsError),

    #[error("outbound write for {attribute} failed")]
    Dispatch {
        attribute: AttributeRef,
        #[source]
        source: WriteError,
    },
}

/// Cooperative cancellation flag for a cycle in progress
///
/// Checked between rule evaluations and between firings, never mid-`then`.
/// A cancelled cycle still commits the writes of `then` phases that already
/// executed.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Evaluates deployed rulesets against the fact store
///
/// `W` is the outbound persistence sink for committed mutations. The fact
/// store is exclusively owned by the engine; hosts feed it via [`ingest`]
/// between cycles and read it via [`facts`].
///
/// [`ingest`]: RuleEngine::ingest
/// [`facts`]: RuleEngine::facts
pub struct RuleEngine<W: AssetWriter> {
    facts: FactStore,
    deployments: Vec<RulesetDeployment>,
    writer: W,
    clock: RulesClock,
    config: EngineConfig,
    state: EngineState,
    cycle: u64,
    cancel: CancellationHandle,
}

impl<W: AssetWriter> RuleEngine<W> {
    pub fn new(writer: W) -> Self {
        Self {
            facts: FactStore::new(),
            deployments: Vec::new(),
            writer,
            clock: RulesClock::default(),
            config: EngineConfig::default(),
            state: EngineState::Idle,
            cycle: 0,
            cancel: CancellationHandle::default(),
        }
    }

    pub fn with_clock(mut self, clock: RulesClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a ruleset; rules evaluate in deployment order, then
    /// declaration order
    pub fn deploy(&mut self, ruleset: Ruleset) -> Result<(), DeployError> {
        if self.deployments.iter().any(|d| d.ruleset.name == ruleset.name) {
            return Err(DeployError::DuplicateRuleset(ruleset.name));
        }
        self.deployments.push(RulesetDeployment::new(ruleset)?);
        Ok(())
    }

    pub fn pause(&mut self, ruleset: &str) -> Result<(), DeployError> {
        self.deployment_mut(ruleset)?.pause();
        Ok(())
    }

    pub fn resume(&mut self, ruleset: &str) -> Result<(), DeployError> {
        self.deployment_mut(ruleset)?.resume();
        Ok(())
    }

    fn deployment_mut(&mut self, ruleset: &str) -> Result<&mut RulesetDeployment, DeployError> {
        self.deployments
            .iter_mut()
            .find(|d| d.ruleset.name == ruleset)
            .ok_or_else(|| DeployError::NotFound(ruleset.to_string()))
    }

    pub fn deployments(&self) -> &[RulesetDeployment] {
        &self.deployments
    }

    /// Admit an asset snapshot batch and an event batch at a cycle boundary
    pub fn ingest(&mut self, assets: Vec<Asset>, events: Vec<AttributeEvent>) {
        self.facts.ingest(assets, events);
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Completed cycle count
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Handle for cancelling a cycle in progress from outside
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Run one full evaluate-fire-commit cycle to its fixed point
    ///
    /// Per-rule errors are recovered locally and reported in the outcome;
    /// a [`CommitFailure`] aborts the cycle and propagates, since the
    /// snapshot's integrity can no longer be guaranteed.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, CommitFailure> {
        self.cycle += 1;
        let now = self.clock.now();
        let run_id = Ulid::new().to_string();
        let span = tracing::debug_span!("rules_cycle", run = run_id.as_str(), cycle = self.cycle);
        let _guard = span.enter();

        self.cancel.reset();
        self.facts.sweep_expired_facts(now);

        let mut outcome = CycleOutcome {
            run_id,
            passes: 0,
            fired: Vec::new(),
            mutations: 0,
            converged: false,
            cancelled: false,
            failures: Vec::new(),
        };

        let result = self.drive_to_fixed_point(now, &mut outcome);

        // Events and bindings never outlive the cycle that consumed them
        self.facts.clear_events();
        self.facts.clear_all_bindings();
        self.state = EngineState::Idle;

        result.map(|()| outcome)
    }

    fn drive_to_fixed_point(
        &mut self,
        now: chrono::DateTime<chrono::Utc>,
        outcome: &mut CycleOutcome,
    ) -> Result<(), CommitFailure> {
        loop {
            if outcome.passes >= self.config.max_passes {
                let message = format!("did not converge after {} passes", outcome.passes);
                warn!(
                    passes = outcome.passes,
                    cycle = self.cycle,
                    "Rules loop detected; halting evaluation run"
                );
                for deployment in self.deployments.iter_mut().filter(|d| d.is_active()) {
                    deployment.mark_loop_error(message.clone());
                }
                outcome.converged = false;
                return Ok(());
            }
            outcome.passes += 1;

            // Step 2: evaluate every rule's `when` against the snapshot
            self.state = EngineState::Evaluating;
            let mut queued: Vec<(usize, usize)> = Vec::new();
            let mut errored: Vec<(usize, String)> = Vec::new();
            'eval: for (d_idx, deployment) in self.deployments.iter().enumerate() {
                if !deployment.is_active() {
                    continue;
                }
                for (r_idx, rule) in deployment.ruleset.rules().iter().enumerate() {
                    if self.cancel.is_cancelled() {
                        outcome.cancelled = true;
                        break 'eval;
                    }
                    // Each rule starts its evaluation with a clean binding slate
                    self.facts.clear_bindings_for(rule.name());
                    let mut handle = FactsHandle::new(&mut self.facts, rule.name(), now);
                    match rule.when(&mut handle) {
                        Ok(true) => {
                            trace!(rule = rule.name(), "Rule candidate matched");
                            queued.push((d_idx, r_idx));
                        }
                        Ok(false) => {}
                        Err(err) => {
                            warn!(
                                rule = rule.name(),
                                cycle = self.cycle,
                                %err,
                                "Rule evaluation failed; rule skipped for this cycle"
                            );
                            errored.push((d_idx, format!("{}: {err}", rule.name())));
                            outcome.failures.push(RuleFailure {
                                rule: rule.name().to_string(),
                                phase: RulePhase::When,
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
            for (idx, message) in errored {
                self.deployments[idx].mark_execution_error(message);
            }

            // Step 3: fire queued rules in the same order
            self.state = EngineState::Firing;
            let mut errored: Vec<(usize, String)> = Vec::new();
            for (d_idx, r_idx) in queued {
                if outcome.cancelled || self.cancel.is_cancelled() {
                    // Already-executed firings still commit below
                    outcome.cancelled = true;
                    break;
                }
                let rule = &self.deployments[d_idx].ruleset.rules()[r_idx];
                let mut handle = FactsHandle::new(&mut self.facts, rule.name(), now);
                match rule.then(&mut handle) {
                    Ok(()) => {
                        debug!(rule = rule.name(), "Rule fired");
                        outcome.fired.push(rule.name().to_string());
                    }
                    Err(err) => {
                        warn!(
                            rule = rule.name(),
                            cycle = self.cycle,
                            %err,
                            "Rule action failed; firing aborted"
                        );
                        errored.push((d_idx, format!("{}: {err}", rule.name())));
                        outcome.failures.push(RuleFailure {
                            rule: rule.name().to_string(),
                            phase: RulePhase::Then,
                            message: err.to_string(),
                        });
                    }
                }
            }
            for (idx, message) in errored {
                self.deployments[idx].mark_execution_error(message);
            }

            // Step 4: apply queued writes atomically, last-write-wins per
            // attribute, and dispatch each committed mutation outbound
            self.state = EngineState::Committing;
            let writes = self.facts.take_pending_writes();
            if writes.is_empty() {
                outcome.converged = !outcome.cancelled;
                debug!(passes = outcome.passes, "Cycle reached fixed point");
                return Ok(());
            }

            let mut next_events = Vec::with_capacity(writes.len());
            for (attribute_ref, value) in writes {
                let event = self.facts.apply_write(&attribute_ref, value, now)?;
                self.writer.write(&event).map_err(|source| {
                    error!(attribute = %attribute_ref, "Outbound write rejected; aborting cycle");
                    CommitFailure::Dispatch {
                        attribute: attribute_ref.clone(),
                        source,
                    }
                })?;
                next_events.push(event);
            }
            outcome.mutations += next_events.len();
            info!(
                mutations = next_events.len(),
                pass = outcome.passes,
                "Committed mutations"
            );

            // Step 5: committed mutations are the next pass's input events
            self.facts.replace_events(next_events);

            if outcome.cancelled {
                return Ok(());
            }
        }
    }
}
