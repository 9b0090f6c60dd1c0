//! When/then rule engine for asset state
//!
//! This crate ties rule definitions to the fact store and drives repeated
//! evaluation passes to a fixed point. A cycle admits the event batch,
//! evaluates every rule's `when` against the snapshot, fires the `then` of
//! rules that matched, commits the queued writes atomically, and repeats
//! with the committed mutations as the next pass's events until no mutation
//! occurs or the pass cap is hit.
//!
//! Writes made by a `then` phase become visible to other rules only at the
//! next pass, via full re-snapshot; there is no intra-pass visibility.

mod clock;
mod config;
mod deployment;
mod engine;
mod rule;
mod writer;

pub use clock::RulesClock;
pub use config::{
    ActionConfig, CompileError, RuleConfig, RulesetConfig, WhenConfig,
};
pub use deployment::{DeployError, RulesetDeployment, RulesetStatus};
pub use engine::{
    CancellationHandle, CommitFailure, CycleOutcome, EngineConfig, EngineState, RuleEngine,
    RuleFailure, RulePhase, DEFAULT_MAX_PASSES,
};
pub use rule::{FnRule, Rule, RuleBuilder, RuleDefinitionError, RuleError, RuleResult, Ruleset};
pub use writer::{AssetWriter, WriteError};
