//! Ruleset deployment lifecycle

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

use crate::rule::Ruleset;

/// Deployment errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("ruleset `{ruleset}` contains duplicate rule name `{rule}`")]
    DuplicateRuleName { ruleset: String, rule: String },

    #[error("a ruleset named `{0}` is already deployed")]
    DuplicateRuleset(String),

    #[error("no deployed ruleset named `{0}`")]
    NotFound(String),
}

/// Lifecycle status of a deployed ruleset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetStatus {
    /// Validated, not yet evaluated
    Ready,

    /// Participating in evaluation cycles
    Deployed,

    /// Skipped during evaluation until resumed
    Paused,

    /// Structural validation failed at load time
    CompilationError,

    /// A rule raised an error during a cycle; the ruleset keeps running
    ExecutionError,

    /// The fixed-point loop hit its pass cap while this ruleset was active
    LoopError,
}

impl std::fmt::Display for RulesetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RulesetStatus::Ready => "ready",
            RulesetStatus::Deployed => "deployed",
            RulesetStatus::Paused => "paused",
            RulesetStatus::CompilationError => "compilation_error",
            RulesetStatus::ExecutionError => "execution_error",
            RulesetStatus::LoopError => "loop_error",
        };
        f.write_str(label)
    }
}

/// A ruleset registered with an engine, plus its lifecycle state
pub struct RulesetDeployment {
    pub ruleset: Ruleset,
    status: RulesetStatus,
    error: Option<String>,
}

impl RulesetDeployment {
    /// Validate the ruleset shape once at load time
    ///
    /// Duplicate rule names are a configuration error; the engine does not
    /// attempt to disambiguate them.
    pub fn new(ruleset: Ruleset) -> Result<Self, DeployError> {
        let mut seen = HashSet::new();
        for rule in ruleset.rules() {
            if !seen.insert(rule.name().to_string()) {
                return Err(DeployError::DuplicateRuleName {
                    ruleset: ruleset.name.clone(),
                    rule: rule.name().to_string(),
                });
            }
        }

        info!(
            ruleset = ruleset.name.as_str(),
            rules = ruleset.len(),
            "Deployed ruleset"
        );
        Ok(Self {
            ruleset,
            status: RulesetStatus::Deployed,
            error: None,
        })
    }

    pub fn status(&self) -> RulesetStatus {
        self.status
    }

    /// Last recorded error message, if the status carries one
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether this deployment's rules take part in evaluation
    pub fn is_active(&self) -> bool {
        !matches!(
            self.status,
            RulesetStatus::Paused | RulesetStatus::CompilationError
        )
    }

    pub fn pause(&mut self) {
        self.status = RulesetStatus::Paused;
    }

    pub fn resume(&mut self) {
        self.status = RulesetStatus::Deployed;
        self.error = None;
    }

    pub(crate) fn mark_execution_error(&mut self, message: String) {
        self.status = RulesetStatus::ExecutionError;
        self.error = Some(message);
    }

    pub(crate) fn mark_loop_error(&mut self, message: String) {
        self.status = RulesetStatus::LoopError;
        self.error = Some(message);
    }
}

impl std::fmt::Debug for RulesetDeployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesetDeployment")
            .field("ruleset", &self.ruleset.name)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleBuilder;

    fn noop_rule(name: &str) -> crate::rule::FnRule {
        RuleBuilder::new(name)
            .when(|_| Ok(false))
            .then(|_| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let ruleset = Ruleset::new("test")
            .with_rule(noop_rule("same"))
            .with_rule(noop_rule("same"));

        let err = RulesetDeployment::new(ruleset).unwrap_err();
        assert_eq!(
            err,
            DeployError::DuplicateRuleName {
                ruleset: "test".into(),
                rule: "same".into()
            }
        );
    }

    #[test]
    fn test_pause_resume() {
        let mut deployment =
            RulesetDeployment::new(Ruleset::new("test").with_rule(noop_rule("r"))).unwrap();
        assert_eq!(deployment.status(), RulesetStatus::Deployed);
        assert!(deployment.is_active());

        deployment.pause();
        assert_eq!(deployment.status(), RulesetStatus::Paused);
        assert!(!deployment.is_active());

        deployment.resume();
        assert!(deployment.is_active());
    }

    #[test]
    fn test_execution_error_keeps_deployment_active() {
        let mut deployment =
            RulesetDeployment::new(Ruleset::new("test").with_rule(noop_rule("r"))).unwrap();
        deployment.mark_execution_error("boom".into());
        assert_eq!(deployment.status(), RulesetStatus::ExecutionError);
        assert_eq!(deployment.error(), Some("boom"));
        assert!(deployment.is_active());
    }
}
