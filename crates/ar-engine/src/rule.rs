//! Rule definitions
//!
//! A rule is one unit of reactive logic: a `when` predicate evaluated
//! against the fact store and a `then` action executed in the same cycle if
//! the predicate held. Rules carry no mutable state of their own; everything
//! they pass between the two phases goes through bindings on the facts
//! handle.

use thiserror::Error;

use ar_core::MalformedQuery;
use ar_facts::{FactsError, FactsHandle};

/// Errors surfaced from a rule's `when` or `then`
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Facts(#[from] FactsError),

    #[error(transparent)]
    Query(#[from] MalformedQuery),

    #[error("{0}")]
    Other(String),
}

impl RuleError {
    /// Convenience for rule authors raising domain-specific failures
    pub fn other(message: impl Into<String>) -> Self {
        RuleError::Other(message.into())
    }
}

/// Result type for rule phases
pub type RuleResult<T> = Result<T, RuleError>;

/// One unit of reactive logic
///
/// `when` must be a pure read of the facts (queries and bindings, with
/// `bind` as its only side effect). `then` runs only if `when` returned true
/// in the same cycle, reads its own bindings, and issues write requests.
/// Implementations must not rely on evaluation order relative to other
/// rules beyond "deterministic".
pub trait Rule {
    fn name(&self) -> &str;

    fn when(&self, facts: &mut FactsHandle<'_>) -> RuleResult<bool>;

    fn then(&self, facts: &mut FactsHandle<'_>) -> RuleResult<()>;
}

type WhenFn = Box<dyn Fn(&mut FactsHandle<'_>) -> RuleResult<bool> + Send + Sync>;
type ThenFn = Box<dyn Fn(&mut FactsHandle<'_>) -> RuleResult<()> + Send + Sync>;

/// A rule backed by closures, the usual shape for programmatic rulesets
pub struct FnRule {
    name: String,
    when: WhenFn,
    then: ThenFn,
}

impl Rule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn when(&self, facts: &mut FactsHandle<'_>) -> RuleResult<bool> {
        (self.when)(facts)
    }

    fn then(&self, facts: &mut FactsHandle<'_>) -> RuleResult<()> {
        (self.then)(facts)
    }
}

impl std::fmt::Debug for FnRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRule").field("name", &self.name).finish()
    }
}

/// Error raised when a rule definition is structurally incomplete
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleDefinitionError {
    #[error("rule `{0}` has no `when` closure")]
    MissingWhen(String),

    #[error("rule `{0}` has no `then` closure")]
    MissingThen(String),
}

/// Chained builder for [`FnRule`], validated once at build time
///
/// ```
/// use ar_engine::RuleBuilder;
///
/// let rule = RuleBuilder::new("All lights off")
///     .when(|facts| Ok(facts.fact("armed").is_some()))
///     .then(|facts| {
///         facts.update_asset_state("r1", "lightSwitch", serde_json::json!(false));
///         Ok(())
///     })
///     .build()
///     .unwrap();
/// ```
pub struct RuleBuilder {
    name: String,
    when: Option<WhenFn>,
    then: Option<ThenFn>,
}

impl RuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: None,
            then: None,
        }
    }

    pub fn when<F>(mut self, when: F) -> Self
    where
        F: Fn(&mut FactsHandle<'_>) -> RuleResult<bool> + Send + Sync + 'static,
    {
        self.when = Some(Box::new(when));
        self
    }

    pub fn then<F>(mut self, then: F) -> Self
    where
        F: Fn(&mut FactsHandle<'_>) -> RuleResult<()> + Send + Sync + 'static,
    {
        self.then = Some(Box::new(then));
        self
    }

    pub fn build(self) -> Result<FnRule, RuleDefinitionError> {
        let when = self
            .when
            .ok_or_else(|| RuleDefinitionError::MissingWhen(self.name.clone()))?;
        let then = self
            .then
            .ok_or_else(|| RuleDefinitionError::MissingThen(self.name.clone()))?;
        Ok(FnRule {
            name: self.name,
            when,
            then,
        })
    }
}

/// An ordered collection of rules active in one engine instance
///
/// Rules are loaded once per ruleset activation and immutable afterwards.
/// Rule names must be unique within the ruleset; duplicates are rejected at
/// deployment.
pub struct Ruleset {
    pub name: String,
    rules: Vec<Box<dyn Rule>>,
}

impl Ruleset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule, preserving declaration order
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Append an already-boxed rule
    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("name", &self.name)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}
