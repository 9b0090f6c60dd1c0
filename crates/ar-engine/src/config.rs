//! Declarative rule definitions
//!
//! Rulesets can be supplied as JSON or YAML documents instead of closures.
//! A definition is compiled once at load time into ordinary [`Rule`]s; all
//! structural problems (malformed queries, ambiguous write targets) surface
//! as [`CompileError`]s before the ruleset ever evaluates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ar_core::{AssetQuery, AssetQueryBuilder, MalformedQuery, Value};
use ar_facts::FactsHandle;

use crate::rule::{Rule, RuleError, RuleResult, Ruleset};

/// Errors raised while compiling a declarative ruleset
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to parse ruleset definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse ruleset definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("rule `{rule}` has a malformed query")]
    Query {
        rule: String,
        #[source]
        source: MalformedQuery,
    },

    #[error("rule `{rule}` write action needs exactly one of `asset_id` or `bound`")]
    AmbiguousWriteTarget { rule: String },
}

/// A whole ruleset definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetConfig {
    pub name: String,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One declarative rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,

    pub when: WhenConfig,

    #[serde(default)]
    pub then: Vec<ActionConfig>,
}

/// Condition tree evaluated as the rule's `when`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WhenConfig {
    /// Match the current snapshot; optionally bind the first match for the
    /// `then` phase
    AssetState {
        query: AssetQueryBuilder,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind: Option<String>,
    },

    /// Match the cycle's event log
    AssetEvent {
        query: AssetQueryBuilder,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind: Option<String>,
    },

    /// All conditions must hold
    All { conditions: Vec<WhenConfig> },

    /// Any condition must hold
    Any { conditions: Vec<WhenConfig> },

    /// Condition must not hold
    Not { condition: Box<WhenConfig> },
}

/// Action executed in the rule's `then`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Queue an attribute write, targeting either an explicit asset id or
    /// the asset captured by a `when` binding
    WriteAttribute {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset_id: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        bound: Option<String>,

        attribute_name: String,

        value: Value,
    },
}

impl RulesetConfig {
    pub fn from_json(definition: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(definition)?)
    }

    pub fn from_yaml(definition: &str) -> Result<Self, CompileError> {
        Ok(serde_yaml::from_str(definition)?)
    }

    /// Validate and compile into an ordinary ruleset
    pub fn compile(self) -> Result<Ruleset, CompileError> {
        let mut ruleset = Ruleset::new(self.name);
        for rule in self.rules {
            let compiled = CompiledRule::compile(rule)?;
            ruleset.push(Box::new(compiled));
        }
        Ok(ruleset)
    }
}

enum CompiledWhen {
    AssetState {
        query: AssetQuery,
        bind: Option<String>,
    },
    AssetEvent {
        query: AssetQuery,
        bind: Option<String>,
    },
    All(Vec<CompiledWhen>),
    Any(Vec<CompiledWhen>),
    Not(Box<CompiledWhen>),
}

impl CompiledWhen {
    fn compile(config: WhenConfig, rule: &str) -> Result<Self, CompileError> {
        let build = |query: AssetQueryBuilder| {
            query.build().map_err(|source| CompileError::Query {
                rule: rule.to_string(),
                source,
            })
        };
        Ok(match config {
            WhenConfig::AssetState { query, bind } => CompiledWhen::AssetState {
                query: build(query)?,
                bind,
            },
            WhenConfig::AssetEvent { query, bind } => CompiledWhen::AssetEvent {
                query: build(query)?,
                bind,
            },
            WhenConfig::All { conditions } => CompiledWhen::All(
                conditions
                    .into_iter()
                    .map(|c| Self::compile(c, rule))
                    .collect::<Result<_, _>>()?,
            ),
            WhenConfig::Any { conditions } => CompiledWhen::Any(
                conditions
                    .into_iter()
                    .map(|c| Self::compile(c, rule))
                    .collect::<Result<_, _>>()?,
            ),
            WhenConfig::Not { condition } => {
                CompiledWhen::Not(Box::new(Self::compile(*condition, rule)?))
            }
        })
    }

    fn eval(&self, facts: &mut FactsHandle<'_>) -> RuleResult<bool> {
        match self {
            CompiledWhen::AssetState { query, bind } => {
                match facts.match_first_asset_state(query) {
                    Some(state) => {
                        bind_state(facts, bind.as_deref(), &state)?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            CompiledWhen::AssetEvent { query, bind } => {
                match facts.match_first_asset_event(query) {
                    Some(state) => {
                        bind_state(facts, bind.as_deref(), &state)?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            CompiledWhen::All(conditions) => {
                for condition in conditions {
                    if !condition.eval(facts)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CompiledWhen::Any(conditions) => {
                for condition in conditions {
                    if condition.eval(facts)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CompiledWhen::Not(condition) => Ok(!condition.eval(facts)?),
        }
    }
}

fn bind_state(
    facts: &mut FactsHandle<'_>,
    bind: Option<&str>,
    state: &ar_core::AssetState,
) -> RuleResult<()> {
    if let Some(name) = bind {
        let value = serde_json::to_value(state)
            .map_err(|err| RuleError::other(format!("cannot bind matched state: {err}")))?;
        facts.bind(name, value);
    }
    Ok(())
}

enum WriteTarget {
    Asset(String),
    Bound(String),
}

enum CompiledAction {
    WriteAttribute {
        target: WriteTarget,
        attribute_name: String,
        value: Value,
    },
}

impl CompiledAction {
    fn compile(config: ActionConfig, rule: &str) -> Result<Self, CompileError> {
        match config {
            ActionConfig::WriteAttribute {
                asset_id,
                bound,
                attribute_name,
                value,
            } => {
                let target = match (asset_id, bound) {
                    (Some(id), None) => WriteTarget::Asset(id),
                    (None, Some(binding)) => WriteTarget::Bound(binding),
                    _ => {
                        return Err(CompileError::AmbiguousWriteTarget {
                            rule: rule.to_string(),
                        })
                    }
                };
                Ok(CompiledAction::WriteAttribute {
                    target,
                    attribute_name,
                    value,
                })
            }
        }
    }

    fn run(&self, facts: &mut FactsHandle<'_>) -> RuleResult<()> {
        match self {
            CompiledAction::WriteAttribute {
                target,
                attribute_name,
                value,
            } => {
                let asset_id = match target {
                    WriteTarget::Asset(id) => id.clone(),
                    WriteTarget::Bound(binding) => {
                        let state = facts.bound(binding)?;
                        state
                            .get("asset_id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| {
                                RuleError::other(format!(
                                    "binding `{binding}` does not hold an asset state"
                                ))
                            })?
                    }
                };
                facts.update_asset_state(asset_id, attribute_name.clone(), value.clone());
                Ok(())
            }
        }
    }
}

/// A declarative rule compiled to the engine's `Rule` shape
struct CompiledRule {
    name: String,
    when: CompiledWhen,
    then: Vec<CompiledAction>,
}

impl CompiledRule {
    fn compile(config: RuleConfig) -> Result<Self, CompileError> {
        let when = CompiledWhen::compile(config.when, &config.name)?;
        let then = config
            .then
            .into_iter()
            .map(|action| CompiledAction::compile(action, &config.name))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            name: config.name,
            when,
            then,
        })
    }
}

impl Rule for CompiledRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn when(&self, facts: &mut FactsHandle<'_>) -> RuleResult<bool> {
        self.when.eval(facts)
    }

    fn then(&self, facts: &mut FactsHandle<'_>) -> RuleResult<()> {
        for action in &self.then {
            action.run(facts)?;
        }
        Ok(())
    }
}
