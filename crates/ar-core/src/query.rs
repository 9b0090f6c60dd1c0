//! Declarative asset query filters
//!
//! An [`AssetQuery`] is a pure value object consumed by the fact store's
//! match operations. Queries are assembled with chained builder calls and
//! validated once at construction, so a malformed query surfaces to the rule
//! author as an error instead of silently matching nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AssetState, Value};

/// Error raised at query construction time
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedQuery {
    #[error("query has no predicates")]
    Empty,

    #[error("empty value set for `{0}` predicate")]
    EmptySet(&'static str),

    #[error("conflicting exact-value predicates for attribute `{name}`")]
    ConflictingAttributeValue { name: String },
}

/// String matching options for name predicates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Match {
    #[default]
    Exact,
    Begin,
    End,
    Contains,
}

impl Match {
    fn test(self, pattern: &str, candidate: &str) -> bool {
        match self {
            Match::Exact => candidate == pattern,
            Match::Begin => candidate.starts_with(pattern),
            Match::End => candidate.ends_with(pattern),
            Match::Contains => candidate.contains(pattern),
        }
    }
}

/// A string predicate with a match mode and case-sensitivity flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringPredicate {
    pub value: String,

    #[serde(rename = "match", default)]
    pub match_mode: Match,

    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl StringPredicate {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::with_mode(value, Match::Exact)
    }

    pub fn begins_with(value: impl Into<String>) -> Self {
        Self::with_mode(value, Match::Begin)
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self::with_mode(value, Match::End)
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::with_mode(value, Match::Contains)
    }

    fn with_mode(value: impl Into<String>, match_mode: Match) -> Self {
        Self {
            value: value.into(),
            match_mode,
            case_sensitive: true,
        }
    }

    /// Make the predicate case-insensitive
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Test a candidate string against this predicate
    pub fn test(&self, candidate: &str) -> bool {
        if self.case_sensitive {
            self.match_mode.test(&self.value, candidate)
        } else {
            self.match_mode
                .test(&self.value.to_lowercase(), &candidate.to_lowercase())
        }
    }
}

/// Exact-match predicate on one attribute's current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValuePredicate {
    pub name: String,
    pub value: Value,
}

/// Builder for [`AssetQuery`], chainable in the style of the rule DSL
///
/// Deserializable, so declarative rule definitions carry builders and
/// validate them at ruleset load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetQueryBuilder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    names: Option<Vec<StringPredicate>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute_names: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attribute_values: Vec<AttributeValuePredicate>,
}

impl AssetQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to assets whose type is in the given set
    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to a specific id set
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to children of the given parent assets
    pub fn parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = Some(parents.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict by asset name predicates (all must match)
    pub fn names<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = StringPredicate>,
    {
        self.names = Some(names.into_iter().collect());
        self
    }

    /// Restrict to facts whose attribute name is in the given set
    pub fn attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Require the named attribute to strictly equal the given value
    pub fn attribute_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attribute_values.push(AttributeValuePredicate {
            name: name.into(),
            value,
        });
        self
    }

    /// Validate and produce the query
    pub fn build(self) -> Result<AssetQuery, MalformedQuery> {
        let no_predicates = self.types.is_none()
            && self.ids.is_none()
            && self.parents.is_none()
            && self.names.is_none()
            && self.attribute_names.is_none()
            && self.attribute_values.is_empty();
        if no_predicates {
            return Err(MalformedQuery::Empty);
        }

        check_set("types", &self.types)?;
        check_set("ids", &self.ids)?;
        check_set("parents", &self.parents)?;
        if matches!(&self.names, Some(n) if n.is_empty()) {
            return Err(MalformedQuery::EmptySet("names"));
        }
        check_set("attribute_names", &self.attribute_names)?;

        for (i, pred) in self.attribute_values.iter().enumerate() {
            for other in &self.attribute_values[i + 1..] {
                if pred.name == other.name && pred.value != other.value {
                    return Err(MalformedQuery::ConflictingAttributeValue {
                        name: pred.name.clone(),
                    });
                }
            }
        }

        Ok(AssetQuery {
            types: self.types.unwrap_or_default(),
            ids: self.ids.unwrap_or_default(),
            parents: self.parents.unwrap_or_default(),
            names: self.names.unwrap_or_default(),
            attribute_names: self.attribute_names.unwrap_or_default(),
            attribute_values: self.attribute_values,
        })
    }
}

fn check_set(name: &'static str, values: &Option<Vec<String>>) -> Result<(), MalformedQuery> {
    if matches!(values, Some(v) if v.is_empty()) {
        return Err(MalformedQuery::EmptySet(name));
    }
    Ok(())
}

/// A validated asset query; all predicates are ANDed
///
/// Immutable after construction. Matching runs over flattened
/// [`AssetState`] facts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetQuery {
    types: Vec<String>,
    ids: Vec<String>,
    parents: Vec<String>,
    names: Vec<StringPredicate>,
    attribute_names: Vec<String>,
    attribute_values: Vec<AttributeValuePredicate>,
}

impl AssetQuery {
    /// Start building a query
    pub fn new() -> AssetQueryBuilder {
        AssetQueryBuilder::new()
    }

    /// Test a flattened state fact against every predicate
    pub fn matches_state(&self, state: &AssetState) -> bool {
        if !self.types.is_empty() && !self.types.iter().any(|t| t == &state.asset_type) {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &state.asset_id) {
            return false;
        }
        if !self.parents.is_empty() {
            match &state.parent_id {
                Some(parent) => {
                    if !self.parents.iter().any(|p| p == parent) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.names.is_empty() {
            match &state.asset_name {
                Some(name) => {
                    if !self.names.iter().all(|pred| pred.test(name)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.attribute_names.is_empty()
            && !self.attribute_names.iter().any(|n| n == &state.attribute_name)
        {
            return false;
        }
        self.attribute_values
            .iter()
            .all(|pred| pred.name == state.attribute_name && pred.value == state.value)
    }
}
