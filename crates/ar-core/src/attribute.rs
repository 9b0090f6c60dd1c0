//! Attribute types: a named, typed, timestamped value owned by an asset

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Value;

/// A named value belonging to exactly one asset
///
/// Attributes are mutated either by the external asset service (observed as
/// an [`crate::AttributeEvent`]) or by a rule's `then` phase (emitted as an
/// outbound write request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name, unique within the owning asset
    pub name: String,

    /// Current value
    pub value: Value,

    /// When the value was last updated
    pub timestamp: DateTime<Utc>,
}

impl Attribute {
    /// Create an attribute with an explicit timestamp
    pub fn new(name: impl Into<String>, value: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

/// Reference to one attribute of one asset
///
/// Used as the key for write collision bookkeeping: queued writes are
/// last-write-wins per `AttributeRef` within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    pub asset_id: String,
    pub attribute_name: String,
}

impl AttributeRef {
    pub fn new(asset_id: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            attribute_name: attribute_name.into(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.asset_id, self.attribute_name)
    }
}
