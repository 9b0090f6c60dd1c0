//! Attribute change events observed from the external asset service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AttributeRef, Value};

/// An immutable, time-ordered record of an observed attribute change
///
/// Events are append-only: the fact store keeps a log of the events that
/// arrived for the current evaluation cycle and never mutates them. A rule's
/// committed writes also surface as events for the next evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEvent {
    pub asset_id: String,
    pub attribute_name: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

impl AttributeEvent {
    pub fn new(
        asset_id: impl Into<String>,
        attribute_name: impl Into<String>,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            attribute_name: attribute_name.into(),
            value,
            timestamp,
        }
    }

    /// The attribute this event refers to
    pub fn attribute_ref(&self) -> AttributeRef {
        AttributeRef::new(self.asset_id.clone(), self.attribute_name.clone())
    }
}

impl fmt::Display for AttributeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {} @ {}",
            self.asset_id, self.attribute_name, self.value, self.timestamp
        )
    }
}
