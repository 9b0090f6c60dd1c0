//! Asset type representing a node in the managed asset hierarchy

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{AssetState, Attribute, Value};

/// A node in the asset tree (e.g. a room inside a residence)
///
/// Assets are created and deleted only by the external asset service; the
/// rule engine holds a read-through snapshot and requests attribute writes.
/// Attribute iteration follows declaration order, which keeps query results
/// deterministic across repeated calls within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique, stable identifier
    pub id: String,

    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Type discriminator (e.g. "Room", "Residence")
    #[serde(rename = "type")]
    pub asset_type: String,

    /// Parent asset id; root assets have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Attributes keyed by name
    #[serde(default)]
    pub attributes: IndexMap<String, Attribute>,
}

impl Asset {
    /// Create an asset with no attributes
    pub fn new(id: impl Into<String>, asset_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            asset_type: asset_type.into(),
            parent_id: None,
            attributes: IndexMap::new(),
        }
    }

    /// Set the human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parent asset id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Add or replace an attribute
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        self.attributes
            .insert(name.clone(), Attribute::new(name, value, timestamp));
        self
    }

    /// Get an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check whether the asset carries an attribute with the given name
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Flatten this asset into one [`AssetState`] fact per attribute,
    /// in attribute declaration order
    pub fn states(&self) -> impl Iterator<Item = AssetState> + '_ {
        self.attributes.values().map(move |attr| AssetState::of(self, attr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_attribute_access() {
        let asset = Asset::new("a1", "Room")
            .with_name("Bedroom")
            .with_parent("res1")
            .with_attribute("lightSwitch", json!(true), ts());

        assert!(asset.has_attribute("lightSwitch"));
        assert!(!asset.has_attribute("motionSensor"));
        assert_eq!(asset.attribute("lightSwitch").unwrap().value, json!(true));
        assert_eq!(asset.parent_id.as_deref(), Some("res1"));
    }

    #[test]
    fn test_states_flatten_in_declaration_order() {
        let asset = Asset::new("a1", "Room")
            .with_attribute("b", json!(1), ts())
            .with_attribute("a", json!(2), ts());

        let names: Vec<_> = asset.states().map(|s| s.attribute_name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_state_carries_asset_metadata() {
        let asset = Asset::new("a1", "Room")
            .with_parent("res1")
            .with_attribute("lightSwitch", json!(false), ts());

        let state = asset.states().next().unwrap();
        assert_eq!(state.asset_id, "a1");
        assert_eq!(state.asset_type, "Room");
        assert_eq!(state.parent_id.as_deref(), Some("res1"));
        assert_eq!(state.value, json!(false));
    }
}
