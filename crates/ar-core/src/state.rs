//! Flattened asset state facts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Asset, Attribute, AttributeRef, Value};

/// One (asset, attribute) pair as a single queryable fact
///
/// The fact store flattens every asset in the snapshot into one `AssetState`
/// per attribute; queries run over these facts rather than over the asset
/// tree. Event-log queries produce the same shape, with `value` taken from
/// the observed event rather than the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetState {
    pub asset_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,

    pub asset_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub attribute_name: String,

    pub value: Value,

    pub timestamp: DateTime<Utc>,
}

impl AssetState {
    /// Build the fact for one attribute of an asset
    pub fn of(asset: &Asset, attribute: &Attribute) -> Self {
        Self {
            asset_id: asset.id.clone(),
            asset_name: asset.name.clone(),
            asset_type: asset.asset_type.clone(),
            parent_id: asset.parent_id.clone(),
            attribute_name: attribute.name.clone(),
            value: attribute.value.clone(),
            timestamp: attribute.timestamp,
        }
    }

    /// The attribute this fact describes
    pub fn attribute_ref(&self) -> AttributeRef {
        AttributeRef::new(self.asset_id.clone(), self.attribute_name.clone())
    }
}
