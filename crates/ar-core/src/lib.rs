//! Core types for the asset rule engine
//!
//! This crate provides the fundamental types shared by the fact store and the
//! rule engine: Asset, Attribute, AttributeRef, AttributeEvent, the flattened
//! AssetState fact, and the declarative AssetQuery filter.

mod asset;
mod attribute;
mod event;
mod query;
mod state;

pub use asset::Asset;
pub use attribute::{Attribute, AttributeRef};
pub use event::AttributeEvent;
pub use query::{
    AssetQuery, AssetQueryBuilder, AttributeValuePredicate, MalformedQuery, Match, StringPredicate,
};
pub use state::AssetState;

/// Attribute values are plain JSON values; semantics are defined by the
/// attribute's type in the external asset service (e.g. boolean for a switch).
pub type Value = serde_json::Value;
