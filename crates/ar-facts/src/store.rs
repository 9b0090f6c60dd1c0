//! The fact store

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, trace};

use ar_core::{Asset, AssetQuery, AssetState, AttributeEvent, AttributeRef, Value};

use crate::error::{FactsError, FactsResult};

/// A named custom fact, optionally expiring
#[derive(Debug, Clone, PartialEq)]
enum NamedFact {
    Durable(Value),
    Temporary {
        value: Value,
        expires_at: DateTime<Utc>,
    },
}

impl NamedFact {
    fn value(&self) -> &Value {
        match self {
            NamedFact::Durable(value) => value,
            NamedFact::Temporary { value, .. } => value,
        }
    }
}

/// Holds all facts visible to rule evaluation
///
/// The store is exclusively owned by the engine during a cycle; rules only
/// observe it through a [`crate::FactsHandle`]. Snapshot iteration follows
/// ingest order and attribute declaration order, which makes `match_first_*`
/// results deterministic across repeated calls within a cycle.
#[derive(Debug, Default)]
pub struct FactStore {
    /// Asset snapshot keyed by asset id, ingest order preserved
    assets: IndexMap<String, Asset>,

    /// Events observed for the current cycle, append-only
    events: Vec<AttributeEvent>,

    /// Custom facts surviving across cycles (rules use these to gate
    /// re-firing)
    named_facts: IndexMap<String, NamedFact>,

    /// Bindings keyed by (rule name, binding name), cleared per rule before
    /// each evaluation of that rule
    bindings: HashMap<(String, String), Value>,

    /// Writes queued by `then` phases, last-write-wins per attribute
    pending_writes: IndexMap<AttributeRef, Value>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Ingest (cycle boundary input) ---

    /// Admit an asset snapshot batch and an event batch
    ///
    /// Assets replace any previous entry with the same id while keeping the
    /// original ingest position; events append to the current cycle's log.
    pub fn ingest(&mut self, assets: Vec<Asset>, events: Vec<AttributeEvent>) {
        debug!(
            assets = assets.len(),
            events = events.len(),
            "Ingesting snapshot and event batch"
        );
        for asset in assets {
            self.assets.insert(asset.id.clone(), asset);
        }
        self.events.extend(events);
    }

    /// Replace the event log with the mutations committed by the previous
    /// pass, which become the next pass's input events
    pub fn replace_events(&mut self, events: Vec<AttributeEvent>) {
        self.events = events;
    }

    /// Drop all events at cycle end
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // --- Snapshot access ---

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// All assets in ingest order
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Flatten the snapshot into state facts, asset ingest order then
    /// attribute declaration order
    pub fn asset_states(&self) -> impl Iterator<Item = AssetState> + '_ {
        self.assets.values().flat_map(|asset| asset.states())
    }

    // --- Queries ---

    /// All snapshot facts satisfying the query, in deterministic order
    pub fn match_asset_states<'a>(
        &'a self,
        query: &'a AssetQuery,
    ) -> impl Iterator<Item = AssetState> + 'a {
        self.asset_states().filter(|state| query.matches_state(state))
    }

    /// First snapshot fact satisfying the query
    pub fn match_first_asset_state(&self, query: &AssetQuery) -> Option<AssetState> {
        self.match_asset_states(query).next()
    }

    /// All event-log facts satisfying the query, in arrival order
    ///
    /// An `attribute_value` predicate matches an event whose observed value
    /// equals the target, independent of whether a later event in the same
    /// cycle changed the attribute again. Asset-level predicates resolve
    /// against the snapshot entry for the event's asset id; an event for an
    /// asset missing from the snapshot can only match attribute predicates.
    pub fn match_asset_events<'a>(
        &'a self,
        query: &'a AssetQuery,
    ) -> impl Iterator<Item = AssetState> + 'a {
        self.events
            .iter()
            .map(|event| self.event_state(event))
            .filter(|state| query.matches_state(state))
    }

    /// First event-log fact satisfying the query
    pub fn match_first_asset_event(&self, query: &AssetQuery) -> Option<AssetState> {
        self.match_asset_events(query).next()
    }

    /// View an event as a state fact, with asset metadata taken from the
    /// snapshot and the value taken from the event
    fn event_state(&self, event: &AttributeEvent) -> AssetState {
        let asset = self.assets.get(&event.asset_id);
        AssetState {
            asset_id: event.asset_id.clone(),
            asset_name: asset.and_then(|a| a.name.clone()),
            asset_type: asset.map(|a| a.asset_type.clone()).unwrap_or_default(),
            parent_id: asset.and_then(|a| a.parent_id.clone()),
            attribute_name: event.attribute_name.clone(),
            value: event.value.clone(),
            timestamp: event.timestamp,
        }
    }

    // --- Bindings ---

    /// Store a binding for the given rule's current firing
    pub fn bind_scoped(&mut self, rule: &str, name: &str, value: Value) {
        trace!(rule, binding = name, "Binding value");
        self.bindings
            .insert((rule.to_string(), name.to_string()), value);
    }

    /// Read back a binding set during the same firing
    pub fn bound_scoped(&self, rule: &str, name: &str) -> FactsResult<Value> {
        self.bindings
            .get(&(rule.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| FactsError::UnboundBinding {
                name: name.to_string(),
            })
    }

    /// Clear one rule's bindings before re-evaluating it
    pub fn clear_bindings_for(&mut self, rule: &str) {
        self.bindings.retain(|(owner, _), _| owner != rule);
    }

    /// Clear every binding at cycle end
    pub fn clear_all_bindings(&mut self) {
        self.bindings.clear();
    }

    // --- Pending writes ---

    /// Queue a write request; the engine applies it at end-of-pass commit
    ///
    /// Re-queuing the same attribute replaces the queued value, so the rule
    /// later in evaluation order wins a collision.
    pub fn update_asset_state(
        &mut self,
        asset_id: impl Into<String>,
        attribute_name: impl Into<String>,
        value: Value,
    ) {
        let attribute_ref = AttributeRef::new(asset_id, attribute_name);
        trace!(attribute = %attribute_ref, %value, "Queueing attribute write");
        self.pending_writes.insert(attribute_ref, value);
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending_writes.is_empty()
    }

    /// Drain the write buffer for commit, in queue order
    pub fn take_pending_writes(&mut self) -> IndexMap<AttributeRef, Value> {
        std::mem::take(&mut self.pending_writes)
    }

    /// Apply one committed mutation to the snapshot
    ///
    /// The target asset must exist; the attribute is created if missing.
    /// Returns the event representing the mutation, which feeds the next
    /// evaluation pass.
    pub fn apply_write(
        &mut self,
        attribute_ref: &AttributeRef,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> FactsResult<AttributeEvent> {
        let asset = self
            .assets
            .get_mut(&attribute_ref.asset_id)
            .ok_or_else(|| FactsError::UnknownAsset {
                asset_id: attribute_ref.asset_id.clone(),
            })?;

        let attribute = asset
            .attributes
            .entry(attribute_ref.attribute_name.clone())
            .or_insert_with(|| {
                ar_core::Attribute::new(
                    attribute_ref.attribute_name.clone(),
                    Value::Null,
                    timestamp,
                )
            });
        attribute.value = value.clone();
        attribute.timestamp = timestamp;

        debug!(attribute = %attribute_ref, %value, "Committed attribute write");
        Ok(AttributeEvent::new(
            attribute_ref.asset_id.clone(),
            attribute_ref.attribute_name.clone(),
            value,
            timestamp,
        ))
    }

    // --- Named custom facts ---

    /// Insert or replace a named fact; named facts survive across cycles
    pub fn put_fact(&mut self, name: impl Into<String>, value: Value) {
        self.named_facts
            .insert(name.into(), NamedFact::Durable(value));
    }

    /// Insert a named fact that expires after `ttl`
    pub fn put_temporary_fact(
        &mut self,
        name: impl Into<String>,
        ttl: Duration,
        value: Value,
        now: DateTime<Utc>,
    ) {
        self.named_facts.insert(
            name.into(),
            NamedFact::Temporary {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.named_facts.get(name).map(NamedFact::value)
    }

    pub fn remove_fact(&mut self, name: &str) -> Option<Value> {
        self.named_facts
            .shift_remove(name)
            .map(|fact| fact.value().clone())
    }

    /// Drop expired temporary facts; runs at the snapshot step of each cycle
    pub fn sweep_expired_facts(&mut self, now: DateTime<Utc>) {
        self.named_facts.retain(|name, fact| match fact {
            NamedFact::Durable(_) => true,
            NamedFact::Temporary { expires_at, .. } => {
                let keep = *expires_at > now;
                if !keep {
                    trace!(fact = name.as_str(), "Expiring temporary fact");
                }
                keep
            }
        });
    }
}
