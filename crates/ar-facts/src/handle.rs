//! The facts handle passed to rule `when`/`then` closures

use chrono::{DateTime, Duration, Utc};

use ar_core::{AssetQuery, AssetState, Value};

use crate::error::FactsResult;
use crate::store::FactStore;

/// A rule's window onto the fact store
///
/// The handle is created fresh for each `when`/`then` call, scoped to the
/// evaluating rule's name so bindings cannot leak across rules. Rules never
/// receive a reference to the store's internal collections.
pub struct FactsHandle<'a> {
    store: &'a mut FactStore,
    rule: &'a str,
    now: DateTime<Utc>,
}

impl<'a> FactsHandle<'a> {
    pub fn new(store: &'a mut FactStore, rule: &'a str, now: DateTime<Utc>) -> Self {
        Self { store, rule, now }
    }

    /// The evaluating rule's name
    pub fn rule(&self) -> &str {
        self.rule
    }

    /// The engine clock's notion of now for this cycle
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    // --- Queries ---

    /// First snapshot fact satisfying the query, or `None` if nothing
    /// matches (a malformed query never reaches here; it fails at `build`)
    pub fn match_first_asset_state(&self, query: &AssetQuery) -> Option<AssetState> {
        self.store.match_first_asset_state(query)
    }

    /// All snapshot facts satisfying the query, in deterministic order
    pub fn match_asset_states(&self, query: &AssetQuery) -> Vec<AssetState> {
        self.store.match_asset_states(query).collect()
    }

    /// First event-log fact satisfying the query — "did a change to this
    /// value arrive this cycle", not "is the state currently this value"
    pub fn match_first_asset_event(&self, query: &AssetQuery) -> Option<AssetState> {
        self.store.match_first_asset_event(query)
    }

    /// All event-log facts satisfying the query, in arrival order
    pub fn match_asset_events(&self, query: &AssetQuery) -> Vec<AssetState> {
        self.store.match_asset_events(query).collect()
    }

    // --- Bindings (when -> then transport within one firing) ---

    /// Bind a value for this rule's `then` phase
    pub fn bind(&mut self, name: &str, value: Value) {
        self.store.bind_scoped(self.rule, name, value);
    }

    /// Read a binding set during this firing's `when` phase
    pub fn bound(&self, name: &str) -> FactsResult<Value> {
        self.store.bound_scoped(self.rule, name)
    }

    // --- Mutation requests ---

    /// Request an attribute write; applied by the engine at end-of-pass
    /// commit, never synchronously
    pub fn update_asset_state(
        &mut self,
        asset_id: impl Into<String>,
        attribute_name: impl Into<String>,
        value: Value,
    ) {
        self.store.update_asset_state(asset_id, attribute_name, value);
    }

    // --- Named custom facts ---

    pub fn put_fact(&mut self, name: impl Into<String>, value: Value) {
        self.store.put_fact(name, value);
    }

    /// Insert a named fact that expires after `ttl`
    pub fn put_temporary_fact(&mut self, name: impl Into<String>, ttl: Duration, value: Value) {
        self.store.put_temporary_fact(name, ttl, value, self.now);
    }

    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.store.fact(name)
    }

    pub fn remove_fact(&mut self, name: &str) -> Option<Value> {
        self.store.remove_fact(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_core::Asset;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_handle_scopes_bindings_to_its_rule() {
        let mut store = FactStore::new();

        let mut handle = FactsHandle::new(&mut store, "rule-a", ts());
        handle.bind("room", json!("r1"));
        assert_eq!(handle.bound("room").unwrap(), json!("r1"));

        let handle = FactsHandle::new(&mut store, "rule-b", ts());
        assert!(handle.bound("room").is_err());
    }

    #[test]
    fn test_update_via_handle_is_not_applied_synchronously() {
        let mut store = FactStore::new();
        store.ingest(
            vec![Asset::new("r1", "Room").with_attribute("lightSwitch", json!(true), ts())],
            vec![],
        );

        let mut handle = FactsHandle::new(&mut store, "rule-a", ts());
        handle.update_asset_state("r1", "lightSwitch", json!(false));

        // Still visible as true through the same handle; only commit applies it
        let query = AssetQuery::new()
            .attribute_value("lightSwitch", json!(true))
            .build()
            .unwrap();
        assert!(handle.match_first_asset_state(&query).is_some());
        assert!(store.has_pending_writes());
    }
}
