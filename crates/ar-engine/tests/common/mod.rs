//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::json;

use ar_core::{Asset, AssetQuery, AttributeEvent};
use ar_engine::{AssetWriter, FnRule, RuleBuilder, RuleError, WriteError};

pub type SharedWrites = Rc<RefCell<Vec<AttributeEvent>>>;

/// A writer that records every dispatched mutation
pub fn recording_writer() -> (SharedWrites, impl AssetWriter) {
    let written: SharedWrites = Rc::new(RefCell::new(Vec::new()));
    let sink = written.clone();
    let writer = move |event: &AttributeEvent| {
        sink.borrow_mut().push(event.clone());
        Ok::<(), WriteError>(())
    };
    (written, writer)
}

pub fn ts() -> DateTime<Utc> {
    "2026-01-01T00:00:00Z".parse().unwrap()
}

/// A residence with one room, the sample topology: the room's light switch
/// is on and the residence-wide lights-off flag is already set
pub fn residence_assets(light_on: bool, all_lights_off: bool) -> Vec<Asset> {
    vec![
        Asset::new("res1", "Residence").with_attribute(
            "allLightsOffSwitch",
            json!(all_lights_off),
            ts(),
        ),
        Asset::new("r1", "Room")
            .with_parent("res1")
            .with_attribute("lightSwitch", json!(light_on), ts()),
    ]
}

pub fn lights_off_event(value: bool) -> AttributeEvent {
    AttributeEvent::new("res1", "allLightsOffSwitch", json!(value), ts())
}

/// The sample rule: when the residence-wide lights-off flag rises and some
/// room still has its light on, switch that room's light off
pub fn all_lights_off_rule() -> FnRule {
    let event_query = AssetQuery::new()
        .types(["Residence"])
        .attribute_value("allLightsOffSwitch", json!(true))
        .build()
        .unwrap();
    let state_query = AssetQuery::new()
        .types(["Room"])
        .attribute_value("lightSwitch", json!(true))
        .build()
        .unwrap();

    RuleBuilder::new("All lights off in residence")
        .when(move |facts| {
            if facts.match_first_asset_event(&event_query).is_none() {
                return Ok(false);
            }
            match facts.match_first_asset_state(&state_query) {
                Some(room) => {
                    facts.bind("room", json!(room.asset_id));
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .then(|facts| {
            let room = facts.bound("room")?;
            let asset_id = room
                .as_str()
                .ok_or_else(|| RuleError::other("room binding is not an asset id"))?
                .to_string();
            facts.update_asset_state(asset_id, "lightSwitch", json!(false));
            Ok(())
        })
        .build()
        .unwrap()
}
