//! The sample scenario driven by a declarative ruleset definition

mod common;

use serde_json::json;

use ar_core::AttributeRef;
use ar_engine::{RuleEngine, RulesClock, RulesetConfig};

use common::{lights_off_event, recording_writer, residence_assets, ts};

const RESIDENCE_RULES: &str = r#"{
    "name": "residence",
    "rules": [{
        "name": "All lights off in residence",
        "when": {
            "type": "all",
            "conditions": [
                {
                    "type": "asset_event",
                    "query": {
                        "types": ["Residence"],
                        "attribute_values": [
                            {"name": "allLightsOffSwitch", "value": true}
                        ]
                    }
                },
                {
                    "type": "asset_state",
                    "query": {
                        "types": ["Room"],
                        "attribute_values": [
                            {"name": "lightSwitch", "value": true}
                        ]
                    },
                    "bind": "room"
                }
            ]
        },
        "then": [{
            "action": "write_attribute",
            "bound": "room",
            "attribute_name": "lightSwitch",
            "value": false
        }]
    }]
}"#;

#[test]
fn test_declarative_ruleset_drives_the_sample_scenario() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));

    let ruleset = RulesetConfig::from_json(RESIDENCE_RULES).unwrap().compile().unwrap();
    engine.deploy(ruleset).unwrap();

    engine.ingest(residence_assets(true, true), vec![lights_off_event(true)]);
    let outcome = engine.run_cycle().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.fired, vec!["All lights off in residence"]);

    let written = written.borrow();
    assert_eq!(written.len(), 1);
    assert_eq!(
        written[0].attribute_ref(),
        AttributeRef::new("r1", "lightSwitch")
    );
    assert_eq!(written[0].value, json!(false));
}

#[test]
fn test_declarative_ruleset_holds_when_no_event_arrived() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));

    let ruleset = RulesetConfig::from_json(RESIDENCE_RULES).unwrap().compile().unwrap();
    engine.deploy(ruleset).unwrap();

    // Steady state says the flag is on, but no change was observed this cycle
    engine.ingest(residence_assets(true, true), vec![]);
    let outcome = engine.run_cycle().unwrap();

    assert_eq!(outcome.mutations, 0);
    assert!(written.borrow().is_empty());
}
