//! End-to-end cycle tests built on the sample residence topology

mod common;

use serde_json::json;

use ar_core::AttributeRef;
use ar_engine::{RuleBuilder, RuleEngine, RuleError, Ruleset, RulesClock};

use common::{
    all_lights_off_rule, lights_off_event, recording_writer, residence_assets, ts,
};

#[test]
fn test_lights_off_event_switches_room_light_off() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));
    engine
        .deploy(Ruleset::new("residence").with_rule(all_lights_off_rule()))
        .unwrap();

    engine.ingest(residence_assets(true, true), vec![lights_off_event(true)]);
    let outcome = engine.run_cycle().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.mutations, 1);
    assert_eq!(outcome.fired, vec!["All lights off in residence"]);

    // Exactly one committed mutation: write(r1, lightSwitch, false)
    let written = written.borrow();
    assert_eq!(written.len(), 1);
    assert_eq!(
        written[0].attribute_ref(),
        AttributeRef::new("r1", "lightSwitch")
    );
    assert_eq!(written[0].value, json!(false));

    // The snapshot reflects the committed write
    let room = engine.facts().asset("r1").unwrap();
    assert_eq!(room.attribute("lightSwitch").unwrap().value, json!(false));
}

#[test]
fn test_no_mutation_when_room_light_already_off() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));
    engine
        .deploy(Ruleset::new("residence").with_rule(all_lights_off_rule()))
        .unwrap();

    engine.ingest(residence_assets(false, true), vec![lights_off_event(true)]);
    let outcome = engine.run_cycle().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.mutations, 0);
    assert!(outcome.fired.is_empty());
    assert!(written.borrow().is_empty());
}

#[test]
fn test_no_mutation_when_flag_is_lowered() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));
    engine
        .deploy(Ruleset::new("residence").with_rule(all_lights_off_rule()))
        .unwrap();

    // The room's light is on, but the observed change was *to* false
    engine.ingest(residence_assets(true, false), vec![lights_off_event(false)]);
    let outcome = engine.run_cycle().unwrap();

    assert_eq!(outcome.mutations, 0);
    assert!(written.borrow().is_empty());
}

#[test]
fn test_idle_cycle_is_idempotent() {
    let (written, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));
    engine
        .deploy(Ruleset::new("residence").with_rule(all_lights_off_rule()))
        .unwrap();

    // No events at all: nothing can fire
    engine.ingest(residence_assets(true, true), vec![]);
    let before: Vec<_> = engine.facts().assets().cloned().collect();

    let outcome = engine.run_cycle().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.mutations, 0);
    assert!(written.borrow().is_empty());

    let after: Vec<_> = engine.facts().assets().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_mutation_free_firing_converges_in_one_pass() {
    let (_, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));
    engine
        .deploy(
            Ruleset::new("observers").with_rule(
                RuleBuilder::new("notes the event")
                    .when(|_| Ok(true))
                    .then(|facts| {
                        facts.put_fact("seen", json!(true));
                        Ok(())
                    })
                    .build()
                    .unwrap(),
            ),
        )
        .unwrap();

    engine.ingest(residence_assets(true, true), vec![lights_off_event(true)]);
    let outcome = engine.run_cycle().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.mutations, 0);
    assert_eq!(engine.facts().fact("seen"), Some(&json!(true)));
}

#[test]
fn test_bindings_do_not_leak_across_cycles() {
    let (_, writer) = recording_writer();
    let mut engine = RuleEngine::new(writer).with_clock(RulesClock::fixed(ts()));

    engine
        .deploy(
            Ruleset::new("binding-scope").with_rule(
                RuleBuilder::new("binds once")
                    .when(|facts| {
                        if facts.bound("x").is_ok() {
                            return Err(RuleError::other("binding leaked across cycles"));
                        }
                        if facts.fact("fired").is_some() {
                            return Ok(false);
                        }
                        facts.bind("x", json!("r1"));
                        Ok(true)
                    })
                    .then(|facts| {
                        // Identical bound value is visible within the same firing
                        assert_eq!(facts.bound("x")?, json!("r1"));
                        facts.put_fact("fired", json!(true));
                        Ok(())
                    })
                    .build()
                    .unwrap(),
            ),
        )
        .unwrap();

    engine.ingest(residence_assets(true, true), vec![]);

    let first = engine.run_cycle().unwrap();
    assert_eq!(first.fired, vec!["binds once"]);
    assert!(first.failures.is_empty());

    let second = engine.run_cycle().unwrap();
    assert!(second.fired.is_empty());
    assert!(second.failures.is_empty(), "binding leaked: {:?}", second.failures);
}
