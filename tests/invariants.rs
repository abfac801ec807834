#![cfg(test)]

//! Cross-cutting engine behavior: turn idempotence, the transient retry,
//! disabled tenants, per-order failure isolation, and the structural
//! invariants that must hold after every committed phase.

#[path = "./util.rs"]
mod util;

use pretty_assertions::assert_eq;
use util::*;
use wargame::config::WargameConfig;
use wargame::event::{CapturingSink, EventKind};
use wargame::order::{OrderData, OrderStatus};
use wargame::store::{MemoryStore, Store};
use wargame::unit::UnitStatus;
use wargame::EngineError;

#[test]
fn advancing_a_stale_turn_is_an_error() {
    let mut store = GameBuilder::new().at_turn(5).build();
    let mut sink = CapturingSink::default();

    wargame::advance_turn(&mut store, &mut sink, GUILD, 5).unwrap();
    let error = wargame::advance_turn(&mut store, &mut sink, GUILD, 5).unwrap_err();
    assert!(matches!(
        error,
        EngineError::TurnMismatch {
            expected: 5,
            actual: 6
        }
    ));
}

#[test]
fn disabled_tenants_do_not_advance() {
    let mut store = MemoryStore::new();
    store
        .upsert_config(
            GUILD,
            &WargameConfig {
                current_turn: 3,
                turn_resolution_enabled: false,
                ..WargameConfig::default()
            },
        )
        .unwrap();

    let mut sink = CapturingSink::default();
    let outcome = wargame::advance_turn(&mut store, &mut sink, GUILD, 3).unwrap();
    assert_eq!(outcome.new_turn, 3);
    assert!(outcome.emitted_events.is_empty());
    assert_eq!(store.fetch_config(GUILD).unwrap().current_turn, 3);
}

#[test]
fn one_transient_failure_is_retried() {
    let mut store = GameBuilder::new().build();
    store.inject_commit_failures(1);

    let mut sink = CapturingSink::default();
    let outcome = wargame::advance_turn(&mut store, &mut sink, GUILD, 0).unwrap();
    assert_eq!(outcome.new_turn, 1);
}

#[test]
fn repeated_transient_failures_abort_the_turn() {
    let mut store = GameBuilder::new().build();
    store.inject_commit_failures(2);

    let mut sink = CapturingSink::default();
    let error = wargame::advance_turn(&mut store, &mut sink, GUILD, 0).unwrap_err();
    assert!(error.is_transient());
    assert_eq!(
        store.fetch_config(GUILD).unwrap().current_turn,
        0,
        "the turn counter is untouched after an aborted turn"
    );
}

/// One order's execution failure is contained: it is marked FAILED with
/// an event, and its neighbors in the phase still run.
#[test]
fn order_failure_is_isolated_from_the_phase() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .territory("t")
        .unit(infantry("u1", "l1", Some("f1"), "t"))
        .build();

    // The first assignment names a commander from a rival faction and
    // fails at execution; the second is clean.
    let failing = submit(
        &mut store,
        "l1",
        &[],
        OrderData::AssignCommander {
            unit_id: "u1".into(),
            new_commander_id: Some("l2".into()),
        },
    );
    let clean = submit(
        &mut store,
        "l1",
        &[],
        OrderData::AssignCommander {
            unit_id: "u1".into(),
            new_commander_id: None,
        },
    );

    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::OrderFailed));
    assert!(has_event(&events, EventKind::CommanderAssigned));
    assert_eq!(
        store.fetch_order(GUILD, &failing).unwrap().unwrap().status,
        OrderStatus::Failed
    );
    assert_eq!(
        store.fetch_order(GUILD, &clean).unwrap().unwrap().status,
        OrderStatus::Success
    );

    let failed = store.fetch_order(GUILD, &failing).unwrap().unwrap();
    assert!(failed.result.error.is_some());
}

/// Structural invariants hold after a stretch of eventful turns.
#[test]
fn structural_invariants_survive_a_campaign() {
    let mut weak = infantry("u2", "l2", Some("f2"), "t");
    weak.attack = 1;
    weak.defense = 1;
    weak.organization = 2;
    weak.max_organization = 2;

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .faction_led_by("f3", "l3")
        .allied("f1", "f3")
        .at_war("campaign", "f1", "f2")
        .chain(&["t", "u", "v"])
        .unit(infantry("u1", "l1", Some("f1"), "t"))
        .unit(weak)
        .build();

    for turn in 0..3 {
        advance(&mut store, turn);
    }

    // Alliance rows are canonical and reference live factions.
    for alliance in store.all_alliances(GUILD).unwrap() {
        assert!(alliance.faction_a < alliance.faction_b);
        for faction in [&alliance.faction_a, &alliance.faction_b] {
            assert!(store.fetch_faction(GUILD, faction).unwrap().is_some());
        }
    }
    // Adjacency rows are canonical.
    for edge in store.all_adjacencies(GUILD).unwrap() {
        assert!(edge.territory_a < edge.territory_b);
    }
    // Every represented faction matches a membership row.
    for character in store.all_characters(GUILD).unwrap() {
        if let Some(faction) = &character.represented_faction_id {
            assert!(store
                .memberships_of(GUILD, &character.character_id)
                .unwrap()
                .iter()
                .any(|m| &m.faction_id == faction));
        }
    }
    // No active unit sits at or below zero organization after the
    // organization phase; disbanded units are spent.
    for unit in store.all_units(GUILD).unwrap() {
        match unit.status {
            UnitStatus::Active => {
                assert!(unit.organization > 0 && unit.organization <= unit.max_organization)
            }
            UnitStatus::Disbanded => assert!(unit.organization <= 0),
        }
    }
}
