#![cfg(test)]

//! Movement resolver coverage: terrain costs, multi-turn resumption,
//! patrol budgets, exemptions, and the land-naval transport coupling.

#[path = "./util.rs"]
mod util;

use pretty_assertions::assert_eq;
use util::*;
use wargame::event::EventKind;
use wargame::geo::Terrain;
use wargame::ids::TerritoryId;
use wargame::order::{MovementStatus, OrderData, OrderStatus, UnitAction};
use wargame::store::Store;

fn territory_of_unit(store: &wargame::store::MemoryStore, unit: &str) -> TerritoryId {
    store
        .fetch_unit(GUILD, &unit.into())
        .unwrap()
        .unwrap()
        .current_territory
        .unwrap()
}

#[test]
fn transit_completes_within_movement_allowance() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b", "c", "d"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    // Movement 3 plus the transit bonus covers three plains steps.
    let order_id = submit(&mut store, "c", &["u1"], transit(&["a", "b", "c", "d"]));
    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::TransitComplete));
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("d"));
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Success);
}

#[test]
fn transit_resumes_across_turns_when_out_of_points() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b", "c", "d", "e", "f", "g"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    let order_id = submit(
        &mut store,
        "c",
        &["u1"],
        transit(&["a", "b", "c", "d", "e", "f", "g"]),
    );
    advance(&mut store, 0);

    // Four points spent, two steps short of the destination.
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("e"));
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ongoing);
    assert_eq!(order.result.movement_status, Some(MovementStatus::OutOfMp));
    assert_eq!(order.result.path_index, Some(4));

    let events = advance(&mut store, 1);
    assert!(has_event(&events, EventKind::TransitComplete));
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("g"));
}

#[test]
fn mountain_entry_costs_three_points() {
    let mut climber = infantry("u1", "c", None, "a");
    climber.movement = 2;
    let mut store = GameBuilder::new()
        .character("c")
        .territory("a")
        .territory_of("b", Terrain::Mountain)
        .territory("c1")
        .chain(&["a", "b", "c1"])
        .unit(climber)
        .build();

    submit(&mut store, "c", &["u1"], transit(&["a", "b", "c1"]));
    advance(&mut store, 0);

    // Three points buy the mountain but nothing after it.
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("b"));
}

/// A unit with no base movement may still be ordered to transit; the
/// order completes without moving or spending anything.
#[test]
fn zero_movement_transit_completes_in_place() {
    let mut unit = infantry("u1", "c", None, "a");
    unit.movement = 0;
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(unit)
        .build();

    let order_id = submit(&mut store, "c", &["u1"], transit(&["a", "b"]));
    advance(&mut store, 0);

    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("a"));
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Success);
    assert_eq!(order.result.path_index, Some(0));
}

#[test]
fn patrol_loops_and_respects_speed_cap() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    let order_id = submit(
        &mut store,
        "c",
        &["u1"],
        OrderData::UnitAction {
            action: UnitAction::Patrol,
            path: vec!["a".into(), "b".into(), "a".into()],
            speed: Some(2),
            water_path: None,
            coast_territory: None,
            disembark_territory: None,
        },
    );
    advance(&mut store, 0);

    // Two points of budget: out to b and back, then the cap stops it.
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("a"));
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ongoing, "patrols never finish");

    // The loop keeps running next turn.
    advance(&mut store, 1);
    assert_eq!(
        store
            .fetch_order(GUILD, &order_id)
            .unwrap()
            .unwrap()
            .status,
        OrderStatus::Ongoing
    );
}

#[test]
fn infiltrators_slip_past_hostile_garrisons() {
    let mut hidden = infantry("u1", "l1", Some("f1"), "a");
    hidden.keywords.insert(String::from("infiltrator"));

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .at_war("border-war", "f1", "f2")
        .chain(&["a", "b", "c"])
        .unit(hidden)
        .unit(infantry("u2", "l2", Some("f2"), "b"))
        .build();

    let events = {
        submit(&mut store, "l1", &["u1"], transit(&["a", "b", "c"]));
        advance(&mut store, 0)
    };

    assert!(!has_event(&events, EventKind::EngagementDetected));
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("c"));
}

#[test]
fn group_moves_at_the_pace_of_the_slowest_unit() {
    let mut slow = infantry("u2", "c", None, "a");
    slow.movement = 1;
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b", "c1", "d"])
        .unit(infantry("u1", "c", None, "a"))
        .unit(slow)
        .build();

    submit(&mut store, "c", &["u1", "u2"], transit(&["a", "b", "c1", "d"]));
    advance(&mut store, 0);

    // min(3, 1) + 1 bonus = two steps for the group.
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("c1"));
    assert_eq!(territory_of_unit(&store, "u2"), TerritoryId::from("c1"));
}

#[test]
fn transport_carries_land_units_across_water() {
    let mut carrier = warship("n1", "c", None, "w1");
    carrier.capacity = 4;

    let mut store = GameBuilder::new()
        .character("c")
        .territory("a")
        .territory_of("w1", Terrain::Sea)
        .territory_of("w2", Terrain::Sea)
        .territory("b")
        .chain(&["a", "w1", "w2", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .unit(carrier)
        .build();

    let land_order = submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Transport, &["a", "w1", "w2", "b"]),
    );
    let naval_order = submit(
        &mut store,
        "c",
        &["n1"],
        unit_action(UnitAction::NavalTransport, &["w1", "w2"]),
    );

    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::UnitsEmbarked));
    assert!(has_event(&events, EventKind::UnitsDisembarked));
    assert_eq!(territory_of_unit(&store, "u1"), TerritoryId::from("b"));
    assert_eq!(territory_of_unit(&store, "n1"), TerritoryId::from("w2"));

    let land = store.fetch_order(GUILD, &land_order).unwrap().unwrap();
    assert_eq!(land.status, OrderStatus::Success);
    let naval = store.fetch_order(GUILD, &naval_order).unwrap().unwrap();
    assert_eq!(naval.status, OrderStatus::Success);
    assert_eq!(
        naval.result.carrying_units.as_deref(),
        Some(&["u1".into()][..]),
        "the manifest is persisted at coupling time"
    );
}

#[test]
fn naval_transport_waits_until_cargo_arrives() {
    let mut carrier = warship("n1", "c", None, "w1");
    carrier.capacity = 4;

    let mut store = GameBuilder::new()
        .character("c")
        .territory_of("w1", Terrain::Sea)
        .territory_of("w2", Terrain::Sea)
        .chain(&["w1", "w2"])
        .unit(carrier)
        .build();

    let naval_order = submit(
        &mut store,
        "c",
        &["n1"],
        unit_action(UnitAction::NavalTransport, &["w1", "w2"]),
    );
    advance(&mut store, 0);

    let order = store.fetch_order(GUILD, &naval_order).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ongoing);
    assert_eq!(
        order.result.movement_status,
        Some(MovementStatus::WaitingForCargo)
    );
    assert_eq!(territory_of_unit(&store, "n1"), TerritoryId::from("w1"));
}

#[test]
fn naval_patrol_occupies_the_swept_window() {
    let mut store = GameBuilder::new()
        .character("c")
        .territory_of("w1", Terrain::Sea)
        .territory_of("w2", Terrain::Sea)
        .territory_of("w3", Terrain::Sea)
        .chain(&["w1", "w2", "w3"])
        .unit(warship("n1", "c", None, "w1"))
        .build();

    submit(
        &mut store,
        "c",
        &["n1"],
        OrderData::UnitAction {
            action: UnitAction::NavalPatrol,
            path: vec!["w1".into(), "w2".into(), "w3".into()],
            speed: Some(2),
            water_path: None,
            coast_territory: None,
            disembark_territory: None,
        },
    );
    advance(&mut store, 0);

    let occupied = store.naval_positions(GUILD, &"n1".into()).unwrap();
    for w in ["w1", "w2", "w3"] {
        assert!(occupied.contains(&TerritoryId::from(w)), "missing {}", w);
    }
}

#[test]
fn encirclement_flags_units_cut_off_from_home() {
    use wargame::geo::Controller;

    let mut home = plain_territory("home", Terrain::Plains);
    home.controller = Some(Controller::Faction("f1".into()));
    let mut wall = plain_territory("wall", Terrain::Plains);
    wall.controller = Some(Controller::Faction("f2".into()));

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .at_war("siege-war", "f1", "f2")
        .territory_with(home)
        .territory_with(wall)
        .territory("forward")
        .chain(&["home", "wall", "forward"])
        .unit(infantry("u1", "l1", Some("f1"), "forward"))
        .build();

    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::UnitEncircled));
    assert!(store.is_encircled(GUILD, &"u1".into()).unwrap());
    // The encirclement penalty lands during upkeep.
    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.organization, 9);
}

#[test]
fn convoy_coverage_lifts_encirclement_across_water() {
    use wargame::geo::Controller;

    let mut home = plain_territory("home", Terrain::Plains);
    home.controller = Some(Controller::Faction("f1".into()));
    let mut island = plain_territory("island", Terrain::Plains);
    island.controller = Some(Controller::Faction("f2".into()));

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .at_war("island-war", "f1", "f2")
        .territory_with(home)
        .territory_of("strait", Terrain::Sea)
        .territory_with(island)
        .chain(&["home", "strait", "island"])
        .unit(infantry("u1", "l1", Some("f1"), "island"))
        .unit(warship("n1", "l1", Some("f1"), "strait"))
        .build();

    // Without the convoy the island garrison is cut off.
    advance(&mut store, 0);
    assert!(store.is_encircled(GUILD, &"u1".into()).unwrap());

    submit(
        &mut store,
        "l1",
        &["n1"],
        unit_action(UnitAction::NavalConvoy, &["strait"]),
    );
    advance(&mut store, 1);
    assert!(!store.is_encircled(GUILD, &"u1".into()).unwrap());
}
