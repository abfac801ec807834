#![cfg(test)]

//! Submission-time validation: authorization, path geometry, the action
//! constraint table, conflict confirmation and cancellation.

#[path = "./util.rs"]
mod util;

use pretty_assertions::assert_eq;
use util::*;
use wargame::geo::Terrain;
use wargame::ids::CharacterId;
use wargame::intake::{cancel_order, submit_order, CancelOutcome, OrderRequest, SubmitOutcome};
use wargame::order::{OrderData, OrderStatus, UnitAction};
use wargame::store::Store;

fn try_submit(
    store: &mut wargame::store::MemoryStore,
    submitter: &str,
    units: &[&str],
    data: OrderData,
) -> SubmitOutcome {
    let request = OrderRequest::new(data)
        .with_units(units.iter().map(|u| wargame::ids::UnitId::from(*u)));
    submit_order(store, GUILD, &CharacterId::from(submitter), request).unwrap()
}

fn rejected(outcome: &SubmitOutcome) -> bool {
    matches!(outcome, SubmitOutcome::Rejected { .. })
}

#[test]
fn only_owners_and_commanders_may_move_units() {
    let mut store = GameBuilder::new()
        .character("owner")
        .character("stranger")
        .chain(&["a", "b"])
        .unit(infantry("u1", "owner", None, "a"))
        .build();

    let outcome = try_submit(&mut store, "stranger", &["u1"], transit(&["a", "b"]));
    assert!(rejected(&outcome));

    // A commander is as good as an owner.
    let mut unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    unit.commander = Some("stranger".into());
    store.upsert_unit(GUILD, &unit).unwrap();
    let outcome = try_submit(&mut store, "stranger", &["u1"], transit(&["a", "b"]));
    assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
}

#[test]
fn paths_must_start_at_the_units_and_be_adjacent() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .territory("far")
        .unit(infantry("u1", "c", None, "a"))
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        transit(&["b", "a"])
    )));
    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        transit(&["a", "far"])
    )));
}

#[test]
fn group_moves_require_colocation() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .unit(infantry("u2", "c", None, "b"))
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1", "u2"],
        transit(&["a", "b"])
    )));
}

#[test]
fn land_actions_reject_water_and_naval_actions_require_it() {
    let mut store = GameBuilder::new()
        .character("c")
        .territory("a")
        .territory_of("w", Terrain::Sea)
        .chain(&["a", "w"])
        .unit(infantry("u1", "c", None, "a"))
        .unit(warship("n1", "c", None, "w"))
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        transit(&["a", "w"])
    )));
    // A land unit cannot take naval orders.
    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::NavalTransit, &["a", "w"])
    )));
    // A naval path over land is refused.
    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["n1"],
        unit_action(UnitAction::NavalTransit, &["w", "a"])
    )));
}

#[test]
fn raids_are_not_for_flyers_or_infiltrators() {
    let mut spy = infantry("u1", "c", None, "a");
    spy.keywords.insert(String::from("infiltrator"));
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(spy)
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Raid, &["a", "b"])
    )));
}

#[test]
fn sieges_only_target_cities() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Siege, &["a", "b"])
    )));
}

#[test]
fn patrols_need_two_territories_and_a_positive_speed() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Patrol, &["a"])
    )));

    let zero_speed = OrderData::UnitAction {
        action: UnitAction::Patrol,
        path: vec!["a".into(), "b".into(), "a".into()],
        speed: Some(0),
        water_path: None,
        coast_territory: None,
        disembark_territory: None,
    };
    assert!(rejected(&try_submit(&mut store, "c", &["u1"], zero_speed)));
}

#[test]
fn aerial_scouts_are_range_limited() {
    let mut wing = infantry("u1", "c", None, "a");
    wing.keywords.insert(String::from("aerial"));
    wing.movement = 2;
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b", "c1", "d"])
        .unit(wing)
        .build();

    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::AerialScout, &["a", "b", "c1", "d"])
    )));
    assert!(matches!(
        try_submit(
            &mut store,
            "c",
            &["u1"],
            unit_action(UnitAction::AerialScout, &["a", "b", "c1"])
        ),
        SubmitOutcome::Accepted { .. }
    ));
}

#[test]
fn transport_paths_must_sandwich_contiguous_water() {
    let mut store = GameBuilder::new()
        .character("c")
        .territory("a")
        .territory_of("w1", Terrain::Sea)
        .territory("mid")
        .territory_of("w2", Terrain::Sea)
        .territory("b")
        .chain(&["a", "w1", "mid", "w2", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    // Water interrupted by land is not a single crossing.
    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Transport, &["a", "w1", "mid", "w2", "b"])
    )));
    // An all-land path is not a transport either.
    assert!(rejected(&try_submit(
        &mut store,
        "c",
        &["u1"],
        unit_action(UnitAction::Transport, &["a", "w1"])
    )));
}

#[test]
fn conflicting_orders_need_confirmation_and_yield_to_override() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b", "c1"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    let first = submit(&mut store, "c", &["u1"], transit(&["a", "b"]));

    let outcome = try_submit(&mut store, "c", &["u1"], transit(&["a", "b", "c1"]));
    match outcome {
        SubmitOutcome::ConfirmationNeeded { existing_orders } => {
            assert_eq!(existing_orders, vec![first.clone()]);
        }
        other => panic!("expected confirmation request, got {:?}", other),
    }

    let request = OrderRequest::new(transit(&["a", "b", "c1"]))
        .with_units([wargame::ids::UnitId::from("u1")])
        .with_override();
    let outcome = submit_order(&mut store, GUILD, &CharacterId::from("c"), request).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));

    let overridden = store.fetch_order(GUILD, &first).unwrap().unwrap();
    assert_eq!(overridden.status, OrderStatus::Cancelled);
    assert_eq!(
        overridden.result.cancelled_reason.as_deref(),
        Some("overridden_by_new_order")
    );
}

#[test]
fn cancelling_twice_is_a_quiet_success() {
    let mut store = GameBuilder::new()
        .character("c")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    let order_id = submit(&mut store, "c", &["u1"], transit(&["a", "b"]));
    assert_eq!(
        cancel_order(&mut store, GUILD, &"c".into(), &order_id).unwrap(),
        CancelOutcome::Cancelled
    );
    assert_eq!(
        cancel_order(&mut store, GUILD, &"c".into(), &order_id).unwrap(),
        CancelOutcome::AlreadyCancelled
    );
}

#[test]
fn only_the_submitter_may_cancel() {
    let mut store = GameBuilder::new()
        .character("c")
        .character("rival")
        .chain(&["a", "b"])
        .unit(infantry("u1", "c", None, "a"))
        .build();

    let order_id = submit(&mut store, "c", &["u1"], transit(&["a", "b"]));
    let outcome = cancel_order(&mut store, GUILD, &"rival".into(), &order_id).unwrap();
    assert!(matches!(outcome, CancelOutcome::Rejected { .. }));
}

#[test]
fn leaders_cannot_submit_a_leave_order() {
    let mut store = GameBuilder::new().faction_led_by("f1", "l1").build();

    let outcome = try_submit(
        &mut store,
        "l1",
        &[],
        OrderData::LeaveFaction {
            faction_id: "f1".into(),
        },
    );
    assert!(rejected(&outcome));
}

#[test]
fn alliance_proposals_reject_duplicates_and_existing_alliances() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .faction_led_by("f3", "l3")
        .allied("f1", "f3")
        .build();

    // Proposing against an active alliance fails.
    assert!(rejected(&try_submit(
        &mut store,
        "l1",
        &[],
        OrderData::MakeAlliance {
            target_faction_id: "f3".into(),
        },
    )));

    // A second identical pending proposal fails.
    assert!(matches!(
        try_submit(
            &mut store,
            "l1",
            &[],
            OrderData::MakeAlliance {
                target_faction_id: "f2".into(),
            },
        ),
        SubmitOutcome::Accepted { .. }
    ));
    assert!(rejected(&try_submit(
        &mut store,
        "l1",
        &[],
        OrderData::MakeAlliance {
            target_faction_id: "f2".into(),
        },
    )));
}

#[test]
fn mobilization_enforces_nation_matching() {
    use wargame::unit::UnitType;

    let mut store = GameBuilder::new().faction_led_by("f1", "l1").build();
    let mut faction = store.fetch_faction(GUILD, &"f1".into()).unwrap().unwrap();
    faction.nation = Some("earth".into());
    store.upsert_faction(GUILD, &faction).unwrap();

    let mut homeland = plain_territory("home", Terrain::Plains);
    homeland.original_nation = Some("earth".into());
    homeland.controller = Some(wargame::geo::Controller::Faction("f1".into()));
    store.upsert_territory(GUILD, &homeland).unwrap();

    let mut conquered = plain_territory("conquered", Terrain::Plains);
    conquered.original_nation = Some("fire".into());
    conquered.controller = Some(wargame::geo::Controller::Faction("f1".into()));
    store.upsert_territory(GUILD, &conquered).unwrap();

    store
        .upsert_unit_type(
            GUILD,
            &UnitType {
                unit_type_id: "earth-guard".into(),
                name: "Earth Guard".into(),
                movement: 2,
                attack: 3,
                defense: 3,
                siege_attack: 0,
                siege_defense: 0,
                size: 1,
                capacity: 0,
                max_organization: 8,
                cost: Default::default(),
                upkeep: Default::default(),
                keywords: Default::default(),
                nation: Some("earth".into()),
            },
        )
        .unwrap();

    // Nation-restricted units only muster in their homeland.
    assert!(rejected(&try_submit(
        &mut store,
        "l1",
        &[],
        OrderData::Mobilization {
            unit_type_id: "earth-guard".into(),
            territory_id: "conquered".into(),
            faction_id: Some("f1".into()),
            unit_name: None,
        },
    )));
    assert!(matches!(
        try_submit(
            &mut store,
            "l1",
            &[],
            OrderData::Mobilization {
                unit_type_id: "earth-guard".into(),
                territory_id: "home".into(),
                faction_id: Some("f1".into()),
                unit_name: None,
            },
        ),
        SubmitOutcome::Accepted { .. }
    ));
}

#[test]
fn fortifications_only_rise_in_cities() {
    use wargame::building::BuildingType;

    let mut store = GameBuilder::new().faction_led_by("f1", "l1").build();
    let mut plains = plain_territory("field", Terrain::Plains);
    plains.controller = Some(wargame::geo::Controller::Faction("f1".into()));
    store.upsert_territory(GUILD, &plains).unwrap();

    store
        .upsert_building_type(
            GUILD,
            &BuildingType {
                building_type_id: "walls".into(),
                name: "City Walls".into(),
                durability: 10,
                cost: Default::default(),
                upkeep: Default::default(),
                keywords: [String::from("fortification")].into_iter().collect(),
                nation: None,
            },
        )
        .unwrap();

    assert!(rejected(&try_submit(
        &mut store,
        "l1",
        &[],
        OrderData::Construction {
            building_type_id: "walls".into(),
            territory_id: "field".into(),
            faction_id: Some("f1".into()),
        },
    )));
}
