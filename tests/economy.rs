#![cfg(test)]

//! Economy coverage: transfers, upkeep accounting, recovery, and the
//! spirit-nexus proximity effects.

#[path = "./util.rs"]
mod util;

use pretty_assertions::assert_eq;
use util::*;
use wargame::building::{Building, BuildingStatus};
use wargame::event::EventKind;
use wargame::geo::Terrain;
use wargame::ids::{CharacterId, NexusId};
use wargame::nexus::SpiritNexus;
use wargame::order::{OrderData, OrderStatus};
use wargame::resources::ResourcePool;
use wargame::store::Store;
use wargame::Party;

fn ore(amount: i64) -> ResourcePool {
    ResourcePool {
        ore: amount,
        ..Default::default()
    }
}

fn building(id: &str, territory: &str, keywords: &[&str]) -> Building {
    Building {
        building_id: id.into(),
        name: None,
        building_type_id: id.to_string(),
        territory_id: territory.into(),
        durability: 5,
        status: BuildingStatus::Active,
        upkeep: Default::default(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        created_turn: 0,
    }
}

#[test]
fn transfer_moves_resources_between_characters() {
    let mut store = GameBuilder::new()
        .character("alice")
        .character("bob")
        .resources("alice", ore(10))
        .build();

    submit(
        &mut store,
        "alice",
        &[],
        OrderData::ResourceTransfer {
            sender: Party::Character("alice".into()),
            recipient: Party::Character("bob".into()),
            amounts: ore(4),
            ongoing: false,
            term: None,
        },
    );
    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::ResourceTransferExecuted));
    assert_eq!(store.player_resources(GUILD, &"alice".into()).unwrap().ore, 6);
    assert_eq!(store.player_resources(GUILD, &"bob".into()).unwrap().ore, 4);
}

/// A transfer from an empty inventory emits a deficit and completes with
/// no state change.
#[test]
fn empty_handed_transfer_reports_deficit() {
    let mut store = GameBuilder::new()
        .character("alice")
        .character("bob")
        .build();

    let order_id = submit(
        &mut store,
        "alice",
        &[],
        OrderData::ResourceTransfer {
            sender: Party::Character("alice".into()),
            recipient: Party::Character("bob".into()),
            amounts: ore(4),
            ongoing: false,
            term: None,
        },
    );
    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::TransferDeficit));
    assert_eq!(store.player_resources(GUILD, &"bob".into()).unwrap().ore, 0);
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Success);
}

#[test]
fn ongoing_transfer_runs_until_its_term() {
    let mut store = GameBuilder::new()
        .character("alice")
        .character("bob")
        .resources("alice", ore(10))
        .build();

    let order_id = submit(
        &mut store,
        "alice",
        &[],
        OrderData::ResourceTransfer {
            sender: Party::Character("alice".into()),
            recipient: Party::Character("bob".into()),
            amounts: ore(2),
            ongoing: true,
            term: Some(2),
        },
    );

    advance(&mut store, 0);
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ongoing);
    assert_eq!(order.result.turns_executed, Some(1));

    advance(&mut store, 1);
    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Success);
    assert_eq!(store.player_resources(GUILD, &"bob".into()).unwrap().ore, 4);
}

/// A cancellation lands before the transfer it names, even in the same
/// phase.
#[test]
fn cancel_transfer_runs_before_the_transfer() {
    let mut store = GameBuilder::new()
        .character("alice")
        .character("bob")
        .resources("alice", ore(10))
        .build();

    let transfer_id = submit(
        &mut store,
        "alice",
        &[],
        OrderData::ResourceTransfer {
            sender: Party::Character("alice".into()),
            recipient: Party::Character("bob".into()),
            amounts: ore(5),
            ongoing: true,
            term: None,
        },
    );
    submit(
        &mut store,
        "alice",
        &[],
        OrderData::CancelTransfer {
            target_order_id: transfer_id.clone(),
        },
    );
    advance(&mut store, 0);

    let transfer = store.fetch_order(GUILD, &transfer_id).unwrap().unwrap();
    assert_eq!(transfer.status, OrderStatus::Cancelled);
    assert_eq!(store.player_resources(GUILD, &"alice".into()).unwrap().ore, 10);
    assert_eq!(store.player_resources(GUILD, &"bob".into()).unwrap().ore, 0);
}

#[test]
fn character_production_includes_personal_stat() {
    let mut producer = plain_character("alice");
    producer.production = ore(3);

    let mut store = GameBuilder::new().build();
    store.upsert_character(GUILD, &producer).unwrap();

    let events = advance(&mut store, 0);
    assert!(has_event(&events, EventKind::CharacterProduction));
    assert_eq!(store.player_resources(GUILD, &"alice".into()).unwrap().ore, 3);
}

#[test]
fn unit_upkeep_deficit_costs_organization() {
    let mut hungry = infantry("u1", "c", None, "t");
    hungry.upkeep = ResourcePool {
        rations: 3,
        ore: 1,
        ..Default::default()
    };

    let mut store = GameBuilder::new()
        .character("c")
        .territory("t")
        .unit(hungry)
        .resources(
            "c",
            ResourcePool {
                rations: 1,
                ..Default::default()
            },
        )
        .build();

    let events = advance(&mut store, 0);

    // Two resource types fell short: rations (partially) and ore.
    assert!(has_event(&events, EventKind::UpkeepDeficit));
    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.organization, 8);
    // The partial payment was still consumed.
    assert_eq!(
        store.player_resources(GUILD, &"c".into()).unwrap().rations,
        0
    );
}

#[test]
fn hospitals_speed_up_recovery_on_friendly_ground() {
    let mut wounded = infantry("u1", "c", None, "t");
    wounded.organization = 3;

    let mut store = GameBuilder::new()
        .character("c")
        .territory_with(held_by(plain_territory("t", Terrain::Plains), "c"))
        .unit(wounded)
        .build();
    store
        .upsert_building(GUILD, &building("infirmary", "t", &["hospital"]))
        .unwrap();

    advance(&mut store, 0);

    // 1 base + 2 per hospital.
    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.organization, 6);
}

#[test]
fn no_recovery_in_unclaimed_territory() {
    let mut wounded = infantry("u1", "c", None, "t");
    wounded.organization = 3;

    let mut store = GameBuilder::new()
        .character("c")
        .territory("t")
        .unit(wounded)
        .build();

    advance(&mut store, 0);
    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.organization, 3);
}

#[test]
fn building_upkeep_pays_from_the_controlling_faction() {
    let mut mill = building("mill", "t", &[]);
    mill.upkeep = ore(2);

    let mut territory = plain_territory("t", Terrain::Plains);
    territory.controller = Some(wargame::geo::Controller::Faction("f1".into()));

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .territory_with(territory)
        .build();
    store.upsert_building(GUILD, &mill).unwrap();
    store
        .set_faction_resources(GUILD, &"f1".into(), ore(5))
        .unwrap();

    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::BuildingUpkeepPaid));
    assert_eq!(store.faction_resources(GUILD, &"f1".into()).unwrap().ore, 3);
}

/// Destroying a spiritual building wounds the nearest nexus, and polar
/// effects swap to the opposite pole.
#[test]
fn spiritual_collapse_damages_the_swapped_pole() {
    let mut shrine = building("shrine", "t", &["spiritual"]);
    shrine.upkeep = ore(1);
    shrine.durability = 1;

    let mut store = GameBuilder::new()
        .character("c")
        .territory_with(held_by(plain_territory("t", Terrain::Plains), "c"))
        .chain(&["t", "pole"])
        .build();
    store.upsert_building(GUILD, &shrine).unwrap();
    for (id, territory) in [("south-pole", "pole"), ("north-pole", "pole")] {
        store
            .upsert_nexus(
                GUILD,
                &SpiritNexus {
                    nexus_id: NexusId::from(id),
                    territory_id: territory.into(),
                    health: 10,
                },
            )
            .unwrap();
    }

    let events = advance(&mut store, 0);

    assert!(has_event(&events, EventKind::BuildingDestroyed));
    let damaged = events_of(&events, EventKind::NexusDamaged);
    assert_eq!(damaged.len(), 1);
    assert!(damaged[0].audience.is_none(), "nexus events are GM-only");

    // The nearest nexus sorts alphabetically to north-pole; the swap
    // redirects the damage to south-pole.
    let south = store.fetch_nexus(GUILD, &"south-pole".into()).unwrap().unwrap();
    assert_eq!(south.health, 8);
    let north = store.fetch_nexus(GUILD, &"north-pole".into()).unwrap().unwrap();
    assert_eq!(north.health, 10);
}

/// Production and upkeep events for an orderless turn are exactly those
/// dictated by non-zero outputs, and the turn counter advances by one.
#[test]
fn quiet_turn_emits_only_economy_events() {
    let mut territory = held_by(plain_territory("t", Terrain::Plains), "c");
    territory.production = ore(2);

    let mut store = GameBuilder::new()
        .character("c")
        .territory_with(territory)
        .build();

    let events = advance(&mut store, 0);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::CharacterProduction);
    assert_eq!(
        store.fetch_config(GUILD).unwrap().current_turn,
        1,
        "the turn counter advances"
    );
}

#[test]
fn faction_financial_permission_gates_faction_transfers() {
    use wargame::intake::{submit_order, OrderRequest, SubmitOutcome};

    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .character("outsider")
        .build();
    store
        .set_faction_resources(GUILD, &"f1".into(), ore(10))
        .unwrap();

    let request = OrderRequest::new(OrderData::ResourceTransfer {
        sender: Party::Faction("f1".into()),
        recipient: Party::Character("outsider".into()),
        amounts: ore(5),
        ongoing: false,
        term: None,
    });
    let outcome = submit_order(
        &mut store,
        GUILD,
        &CharacterId::from("outsider"),
        request.clone(),
    )
    .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));

    // The leader implicitly holds FINANCIAL.
    let outcome = submit_order(&mut store, GUILD, &CharacterId::from("l1"), request).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
}
