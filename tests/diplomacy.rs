#![cfg(test)]

//! Diplomacy coverage: the join handshake, membership churn and
//! representation migration, dissolution cooldowns, commanders, and
//! victory-point assignments.

#[path = "./util.rs"]
mod util;

use pretty_assertions::assert_eq;
use util::*;
use wargame::event::EventKind;
use wargame::ids::{CharacterId, FactionId};
use wargame::intake::{cancel_order, CancelOutcome};
use wargame::order::{OrderData, OrderStatus};
use wargame::store::Store;

#[test]
fn join_handshake_requires_both_halves() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .character("newcomer")
        .build();

    // The newcomer asks to join; nothing happens until leadership agrees.
    let first_half = submit(
        &mut store,
        "newcomer",
        &[],
        OrderData::JoinFaction {
            faction_id: "f1".into(),
            target_character_id: "newcomer".into(),
            submitted_by_leader: false,
        },
    );
    let events = advance(&mut store, 0);
    assert!(has_event(&events, EventKind::FactionJoinPending));
    assert_eq!(
        store.fetch_order(GUILD, &first_half).unwrap().unwrap().status,
        OrderStatus::Ongoing
    );

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::JoinFaction {
            faction_id: "f1".into(),
            target_character_id: "newcomer".into(),
            submitted_by_leader: true,
        },
    );
    let events = advance(&mut store, 1);
    assert!(has_event(&events, EventKind::FactionMemberJoined));

    let membership = store
        .memberships_of(GUILD, &"newcomer".into())
        .unwrap();
    assert_eq!(membership.len(), 1);
    assert_eq!(membership[0].joined_turn, 2);
    assert_eq!(
        store.fetch_order(GUILD, &first_half).unwrap().unwrap().status,
        OrderStatus::Success,
        "the waiting half completes when the handshake closes"
    );

    let newcomer = store.fetch_character(GUILD, &"newcomer".into()).unwrap().unwrap();
    assert_eq!(newcomer.represented_faction_id, Some(FactionId::from("f1")));
}

#[test]
fn joining_adopts_the_faction_for_owned_units() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .character("newcomer")
        .territory("t")
        .unit(infantry("u1", "newcomer", None, "t"))
        .build();

    submit(
        &mut store,
        "newcomer",
        &[],
        OrderData::JoinFaction {
            faction_id: "f1".into(),
            target_character_id: "newcomer".into(),
            submitted_by_leader: false,
        },
    );
    submit(
        &mut store,
        "l1",
        &[],
        OrderData::JoinFaction {
            faction_id: "f1".into(),
            target_character_id: "newcomer".into(),
            submitted_by_leader: true,
        },
    );
    advance(&mut store, 0);

    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.faction_id, Some(FactionId::from("f1")));
}

#[test]
fn leaving_promotes_the_newest_remaining_membership() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .character("wanderer")
        .member("f1", "wanderer", 2)
        .member("f2", "wanderer", 5)
        .build();
    // The wanderer represents f1 and leaves it.
    let mut wanderer = store.fetch_character(GUILD, &"wanderer".into()).unwrap().unwrap();
    wanderer.represented_faction_id = Some("f1".into());
    store.upsert_character(GUILD, &wanderer).unwrap();

    submit(
        &mut store,
        "wanderer",
        &[],
        OrderData::LeaveFaction {
            faction_id: "f1".into(),
        },
    );
    let events = advance(&mut store, 0);
    assert!(has_event(&events, EventKind::FactionMemberLeft));

    let wanderer = store.fetch_character(GUILD, &"wanderer".into()).unwrap().unwrap();
    assert_eq!(
        wanderer.represented_faction_id,
        Some(FactionId::from("f2")),
        "the membership with the highest join turn is promoted"
    );
    assert_eq!(
        wanderer.representation_changed_turn, None,
        "auto-promotion does not reset the cooldown"
    );
}

#[test]
fn kicks_respect_the_cooldowns() {
    let mut store = GameBuilder::new()
        .at_turn(1)
        .faction_led_by("f1", "l1")
        .character("target")
        .member("f1", "target", 0)
        .build();

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::KickFromFaction {
            faction_id: "f1".into(),
            target_character_id: "target".into(),
        },
    );
    let events = advance(&mut store, 1);

    // Turn 2 is still inside the early-game grace period.
    assert!(has_event(&events, EventKind::OrderFailed));
    assert_eq!(store.members_of(GUILD, &"f1".into()).unwrap().len(), 2);
}

#[test]
fn kick_removes_membership_and_resets_the_cooldown() {
    let mut store = GameBuilder::new()
        .at_turn(9)
        .faction_led_by("f1", "l1")
        .character("target")
        .member("f1", "target", 1)
        .build();

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::KickFromFaction {
            faction_id: "f1".into(),
            target_character_id: "target".into(),
        },
    );
    let events = advance(&mut store, 9);
    assert!(has_event(&events, EventKind::FactionMemberKicked));

    let members = store.members_of(GUILD, &"f1".into()).unwrap();
    assert!(members.iter().all(|m| m.character_id != CharacterId::from("target")));
    let target = store.fetch_character(GUILD, &"target".into()).unwrap().unwrap();
    assert_eq!(target.representation_changed_turn, Some(10));
}

#[test]
fn young_alliances_cannot_be_dissolved() {
    let mut store = GameBuilder::new()
        .at_turn(10)
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .build();
    // Allied just last turn.
    let mut alliance =
        wargame::diplo::Alliance::propose(FactionId::from("f1"), FactionId::from("f2"));
    alliance.status = wargame::diplo::AllianceStatus::Active;
    alliance.activated_turn = Some(9);
    store.upsert_alliance(GUILD, &alliance).unwrap();

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::DissolveAlliance {
            target_faction_id: "f2".into(),
        },
    );
    let events = advance(&mut store, 10);
    assert!(has_event(&events, EventKind::OrderFailed));
    assert!(store
        .find_alliance(GUILD, &"f1".into(), &"f2".into())
        .unwrap()
        .is_some());
}

#[test]
fn seasoned_alliances_dissolve_on_request() {
    let mut store = GameBuilder::new()
        .at_turn(10)
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .allied("f1", "f2")
        .build();

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::DissolveAlliance {
            target_faction_id: "f2".into(),
        },
    );
    let events = advance(&mut store, 10);
    assert!(has_event(&events, EventKind::AllianceDissolved));
    assert!(store
        .find_alliance(GUILD, &"f1".into(), &"f2".into())
        .unwrap()
        .is_none());
}

#[test]
fn commander_must_share_the_owner_faction() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .character("friendly")
        .member("f1", "friendly", 0)
        .territory("t")
        .unit(infantry("u1", "l1", Some("f1"), "t"))
        .build();
    let mut friendly = store.fetch_character(GUILD, &"friendly".into()).unwrap().unwrap();
    friendly.represented_faction_id = Some("f1".into());
    store.upsert_character(GUILD, &friendly).unwrap();

    // An enemy leader cannot take command.
    submit(
        &mut store,
        "l1",
        &[],
        OrderData::AssignCommander {
            unit_id: "u1".into(),
            new_commander_id: Some("l2".into()),
        },
    );
    let events = advance(&mut store, 0);
    assert!(has_event(&events, EventKind::OrderFailed));

    submit(
        &mut store,
        "l1",
        &[],
        OrderData::AssignCommander {
            unit_id: "u1".into(),
            new_commander_id: Some("friendly".into()),
        },
    );
    let events = advance(&mut store, 1);
    assert!(has_event(&events, EventKind::CommanderAssigned));

    let unit = store.fetch_unit(GUILD, &"u1".into()).unwrap().unwrap();
    assert_eq!(unit.commander, Some(CharacterId::from("friendly")));
    assert_eq!(unit.commander_assigned_turn, Some(2));
}

#[test]
fn victory_point_assignment_pays_out_each_turn() {
    let mut patron = plain_character("patron");
    patron.victory_points = 3;

    let mut store = GameBuilder::new().faction_led_by("f1", "l1").build();
    store.upsert_character(GUILD, &patron).unwrap();

    let order_id = submit(
        &mut store,
        "patron",
        &[],
        OrderData::AssignVictoryPoints {
            target_faction_id: "f1".into(),
        },
    );

    let events = advance(&mut store, 0);
    let assigned = events_of(&events, EventKind::VictoryPointsAssigned);
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].data["amount"], 3);

    let order = store.fetch_order(GUILD, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ongoing);
    assert_eq!(order.result.turns_active, Some(1));
}

#[test]
fn victory_point_assignment_needs_three_turns_before_cancelling() {
    let mut store = GameBuilder::new().faction_led_by("f1", "l1").character("patron").build();

    let order_id = submit(
        &mut store,
        "patron",
        &[],
        OrderData::AssignVictoryPoints {
            target_faction_id: "f1".into(),
        },
    );
    advance(&mut store, 0);

    // One active turn: the cancellation turn would only be the second.
    let outcome = cancel_order(&mut store, GUILD, &"patron".into(), &order_id).unwrap();
    assert!(matches!(outcome, CancelOutcome::Rejected { .. }));

    advance(&mut store, 1);
    let outcome = cancel_order(&mut store, GUILD, &"patron".into(), &order_id).unwrap();
    assert_eq!(outcome, CancelOutcome::Cancelled);
}

#[test]
fn new_assignment_supersedes_the_previous_one() {
    let mut store = GameBuilder::new()
        .faction_led_by("f1", "l1")
        .faction_led_by("f2", "l2")
        .character("patron")
        .build();

    let first = submit(
        &mut store,
        "patron",
        &[],
        OrderData::AssignVictoryPoints {
            target_faction_id: "f1".into(),
        },
    );
    let second = submit(
        &mut store,
        "patron",
        &[],
        OrderData::AssignVictoryPoints {
            target_faction_id: "f2".into(),
        },
    );

    let first = store.fetch_order(GUILD, &first).unwrap().unwrap();
    assert_eq!(first.status, OrderStatus::Cancelled);
    assert_eq!(first.result.superseded_by, Some(second));
}
