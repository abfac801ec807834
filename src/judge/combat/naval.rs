//! Naval combat: single-round, simultaneous across every contested water
//! territory. Naval units do not retreat; they hold position and may soak
//! damage from several territories in the same turn.

use super::super::{relations, PhaseContext};
use super::sides::{group_into_sides, CombatSide};
use crate::event::{EntityKind, EventKind};
use crate::ids::{TerritoryId, UnitId};
use crate::order::{OrderStatus, OrderType, UnitAction};
use crate::store::StoreError;
use crate::unit::{keyword, Unit, UnitStatus};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub(crate) fn run_naval_combat(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let patrollers = patrolling_units(ctx)?;
    if patrollers.is_empty() {
        return Ok(());
    }

    // Every water territory with naval occupancy, in stable order.
    let mut territories: BTreeSet<TerritoryId> = BTreeSet::new();
    for (_, occupied) in ctx.store.all_naval_positions(ctx.guild)? {
        territories.extend(occupied);
    }

    // Compute all damage across all territories before applying any of it.
    let mut damage: HashMap<UnitId, i64> = HashMap::new();
    let mut engaged_territories: Vec<(TerritoryId, BTreeMap<UnitId, i64>)> = Vec::new();

    for territory_id in territories {
        let occupants = naval_units_in(ctx, &territory_id)?;
        if occupants.len() < 2 {
            continue;
        }
        if !occupants.iter().any(|u| patrollers.contains(&u.unit_id)) {
            continue;
        }

        let sides = group_into_sides(ctx, occupants)?;
        let mut local: BTreeMap<UnitId, i64> = BTreeMap::new();
        for a in 0..sides.len() {
            for b in (a + 1)..sides.len() {
                if !naval_sides_hostile(ctx, &sides[a], &sides[b])? {
                    continue;
                }
                exchange_damage(&sides[a], &sides[b], &mut local);
                exchange_damage(&sides[b], &sides[a], &mut local);
            }
        }
        if local.is_empty() {
            continue;
        }
        for (unit_id, lost) in &local {
            *damage.entry(unit_id.clone()).or_insert(0) += lost;
        }
        engaged_territories.push((territory_id, local));
    }

    for (territory_id, local) in &engaged_territories {
        let mut audience = Vec::new();
        for unit_id in local.keys() {
            if let Some(unit) = ctx.store.fetch_unit(ctx.guild, unit_id)? {
                audience.extend(relations::unit_audience(
                    ctx.store,
                    ctx.guild,
                    std::slice::from_ref(&unit),
                )?);
            }
        }
        let event = ctx
            .event(
                EventKind::NavalCombatResolved,
                EntityKind::Territory,
                territory_id.as_str(),
            )
            .with("damage", local)
            .for_audience(audience);
        ctx.push(event);
    }

    apply_naval_damage(ctx, damage)
}

/// Units currently flying an ongoing naval patrol.
fn patrolling_units(ctx: &mut PhaseContext<'_>) -> Result<BTreeSet<UnitId>, StoreError> {
    let mut patrollers = BTreeSet::new();
    let orders = ctx.store.orders_for_phase(
        ctx.guild,
        ctx.resolving,
        crate::order::Phase::NavalMovement,
        &[OrderStatus::Ongoing],
    )?;
    for order in orders {
        if order.order_type == OrderType::Unit
            && order.unit_action() == Some(UnitAction::NavalPatrol)
        {
            patrollers.extend(order.unit_ids.iter().cloned());
        }
    }
    Ok(patrollers)
}

fn naval_units_in(
    ctx: &mut PhaseContext<'_>,
    territory_id: &TerritoryId,
) -> Result<Vec<Unit>, StoreError> {
    let mut units = Vec::new();
    for unit_id in ctx.store.naval_units_occupying(ctx.guild, territory_id)? {
        if let Some(unit) = ctx.store.fetch_unit(ctx.guild, &unit_id)? {
            if unit.is_active() && unit.is_naval() {
                units.push(unit);
            }
        }
    }
    Ok(units)
}

fn naval_sides_hostile(
    ctx: &mut PhaseContext<'_>,
    a: &CombatSide,
    b: &CombatSide,
) -> Result<bool, StoreError> {
    if a.has_keyword(keyword::HOSTILE) || b.has_keyword(keyword::HOSTILE) {
        return Ok(true);
    }
    for fa in &a.factions {
        for fb in &b.factions {
            if relations::are_at_war(ctx.store, ctx.guild, fa, fb)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// One side shells the other. Submarines slip out of any pairing where
/// they would not deal damage: they neither fire nor get fired upon, and
/// remain hidden.
fn exchange_damage(attacker: &CombatSide, defender: &CombatSide, damage: &mut BTreeMap<UnitId, i64>) {
    let attacker_engages_submarines = attacker.total_attack() > defender.total_defense();
    let defender_engages_submarines = defender.total_attack() > attacker.total_defense();

    let attackers: Vec<&Unit> = attacker
        .active_units()
        .filter(|u| attacker_engages_submarines || !u.has_keyword(keyword::SUBMARINE))
        .collect();
    let defenders: Vec<&Unit> = defender
        .active_units()
        .filter(|u| defender_engages_submarines || !u.has_keyword(keyword::SUBMARINE))
        .collect();

    let attack: i64 = attackers.iter().map(|u| u.attack).sum();
    let defense: i64 = defenders.iter().map(|u| u.defense).sum();

    if attack > defense {
        for unit in &defenders {
            *damage.entry(unit.unit_id.clone()).or_insert(0) += 2;
        }
    }
    if attackers.iter().any(|u| u.has_keyword(keyword::SPIRIT)) {
        for unit in &defenders {
            *damage.entry(unit.unit_id.clone()).or_insert(0) += 1;
        }
    }
}

/// Apply the accumulated damage, sink what goes under, and cascade into
/// any carried cargo.
fn apply_naval_damage(
    ctx: &mut PhaseContext<'_>,
    damage: HashMap<UnitId, i64>,
) -> Result<(), StoreError> {
    let mut ordered: Vec<(UnitId, i64)> = damage.into_iter().collect();
    ordered.sort();

    for (unit_id, lost) in ordered {
        let Some(mut unit) = ctx.store.fetch_unit(ctx.guild, &unit_id)? else {
            continue;
        };
        unit.organization -= lost;
        let sunk = unit.organization <= 0 && unit.status == UnitStatus::Active;
        if sunk {
            unit.status = UnitStatus::Disbanded;
        }
        ctx.store.upsert_unit(ctx.guild, &unit)?;

        if sunk {
            ctx.store
                .set_naval_positions(ctx.guild, &unit_id, Default::default())?;
            let audience =
                relations::unit_audience(ctx.store, ctx.guild, std::slice::from_ref(&unit))?;
            let event = ctx
                .event(EventKind::UnitDisbanded, EntityKind::Unit, unit_id.as_str())
                .with("cause", "naval_combat")
                .for_audience(audience);
            ctx.push(event);

            if unit.capacity > 0 {
                destroy_transported_cargo(ctx, &unit)?;
            }
        }
    }
    Ok(())
}

/// A sunk transport takes its cargo down with it. The manifest was
/// persisted on the naval order at the moment of coupling.
fn destroy_transported_cargo(ctx: &mut PhaseContext<'_>, carrier: &Unit) -> Result<(), StoreError> {
    let orders = ctx.store.orders_for_units(
        ctx.guild,
        std::slice::from_ref(&carrier.unit_id),
        &[OrderStatus::Ongoing],
    )?;
    for mut order in orders {
        if order.order_type != OrderType::Unit
            || order.unit_action() != Some(UnitAction::NavalTransport)
        {
            continue;
        }
        let cargo = order.result.carrying_units.clone().unwrap_or_default();
        if !cargo.is_empty() {
            let event = ctx
                .event(
                    EventKind::TransportCargoDestroyed,
                    EntityKind::Unit,
                    carrier.unit_id.as_str(),
                )
                .with("cargo", &cargo)
                .for_audience(relations::unit_audience(
                    ctx.store,
                    ctx.guild,
                    std::slice::from_ref(carrier),
                )?);
            ctx.push(event);
        }
        for cargo_id in &cargo {
            let Some(mut cargo_unit) = ctx.store.fetch_unit(ctx.guild, cargo_id)? else {
                continue;
            };
            if cargo_unit.status != UnitStatus::Active {
                continue;
            }
            cargo_unit.status = UnitStatus::Disbanded;
            cargo_unit.organization = 0;
            ctx.store.upsert_unit(ctx.guild, &cargo_unit)?;
            let audience = relations::unit_audience(
                ctx.store,
                ctx.guild,
                std::slice::from_ref(&cargo_unit),
            )?;
            let event = ctx
                .event(EventKind::UnitDisbanded, EntityKind::Unit, cargo_id.as_str())
                .with("cause", "transport_destroyed")
                .for_audience(audience);
            ctx.push(event);

            // The carried land order can no longer complete.
            let land_orders = ctx.store.orders_for_units(
                ctx.guild,
                std::slice::from_ref(cargo_id),
                &[OrderStatus::Ongoing, OrderStatus::Pending],
            )?;
            for land_order in land_orders {
                ctx.fail_order(&land_order, String::from("transport destroyed at sea"))?;
            }
        }

        order.status = OrderStatus::Failed;
        order.result.error = Some(String::from("transport destroyed at sea"));
        order.updated_turn = Some(ctx.resolving);
        ctx.store.update_order(ctx.guild, &order)?;
    }
    Ok(())
}
