//! Tick-based movement resolution for the Movement and Naval Movement
//! phases, plus the encirclement sweep that runs between movement and
//! combat.
//!
//! Movement never computes combat damage. Groups step one territory at a
//! time in priority order; a step that would land on hostile units marks
//! the group engaged and stops it for the turn.

mod encircle;
mod state;

pub(crate) use encircle::run_encirclement;

use self::state::MovementState;
use super::{load_map, relations, ExecError, PhaseContext};
use crate::event::{EntityKind, EventKind};
use crate::geo::WorldMap;
use crate::ids::TerritoryId;
use crate::order::{
    MovementStatus, Order, OrderStatus, OrderType, UnitAction,
};
use crate::store::StoreError;
use crate::unit::Unit;
use std::collections::BTreeSet;

pub(crate) fn run_land_movement(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let map = load_map(ctx)?;
    let mut states = build_states(ctx)?;
    relink_transports(&mut states);
    attempt_couplings(ctx, &mut states)?;
    tick_loop(ctx, &map, &mut states, true)?;
    finalize(ctx, &map, states)
}

/// Re-establish couplings that were formed on an earlier turn: carried
/// land orders point at their naval carrier in their result data.
fn relink_transports(states: &mut [MovementState]) {
    let links: Vec<(crate::ids::OrderId, crate::ids::OrderId)> = states
        .iter()
        .filter(|s| s.status == MovementStatus::Transported)
        .filter_map(|s| {
            s.order
                .result
                .transport_naval_order_id
                .clone()
                .map(|naval| (s.order.order_id.clone(), naval))
        })
        .collect();
    for (land_order_id, naval_order_id) in links {
        if let Some(naval) = states.iter_mut().find(|s| s.order.order_id == naval_order_id) {
            naval.carrying.push(land_order_id);
        }
    }
}

pub(crate) fn run_naval_movement(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let map = load_map(ctx)?;
    let mut states = build_states(ctx)?;
    tick_loop(ctx, &map, &mut states, false)?;
    finalize(ctx, &map, states)
}

/// Rebuild movement states for every unresolved order in this phase.
/// Orders whose units have vanished fail individually.
fn build_states(ctx: &mut PhaseContext<'_>) -> Result<Vec<MovementState>, StoreError> {
    let mut states = Vec::new();
    for order in ctx.unresolved_orders()? {
        if order.order_type != OrderType::Unit {
            ctx.fail_order(&order, format!("{} is not a movement order", order.order_type))?;
            continue;
        }
        match build_one_state(ctx, &order) {
            Ok(Some(state)) => states.push(state),
            Ok(None) => {}
            Err(ExecError::Failed(message)) => ctx.fail_order(&order, message)?,
            Err(ExecError::Store(e)) => match e {
                StoreError::Transient(_) | StoreError::Fatal(_) => return Err(e),
                recoverable => ctx.fail_order(&order, recoverable.to_string())?,
            },
        }
    }
    Ok(states)
}

fn build_one_state(
    ctx: &mut PhaseContext<'_>,
    order: &Order,
) -> Result<Option<MovementState>, ExecError> {
    let mut units = Vec::new();
    for unit_id in &order.unit_ids {
        if let Some(unit) = ctx.store.fetch_unit(ctx.guild, unit_id)? {
            if unit.is_active() {
                units.push(unit);
            }
        }
    }
    if units.is_empty() {
        return Err(ExecError::failed("every unit in the order is gone"));
    }
    let current = units[0]
        .current_territory
        .clone()
        .ok_or_else(|| ExecError::failed("the unit group has no position"))?;

    let mut state = MovementState::rebuild(order.clone(), units, current);

    // A naval transport with no cargo aboard waits at its starting water
    // territory for a land group to arrive at the coast.
    if state.action == UnitAction::NavalTransport
        && state.status == MovementStatus::Moving
        && state.order.result.carrying_units.is_none()
    {
        state.status = MovementStatus::WaitingForCargo;
    }
    // Convoys are stationed, not moving: their footprint is computed at
    // the end of the phase.
    if matches!(state.action, UnitAction::AerialConvoy | UnitAction::NavalConvoy) {
        state.status = MovementStatus::PathComplete;
    }

    log::debug!(
        "guild {}: order {} rebuilt as {:?} with {} units and {} movement points",
        ctx.guild,
        state.order.order_id,
        state.status,
        state.units.len(),
        state.total_mp
    );
    Ok(Some(state))
}

/// One group's next step target, accounting for patrol wrap-around.
fn next_target(state: &MovementState) -> Option<TerritoryId> {
    if !state.is_at_path_end() {
        return state.next_territory().cloned();
    }
    if matches!(state.action, UnitAction::Patrol | UnitAction::NavalPatrol) {
        let path = state.path();
        if path.len() >= 2 {
            return if path[0] == state.current_territory {
                Some(path[1].clone())
            } else {
                Some(path[0].clone())
            };
        }
    }
    None
}

fn step_cost(map: &WorldMap, state: &MovementState, target: &TerritoryId) -> u32 {
    if state.action.is_naval() {
        return 1;
    }
    map.territory(target)
        .map(|t| t.terrain.entry_cost())
        .unwrap_or(1)
}

fn can_step(map: &WorldMap, state: &MovementState) -> bool {
    if state.status != MovementStatus::Moving {
        return false;
    }
    if !state.within_patrol_budget() {
        return false;
    }
    let Some(target) = next_target(state) else {
        return false;
    };
    state.remaining_mp >= step_cost(map, state, &target)
}

/// Repeatedly step the next eligible group in priority order until no
/// group can move.
fn tick_loop(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    states: &mut Vec<MovementState>,
    land_phase: bool,
) -> Result<(), StoreError> {
    states.sort_by_key(|s| (s.order.priority, s.order.submitted_at));
    loop {
        let Some(index) = states.iter().position(|s| can_step(map, s)) else {
            break;
        };
        step(ctx, map, states, index, land_phase)?;
        if land_phase {
            attempt_couplings(ctx, states)?;
        }
    }
    // Groups that still have path ahead but no points are out for the
    // turn; their orders resume next turn.
    for state in states.iter_mut() {
        if state.status == MovementStatus::Moving && !state.is_at_path_end() {
            state.status = MovementStatus::OutOfMp;
        }
    }
    Ok(())
}

fn step(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    states: &mut [MovementState],
    index: usize,
    land_phase: bool,
) -> Result<(), StoreError> {
    let (action, target) = {
        let state = &states[index];
        let Some(target) = next_target(state) else {
            return Ok(());
        };
        (state.action, target)
    };

    // A land transport group walks up to the coast and waits there; the
    // water segment is sailed by its naval carrier.
    if action == UnitAction::Transport {
        let entering_water = map.territory(&target).map(|t| t.is_water()).unwrap_or(false);
        if entering_water {
            states[index].status = MovementStatus::WaitingForTransport;
            return Ok(());
        }
    }

    // Engagement detection: stepping onto hostile units stops the group
    // before it enters. Exempt groups (and naval sailing) pass through.
    let group_exempt = states[index]
        .units
        .iter()
        .all(|u| u.is_exempt_from_engagement());
    if land_phase && !action.is_naval() && !group_exempt {
        if let Some(blockers) = hostile_occupants(ctx, &states[index], &target)? {
            let state = &mut states[index];
            state.status = MovementStatus::Engaged;
            state.blocked_at = Some(target.clone());
            let unit_ids: Vec<_> = state.units.iter().map(|u| u.unit_id.clone()).collect();
            let at = state.current_territory.clone();
            let order_id = state.order.order_id.clone();

            let mut audience =
                relations::unit_audience(ctx.store, ctx.guild, &states[index].units)?;
            audience.extend(relations::unit_audience(ctx.store, ctx.guild, &blockers)?);
            let event = ctx
                .event(EventKind::EngagementDetected, EntityKind::Order, order_id.as_str())
                .with("units", unit_ids)
                .with("held_at", at)
                .with("blocked_at", &target)
                .with(
                    "blocking_units",
                    blockers.iter().map(|u| u.unit_id.clone()).collect::<Vec<_>>(),
                )
                .for_audience(audience);
            ctx.push(event);
            return Ok(());
        }
    }

    // Commit the step.
    let cost = step_cost(map, &states[index], &target);
    {
        let state = &mut states[index];
        state.remaining_mp -= cost;
        state.mp_expended += cost;
        state.current_territory = target.clone();
        state.territories_entered.push(target.clone());

        if state.is_at_path_end()
            && matches!(state.action, UnitAction::Patrol | UnitAction::NavalPatrol)
        {
            // Wrap the loop: position the index at the target's first
            // occurrence so the patrol keeps circling.
            let wrapped = state.path().iter().position(|t| t == &target).unwrap_or(0);
            state.path_index = wrapped;
        } else {
            state.path_index += 1;
        }
    }

    // A coupled naval transport drags its cargo along.
    if action == UnitAction::NavalTransport {
        let carrying = states[index].carrying.clone();
        for land_order_id in &carrying {
            if let Some(land) = states.iter_mut().find(|s| &s.order.order_id == land_order_id) {
                land.current_territory = target.clone();
                land.path_index += 1;
            }
        }
        if states[index].is_at_path_end() {
            disembark(ctx, states, index)?;
        }
    } else if states[index].is_at_path_end()
        && !matches!(states[index].action, UnitAction::Patrol | UnitAction::NavalPatrol)
    {
        states[index].status = MovementStatus::PathComplete;
    }
    Ok(())
}

/// Hostile active units standing in `target`, if any. Infiltrators and
/// aerial units neither trigger nor block engagement.
fn hostile_occupants(
    ctx: &mut PhaseContext<'_>,
    state: &MovementState,
    target: &TerritoryId,
) -> Result<Option<Vec<Unit>>, StoreError> {
    let own_ids: BTreeSet<_> = state.units.iter().map(|u| u.unit_id.clone()).collect();
    let occupants: Vec<Unit> = ctx
        .store
        .units_in_territory(ctx.guild, target)?
        .into_iter()
        .filter(|u| {
            u.is_active()
                && !u.is_naval()
                && !u.is_exempt_from_engagement()
                && !own_ids.contains(&u.unit_id)
        })
        .collect();
    if occupants.is_empty() {
        return Ok(None);
    }
    let hostiles: Vec<Unit> = {
        let mut found = Vec::new();
        for occupant in &occupants {
            if relations::units_hostile(
                ctx.store,
                ctx.guild,
                &state.units,
                std::slice::from_ref(occupant),
            )? {
                found.push(occupant.clone());
            }
        }
        found
    };
    if hostiles.is_empty() {
        Ok(None)
    } else {
        Ok(Some(hostiles))
    }
}

/// Match waiting land groups at the coast with waiting naval transports
/// whose water path carries them to their disembark territory.
fn attempt_couplings(
    ctx: &mut PhaseContext<'_>,
    states: &mut [MovementState],
) -> Result<(), StoreError> {
    let land_indices: Vec<usize> = states
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.action == UnitAction::Transport && s.status == MovementStatus::WaitingForTransport
        })
        .map(|(i, _)| i)
        .collect();

    for land_index in land_indices {
        let water_path = match &states[land_index].order.data {
            crate::order::OrderData::UnitAction {
                water_path: Some(segment),
                ..
            } => segment.clone(),
            _ => continue,
        };
        let (water_first, water_last) = match (water_path.first(), water_path.last()) {
            (Some(first), Some(last)) => (first.clone(), last.clone()),
            _ => continue,
        };

        let carrier = states.iter().position(|s| {
            s.action == UnitAction::NavalTransport
                && s.status == MovementStatus::WaitingForCargo
                && s.current_territory == water_first
                && s.path().first() == Some(&water_first)
                && s.path().last() == Some(&water_last)
        });
        let Some(naval_index) = carrier else {
            continue;
        };

        // Capacity check: the carrier fleet must fit the land group.
        let capacity: u32 = states[naval_index].units.iter().map(|u| u.capacity).sum();
        let cargo_size: u32 = states[land_index].units.iter().map(|u| u.size.max(1)).sum();
        if cargo_size > capacity {
            continue;
        }

        let land_order_id = states[land_index].order.order_id.clone();
        let naval_order_id = states[naval_index].order.order_id.clone();
        let cargo_units: Vec<_> = states[land_index]
            .units
            .iter()
            .map(|u| u.unit_id.clone())
            .collect();
        let embark_at = states[naval_index].current_territory.clone();

        {
            let land = &mut states[land_index];
            land.status = MovementStatus::Transported;
            land.current_territory = embark_at.clone();
            land.path_index += 1;
            land.order.result.transport_naval_order_id = Some(naval_order_id.clone());
        }
        {
            let naval = &mut states[naval_index];
            naval.status = MovementStatus::Moving;
            naval.carrying.push(land_order_id.clone());
            let mut all_cargo = naval.order.result.carrying_units.clone().unwrap_or_default();
            all_cargo.extend(cargo_units.iter().cloned());
            all_cargo.sort();
            all_cargo.dedup();
            // Persisted at the moment of coupling so transport destruction
            // never has to reconstruct the manifest.
            naval.order.result.carrying_units = Some(all_cargo);
        }

        let audience = relations::unit_audience(ctx.store, ctx.guild, &states[land_index].units)?;
        let event = ctx
            .event(EventKind::UnitsEmbarked, EntityKind::Order, naval_order_id.as_str())
            .with("units", cargo_units)
            .with("at", embark_at)
            .with("land_order", &land_order_id)
            .for_audience(audience);
        ctx.push(event);

        // A single-hop crossing is already at the far shore.
        if states[naval_index].is_at_path_end() {
            disembark(ctx, states, naval_index)?;
        }
    }
    Ok(())
}

/// Unload every carried land group at its disembark territory.
fn disembark(
    ctx: &mut PhaseContext<'_>,
    states: &mut [MovementState],
    naval_index: usize,
) -> Result<(), StoreError> {
    states[naval_index].status = MovementStatus::PathComplete;
    let carrying = states[naval_index].carrying.clone();
    let naval_order_id = states[naval_index].order.order_id.clone();

    for land_order_id in carrying {
        let Some(land_index) = states
            .iter()
            .position(|s| s.order.order_id == land_order_id)
        else {
            continue;
        };
        let disembark_territory = match &states[land_index].order.data {
            crate::order::OrderData::UnitAction {
                disembark_territory: Some(t),
                ..
            } => t.clone(),
            _ => continue,
        };

        {
            let land = &mut states[land_index];
            land.current_territory = disembark_territory.clone();
            let position = land
                .path()
                .iter()
                .position(|t| t == &disembark_territory)
                .unwrap_or(land.path_index);
            land.path_index = position;
            land.status = if land.is_at_path_end() {
                MovementStatus::PathComplete
            } else {
                MovementStatus::Moving
            };
        }

        let unit_ids: Vec<_> = states[land_index]
            .units
            .iter()
            .map(|u| u.unit_id.clone())
            .collect();
        let audience =
            relations::unit_audience(ctx.store, ctx.guild, &states[land_index].units)?;
        let event = ctx
            .event(EventKind::UnitsDisembarked, EntityKind::Order, naval_order_id.as_str())
            .with("units", unit_ids)
            .with("at", &disembark_territory)
            .for_audience(audience);
        ctx.push(event);

        // Disembarking into a contested shore stops the group there.
        if let Some(blockers) = hostile_occupants(ctx, &states[land_index], &disembark_territory)?
        {
            let land = &mut states[land_index];
            land.status = MovementStatus::Engaged;
            land.blocked_at = Some(disembark_territory.clone());
            let order_id = land.order.order_id.clone();
            let mut audience =
                relations::unit_audience(ctx.store, ctx.guild, &states[land_index].units)?;
            audience.extend(relations::unit_audience(ctx.store, ctx.guild, &blockers)?);
            let event = ctx
                .event(EventKind::EngagementDetected, EntityKind::Order, order_id.as_str())
                .with("blocked_at", &disembark_territory)
                .for_audience(audience);
            ctx.push(event);
        }
    }
    Ok(())
}

/// Write every state back: unit positions, naval occupancy, order status
/// and result data, completion events.
fn finalize(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    states: Vec<MovementState>,
) -> Result<(), StoreError> {
    for mut state in states {
        for unit in &mut state.units {
            unit.current_territory = Some(state.current_territory.clone());
            ctx.store.upsert_unit(ctx.guild, unit)?;
        }

        if state.action.is_naval() {
            let occupancy = naval_occupancy(ctx, map, &state)?;
            for unit in &state.units {
                ctx.store
                    .set_naval_positions(ctx.guild, &unit.unit_id, occupancy.clone())?;
            }
        }

        let completed = state.status == MovementStatus::PathComplete
            && !state.action.lingers_after_arrival();
        if completed {
            let kind = match state.action {
                UnitAction::Transit | UnitAction::NavalTransit => EventKind::TransitComplete,
                _ => EventKind::MovementComplete,
            };
            let audience = relations::unit_audience(ctx.store, ctx.guild, &state.units)?;
            let event = ctx
                .event(kind, EntityKind::Order, state.order.order_id.as_str())
                .with("action", state.action)
                .with(
                    "units",
                    state.units.iter().map(|u| u.unit_id.clone()).collect::<Vec<_>>(),
                )
                .with("at", &state.current_territory)
                .for_audience(audience);
            ctx.push(event);
        }

        state.persist_into_order();
        state.order.status = if completed {
            OrderStatus::Success
        } else {
            OrderStatus::Ongoing
        };
        state.order.updated_turn = Some(ctx.resolving);
        ctx.store.update_order(ctx.guild, &state.order)?;
    }
    Ok(())
}

/// The set of water territories a naval group occupies after this phase.
/// Patrols cover everything they swept; convoys cover their reachable
/// window; everything else sits in its current territory.
fn naval_occupancy(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    state: &MovementState,
) -> Result<BTreeSet<TerritoryId>, StoreError> {
    let mut occupancy = BTreeSet::new();
    occupancy.insert(state.current_territory.clone());
    match state.action {
        UnitAction::NavalPatrol => {
            occupancy.extend(state.territories_entered.iter().cloned());
            // The loop's starting point stays covered.
            if let Some(first) = state.path().first() {
                occupancy.insert(first.clone());
            }
        }
        UnitAction::NavalConvoy => {
            occupancy.extend(convoy_window(ctx, map, state)?);
        }
        _ => {}
    }
    Ok(occupancy)
}

/// The convoy window: the suffix of the convoy's path beginning at the
/// first water territory adjacent to land the owning faction (or its
/// allies) controls.
fn convoy_window(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    state: &MovementState,
) -> Result<BTreeSet<TerritoryId>, StoreError> {
    let friendly = match relations::unit_faction(&state.units[0]) {
        Some(faction) => relations::allied_closure(ctx.store, ctx.guild, faction)?,
        None => Default::default(),
    };

    let anchored_at = state.path().iter().position(|territory_id| {
        map.neighbors(territory_id).any(|neighbor| {
            map.territory(neighbor)
                .map(|t| {
                    if t.is_water() {
                        return false;
                    }
                    match &t.controller {
                        Some(crate::geo::Controller::Faction(f)) => friendly.contains(f),
                        Some(crate::geo::Controller::Character(c)) => {
                            state.units[0].owning_character() == Some(c)
                        }
                        None => false,
                    }
                })
                .unwrap_or(false)
        })
    });

    Ok(match anchored_at {
        Some(start) => state.path()[start..].iter().cloned().collect(),
        None => BTreeSet::new(),
    })
}
