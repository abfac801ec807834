//! Land combat resolution.
//!
//! Combat operates per territory on the units standing there. Units group
//! into sides by the transitive closure of active alliances; hostile pairs
//! of sides exchange simultaneous organization damage in rounds until one
//! side remains, somebody retreats, or the safety limit trips.

mod naval;
mod sides;

pub(crate) use naval::run_naval_combat;
pub(crate) use sides::{group_into_sides, CombatSide};

use super::{load_map, relations, PhaseContext};
use crate::event::{EntityKind, EventKind};
use crate::geo::{Controller, WorldMap};
use crate::ids::TerritoryId;
use crate::order::{MovementStatus, Order, OrderStatus, OrderType, UnitAction};
use crate::store::StoreError;
use crate::unit::{keyword, Unit, UnitStatus};
use std::collections::{BTreeSet, HashMap};

/// Safety valve; never expected to trip in correct play.
const MAX_ROUNDS: usize = 10;
/// Organization lost by every unit on a side whose defense was overcome.
const ROUND_DAMAGE: i64 = 2;

pub(crate) fn run_land_combat(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let map = load_map(ctx)?;
    let mut territories: BTreeSet<TerritoryId> = BTreeSet::new();
    for unit in ctx.store.all_units(ctx.guild)? {
        if unit.is_active() && !unit.is_naval() && !unit.is_exempt_from_engagement() {
            if let Some(t) = &unit.current_territory {
                territories.insert(t.clone());
            }
        }
    }
    for territory_id in territories {
        resolve_territory(ctx, &map, &territory_id)?;
    }
    Ok(())
}

fn resolve_territory(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    territory_id: &TerritoryId,
) -> Result<(), StoreError> {
    let combatants: Vec<Unit> = ctx
        .store
        .units_in_territory(ctx.guild, territory_id)?
        .into_iter()
        .filter(|u| u.is_active() && !u.is_naval() && !u.is_exempt_from_engagement())
        .collect();
    if combatants.is_empty() {
        return Ok(());
    }

    let mut sides = group_into_sides(ctx, combatants)?;
    load_side_actions(ctx, &mut sides)?;

    let mut hostile_pairs = find_hostile_pairs(ctx, &sides, territory_id)?;
    let had_combat = !hostile_pairs.is_empty();
    let mut rounds = 0usize;

    while !hostile_pairs.is_empty() && rounds < MAX_ROUNDS {
        rounds += 1;
        let mut effects = false;

        // Damage across every hostile pair is computed before any of it is
        // applied.
        let mut damage: HashMap<crate::ids::UnitId, i64> = HashMap::new();
        for &(a, b) in &hostile_pairs {
            accumulate_pair_damage(&sides[a], &sides[b], &mut damage);
            accumulate_pair_damage(&sides[b], &sides[a], &mut damage);
        }
        if !damage.is_empty() {
            effects = true;
        }
        apply_damage(ctx, &mut sides, &damage)?;

        // Disbandment precedes retreat.
        for side in &mut sides {
            side.prune_dead();
        }

        let retreaters = choose_retreating_sides(ctx, map, &sides, &hostile_pairs, territory_id)?;
        for side_index in retreaters {
            if execute_retreat(ctx, map, &mut sides, side_index, territory_id)? {
                effects = true;
            }
        }

        sides_retain_nonempty(&mut sides);
        hostile_pairs = find_hostile_pairs(ctx, &sides, territory_id)?;

        // A round that changed nothing is a stalemate; further rounds
        // would change nothing either.
        if !effects {
            break;
        }
    }

    if rounds == MAX_ROUNDS {
        let event = ctx
            .event(EventKind::CombatMaxRounds, EntityKind::Territory, territory_id.as_str())
            .for_audience(audience_of_sides(ctx, &sides)?);
        ctx.push(event);
    }

    if had_combat {
        let survivors: Vec<_> = sides
            .iter()
            .flat_map(|s| s.units.iter().map(|u| u.unit_id.clone()))
            .collect();
        let event = ctx
            .event(EventKind::CombatEnded, EntityKind::Territory, territory_id.as_str())
            .with("rounds", rounds)
            .with("surviving_units", survivors)
            .for_audience(audience_of_sides(ctx, &sides)?);
        ctx.push(event);
    }

    resolve_capture(ctx, map, &sides, territory_id)?;
    resolve_siege(ctx, map, &sides, territory_id)?;
    complete_battlefield_orders(ctx, territory_id)?;
    Ok(())
}

/// The battlefield action each side is pursuing, read from the units'
/// ongoing orders.
fn load_side_actions(
    ctx: &mut PhaseContext<'_>,
    sides: &mut [CombatSide],
) -> Result<(), StoreError> {
    for side_index in 0..sides.len() {
        let mut action = None;
        let units = sides[side_index].units.clone();
        for unit in &units {
            if let Some(found) = unit_battle_action(ctx, unit)? {
                // Capture outranks raid when a side somehow runs both.
                if action.is_none() || found == UnitAction::Capture {
                    action = Some(found);
                }
            }
        }
        sides[side_index].action = action;
        sides[side_index].has_capture = action == Some(UnitAction::Capture);
    }
    Ok(())
}

fn unit_battle_action(
    ctx: &mut PhaseContext<'_>,
    unit: &Unit,
) -> Result<Option<UnitAction>, StoreError> {
    let orders = ctx.store.orders_for_units(
        ctx.guild,
        std::slice::from_ref(&unit.unit_id),
        &[OrderStatus::Ongoing],
    )?;
    for order in orders {
        if order.order_type != OrderType::Unit {
            continue;
        }
        if let Some(action @ (UnitAction::Raid | UnitAction::Capture | UnitAction::Siege)) =
            order.unit_action()
        {
            return Ok(Some(action));
        }
    }
    Ok(None)
}

/// Mutually exclusive battlefield actions force combat between otherwise
/// neutral sides.
fn actions_conflict(a: Option<UnitAction>, b: Option<UnitAction>) -> bool {
    matches!(
        (a, b),
        (Some(UnitAction::Capture), Some(UnitAction::Capture))
            | (Some(UnitAction::Capture), Some(UnitAction::Raid))
            | (Some(UnitAction::Raid), Some(UnitAction::Capture))
            | (Some(UnitAction::Raid), Some(UnitAction::Raid))
    )
}

/// Pairs of side indices that will fight. Emits the action-conflict event
/// the first time a conflict pairing is seen.
fn find_hostile_pairs(
    ctx: &mut PhaseContext<'_>,
    sides: &[CombatSide],
    territory_id: &TerritoryId,
) -> Result<Vec<(usize, usize)>, StoreError> {
    let mut pairs = Vec::new();
    for a in 0..sides.len() {
        for b in (a + 1)..sides.len() {
            if sides[a].units.is_empty() || sides[b].units.is_empty() {
                continue;
            }
            // Sides grouped apart are never allied, so the keyword check
            // does not need an alliance exception here.
            let keyword_hostile = sides[a].has_keyword(keyword::HOSTILE)
                || sides[b].has_keyword(keyword::HOSTILE);
            let mut at_war = false;
            'war: for fa in &sides[a].factions {
                for fb in &sides[b].factions {
                    if relations::are_at_war(ctx.store, ctx.guild, fa, fb)? {
                        at_war = true;
                        break 'war;
                    }
                }
            }
            let conflict = actions_conflict(sides[a].action, sides[b].action);

            if at_war || keyword_hostile || conflict {
                if conflict && !at_war && !keyword_hostile {
                    let mut audience = relations::unit_audience(ctx.store, ctx.guild, &sides[a].units)?;
                    audience
                        .extend(relations::unit_audience(ctx.store, ctx.guild, &sides[b].units)?);
                    let event = ctx
                        .event(
                            EventKind::CombatActionConflict,
                            EntityKind::Territory,
                            territory_id.as_str(),
                        )
                        .with("action_a", sides[a].action)
                        .with("action_b", sides[b].action)
                        .for_audience(audience);
                    ctx.push(event);
                }
                pairs.push((a, b));
            }
        }
    }
    Ok(pairs)
}

/// Damage dealt by `attacker` to `defender` in one round: two points of
/// organization per defending unit when the attack total beats the defense
/// total, plus one flat point when any attacker carries the spirit keyword.
fn accumulate_pair_damage(
    attacker: &CombatSide,
    defender: &CombatSide,
    damage: &mut HashMap<crate::ids::UnitId, i64>,
) {
    if attacker.total_attack() > defender.total_defense() {
        for unit in defender.active_units() {
            *damage.entry(unit.unit_id.clone()).or_insert(0) += ROUND_DAMAGE;
        }
    }
    if attacker.has_keyword(keyword::SPIRIT) {
        for unit in defender.active_units() {
            *damage.entry(unit.unit_id.clone()).or_insert(0) += 1;
        }
    }
}

fn apply_damage(
    ctx: &mut PhaseContext<'_>,
    sides: &mut [CombatSide],
    damage: &HashMap<crate::ids::UnitId, i64>,
) -> Result<(), StoreError> {
    for side in sides.iter_mut() {
        for unit in &mut side.units {
            let Some(&lost) = damage.get(&unit.unit_id) else {
                continue;
            };
            unit.organization -= lost;
            if unit.organization <= 0 && unit.status == UnitStatus::Active {
                unit.status = UnitStatus::Disbanded;
                let audience =
                    relations::unit_audience(ctx.store, ctx.guild, std::slice::from_ref(&*unit))?;
                let event = ctx
                    .event(EventKind::UnitDisbanded, EntityKind::Unit, unit.unit_id.as_str())
                    .with("cause", "combat")
                    .for_audience(audience);
                ctx.push(event);
            }
            ctx.store.upsert_unit(ctx.guild, unit)?;
        }
    }
    Ok(())
}

/// For each surviving hostile pair, the side with strictly lower total
/// attack retreats; ties go to the territory controller. Immobile units
/// pin both sides in place.
fn choose_retreating_sides(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    sides: &[CombatSide],
    hostile_pairs: &[(usize, usize)],
    territory_id: &TerritoryId,
) -> Result<Vec<usize>, StoreError> {
    let controller_faction = match map.territory(territory_id) {
        Some(t) => relations::territory_faction(ctx.store, ctx.guild, t)?,
        None => None,
    };

    let mut retreaters = BTreeSet::new();
    for &(a, b) in hostile_pairs {
        if sides[a].units.is_empty() || sides[b].units.is_empty() {
            continue;
        }
        if sides[a].has_keyword(keyword::IMMOBILE) || sides[b].has_keyword(keyword::IMMOBILE) {
            continue;
        }
        let (attack_a, attack_b) = (sides[a].total_attack(), sides[b].total_attack());
        let loser = if attack_a < attack_b {
            Some(a)
        } else if attack_b < attack_a {
            Some(b)
        } else if let Some(controller) = &controller_faction {
            if sides[a].factions.contains(controller) {
                Some(b)
            } else if sides[b].factions.contains(controller) {
                Some(a)
            } else {
                None
            }
        } else {
            None
        };
        if let Some(index) = loser {
            retreaters.insert(index);
        }
    }
    Ok(retreaters.into_iter().collect())
}

/// Move a retreating side out of the territory. Returns false when no
/// destination accepts them, in which case combat continues.
fn execute_retreat(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    sides: &mut [CombatSide],
    side_index: usize,
    territory_id: &TerritoryId,
) -> Result<bool, StoreError> {
    let destination = {
        let side = &sides[side_index];
        if side.units.is_empty() {
            return Ok(false);
        }
        find_retreat_destination(ctx, map, side, territory_id)?
    };
    let Some(destination) = destination else {
        log::debug!(
            "guild {}: side in {} found no retreat destination",
            ctx.guild,
            territory_id
        );
        return Ok(false);
    };

    let mut moved = Vec::new();
    for unit in &mut sides[side_index].units {
        if unit.status == UnitStatus::Active && unit.organization > 0 {
            unit.current_territory = Some(destination.clone());
            ctx.store.upsert_unit(ctx.guild, unit)?;
            moved.push(unit.unit_id.clone());
        }
    }
    if moved.is_empty() {
        return Ok(false);
    }

    let audience = relations::unit_audience(ctx.store, ctx.guild, &sides[side_index].units)?;
    let event = ctx
        .event(EventKind::CombatRetreat, EntityKind::Territory, territory_id.as_str())
        .with("units", moved)
        .with("from_territory", territory_id)
        .with("to_territory", &destination)
        .for_audience(audience);
    ctx.push(event);

    sides[side_index].units.clear();
    Ok(true)
}

/// Pick where a side retreats to: the previous step on its own movement
/// path when that is clear, otherwise the best adjacent non-water
/// territory without hostiles, preferring friendly-controlled ground and
/// breaking ties alphabetically.
fn find_retreat_destination(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    side: &CombatSide,
    territory_id: &TerritoryId,
) -> Result<Option<TerritoryId>, StoreError> {
    if let Some(previous) = previous_path_step(ctx, side, territory_id)? {
        if !territory_has_hostiles(ctx, side, &previous)? {
            return Ok(Some(previous));
        }
    }

    let friendly = side.friendly_closure(ctx)?;
    let mut candidates: Vec<(bool, TerritoryId)> = Vec::new();
    for neighbor in map.neighbors(territory_id) {
        let Some(territory) = map.territory(neighbor) else {
            continue;
        };
        if territory.is_water() {
            continue;
        }
        if territory_has_hostiles(ctx, side, neighbor)? {
            continue;
        }
        let is_friendly = match &territory.controller {
            Some(Controller::Faction(f)) => friendly.contains(f),
            Some(Controller::Character(c)) => side
                .units
                .iter()
                .any(|u| u.owning_character() == Some(c)),
            None => false,
        };
        candidates.push((is_friendly, neighbor.clone()));
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(candidates.into_iter().next().map(|(_, id)| id))
}

/// The territory the side came from, read off any unit's movement path.
fn previous_path_step(
    ctx: &mut PhaseContext<'_>,
    side: &CombatSide,
    territory_id: &TerritoryId,
) -> Result<Option<TerritoryId>, StoreError> {
    for unit in &side.units {
        let orders = ctx.store.orders_for_units(
            ctx.guild,
            std::slice::from_ref(&unit.unit_id),
            &[OrderStatus::Ongoing],
        )?;
        for order in orders {
            if order.order_type != OrderType::Unit {
                continue;
            }
            let path = order.path();
            if let Some(here) = path.iter().position(|t| t == territory_id) {
                if here > 0 {
                    return Ok(Some(path[here - 1].clone()));
                }
            }
        }
    }
    Ok(None)
}

fn territory_has_hostiles(
    ctx: &mut PhaseContext<'_>,
    side: &CombatSide,
    territory_id: &TerritoryId,
) -> Result<bool, StoreError> {
    let occupants: Vec<Unit> = ctx
        .store
        .units_in_territory(ctx.guild, territory_id)?
        .into_iter()
        .filter(|u| u.is_active())
        .collect();
    for occupant in &occupants {
        if relations::units_hostile(
            ctx.store,
            ctx.guild,
            &side.units,
            std::slice::from_ref(occupant),
        )? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn sides_retain_nonempty(sides: &mut Vec<CombatSide>) {
    sides.retain(|s| !s.units.is_empty());
}

fn audience_of_sides(
    ctx: &mut PhaseContext<'_>,
    sides: &[CombatSide],
) -> Result<Vec<crate::ids::CharacterId>, StoreError> {
    let mut audience = Vec::new();
    for side in sides {
        audience.extend(relations::unit_audience(ctx.store, ctx.guild, &side.units)?);
    }
    Ok(audience)
}

/// After combat, a surviving capture-action side takes the territory.
/// Cities are never captured in combat.
fn resolve_capture(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    sides: &[CombatSide],
    territory_id: &TerritoryId,
) -> Result<(), StoreError> {
    let Some(territory) = map.territory(territory_id) else {
        return Ok(());
    };
    if territory.terrain == crate::geo::Terrain::City {
        return Ok(());
    }

    let mut candidates: Vec<&CombatSide> = sides
        .iter()
        .filter(|s| s.has_capture && !s.units.is_empty())
        .collect();
    if candidates.is_empty() {
        return Ok(());
    }
    candidates.sort_by(|a, b| {
        b.total_attack()
            .cmp(&a.total_attack())
            .then_with(|| b.units.len().cmp(&a.units.len()))
            .then_with(|| b.total_defense().cmp(&a.total_defense()))
            .then_with(|| a.min_unit_id().cmp(&b.min_unit_id()))
    });
    let winner = candidates[0];
    let representative = &winner.units[0];

    let mut captured = territory.clone();
    let old_controller = captured.controller.clone();
    captured.controller = Some(match &representative.owner {
        crate::Party::Character(c) => Controller::Character(c.clone()),
        crate::Party::Faction(f) => Controller::Faction(f.clone()),
    });
    ctx.store.upsert_territory(ctx.guild, &captured)?;

    let mut audience = relations::unit_audience(ctx.store, ctx.guild, &winner.units)?;
    match &old_controller {
        Some(Controller::Character(c)) => audience.push(c.clone()),
        Some(Controller::Faction(f)) => {
            audience.extend(relations::command_audience(ctx.store, ctx.guild, f)?)
        }
        None => {}
    }
    let event = ctx
        .event(EventKind::TerritoryCaptured, EntityKind::Territory, territory_id.as_str())
        .with("new_controller", &captured.controller)
        .with(
            "capturing_units",
            winner.units.iter().map(|u| u.unit_id.clone()).collect::<Vec<_>>(),
        )
        .for_audience(audience.clone());
    ctx.push(event);
    log::info!(
        "guild {}: {} captured by {:?}",
        ctx.guild,
        territory_id,
        captured.controller
    );

    // Changing hands knocks a point of durability off everything standing.
    for mut building in ctx.store.buildings_in_territory(ctx.guild, territory_id)? {
        if !building.is_active() {
            continue;
        }
        let old_durability = building.durability;
        building.durability -= 1;
        ctx.store.upsert_building(ctx.guild, &building)?;
        let event = ctx
            .event(
                EventKind::BuildingCombatDamage,
                EntityKind::Building,
                building.building_id.as_str(),
            )
            .with("territory_id", territory_id)
            .with("old_durability", old_durability)
            .with("new_durability", building.durability)
            .with("damage_reason", "territory_capture")
            .for_audience(audience.clone());
        ctx.push(event);
    }
    Ok(())
}

/// Sieges grind down city fortifications instead of capturing: a sieging
/// side whose siege attack beats the city's siege defense knocks one
/// point off every active fortification.
fn resolve_siege(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    sides: &[CombatSide],
    territory_id: &TerritoryId,
) -> Result<(), StoreError> {
    let Some(territory) = map.territory(territory_id) else {
        return Ok(());
    };
    if territory.terrain != crate::geo::Terrain::City {
        return Ok(());
    }

    for side in sides {
        if side.action != Some(UnitAction::Siege) {
            continue;
        }
        if side.units.is_empty() {
            continue;
        }
        let siege_attack: i64 = side.active_units().map(|u| u.siege_attack).sum();
        if siege_attack <= territory.siege_defense as i64 {
            continue;
        }
        let audience = relations::unit_audience(ctx.store, ctx.guild, &side.units)?;
        for mut building in ctx.store.buildings_in_territory(ctx.guild, territory_id)? {
            if !building.is_active() || !building.has_keyword(crate::building::keyword::FORTIFICATION)
            {
                continue;
            }
            let old_durability = building.durability;
            building.durability -= 1;
            ctx.store.upsert_building(ctx.guild, &building)?;
            let event = ctx
                .event(
                    EventKind::BuildingSiegeDamage,
                    EntityKind::Building,
                    building.building_id.as_str(),
                )
                .with("territory_id", territory_id)
                .with("old_durability", old_durability)
                .with("new_durability", building.durability)
                .for_audience(audience.clone());
            ctx.push(event);
        }
    }
    Ok(())
}

/// Raid and capture orders whose movement is complete are consumed by this
/// phase; sieges keep grinding turn over turn.
fn complete_battlefield_orders(
    ctx: &mut PhaseContext<'_>,
    territory_id: &TerritoryId,
) -> Result<(), StoreError> {
    let unit_ids: Vec<_> = ctx
        .store
        .units_in_territory(ctx.guild, territory_id)?
        .into_iter()
        .map(|u| u.unit_id)
        .collect();
    if unit_ids.is_empty() {
        return Ok(());
    }
    let orders: Vec<Order> =
        ctx.store
            .orders_for_units(ctx.guild, &unit_ids, &[OrderStatus::Ongoing])?;
    for mut order in orders {
        if order.order_type != OrderType::Unit {
            continue;
        }
        let consumable = matches!(
            order.unit_action(),
            Some(UnitAction::Raid | UnitAction::Capture)
        );
        if !consumable {
            continue;
        }
        if order.result.movement_status != Some(MovementStatus::PathComplete) {
            continue;
        }
        order.status = OrderStatus::Success;
        order.updated_turn = Some(ctx.resolving);
        ctx.store.update_order(ctx.guild, &order)?;
    }
    Ok(())
}
