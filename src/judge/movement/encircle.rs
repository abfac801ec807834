//! The encirclement sweep: after movement, every land unit standing in
//! non-friendly territory must still have a path home over friendly or
//! neutral ground, with friendly convoys bridging the water. Units that
//! do not are flagged for the upkeep phase.

use super::super::{load_map, relations, PhaseContext};
use crate::event::{EntityKind, EventKind};
use crate::geo::{Controller, WorldMap};
use crate::ids::{FactionId, TerritoryId};
use crate::order::{OrderStatus, OrderType, Phase, UnitAction};
use crate::store::StoreError;
use crate::unit::Unit;
use std::collections::{BTreeSet, HashMap};

pub(crate) fn run_encirclement(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    ctx.store.clear_encircled(ctx.guild)?;
    let map = load_map(ctx)?;
    let coverage = convoy_coverage(ctx)?;
    let territory_factions = effective_territory_factions(ctx, &map)?;

    for unit in ctx.store.all_units(ctx.guild)? {
        if !unit.is_active() || unit.is_naval() || unit.is_exempt_from_engagement() {
            continue;
        }
        let Some(position) = unit.current_territory.clone() else {
            continue;
        };
        if map.territory(&position).is_none() {
            continue;
        }

        let friendly = friendly_factions(ctx, &unit)?;
        if territory_is_friendly(&map, &territory_factions, &position, &unit, &friendly) {
            continue;
        }

        // A unit with no friendly land anywhere has no supply line to be
        // cut; only units with a home to reach can be encircled.
        let has_home = map.territories().any(|t| {
            !t.is_water()
                && territory_is_friendly(&map, &territory_factions, &t.territory_id, &unit, &friendly)
        });
        if !has_home {
            continue;
        }

        let reachable_coverage = faction_coverage(&coverage, &friendly);
        let enemies = match relations::unit_faction(&unit) {
            Some(faction) => relations::hostile_factions_to(ctx.store, ctx.guild, faction)?,
            None => Default::default(),
        };

        let reached = map.reachable_from(&position, |territory| {
            if territory.territory_id == position {
                return true;
            }
            if territory.is_water() {
                return reachable_coverage.contains(&territory.territory_id);
            }
            // Enemy-held land is impassable; friendly and neutral land is
            // open.
            match territory_factions.get(&territory.territory_id) {
                Some(Some(controller)) => !enemies.contains(controller),
                _ => true,
            }
        });

        let has_path_home = reached.iter().any(|territory_id| {
            territory_id != &position
                && map
                    .territory(territory_id)
                    .map(|t| !t.is_water())
                    .unwrap_or(false)
                && territory_is_friendly(&map, &territory_factions, territory_id, &unit, &friendly)
        });

        if !has_path_home {
            ctx.store.set_encircled(ctx.guild, &unit.unit_id, true)?;
            let audience =
                relations::unit_audience(ctx.store, ctx.guild, std::slice::from_ref(&unit))?;
            let event = ctx
                .event(EventKind::UnitEncircled, EntityKind::Unit, unit.unit_id.as_str())
                .with("territory_id", &position)
                .for_audience(audience);
            ctx.push(event);
            log::debug!(
                "guild {}: unit {} encircled at {}",
                ctx.guild,
                unit.unit_id,
                position
            );
        }
    }
    Ok(())
}

/// The faction each territory effectively answers to, resolving character
/// controllers through their represented faction.
fn effective_territory_factions(
    ctx: &PhaseContext<'_>,
    map: &WorldMap,
) -> Result<HashMap<TerritoryId, Option<FactionId>>, StoreError> {
    let mut factions = HashMap::new();
    for territory in map.territories() {
        factions.insert(
            territory.territory_id.clone(),
            relations::territory_faction(ctx.store, ctx.guild, territory)?,
        );
    }
    Ok(factions)
}

/// Water coverage provided by each faction's active naval and aerial
/// convoys.
fn convoy_coverage(
    ctx: &mut PhaseContext<'_>,
) -> Result<HashMap<FactionId, BTreeSet<TerritoryId>>, StoreError> {
    let mut coverage: HashMap<FactionId, BTreeSet<TerritoryId>> = HashMap::new();

    let mut convoy_orders = ctx.store.orders_for_phase(
        ctx.guild,
        ctx.resolving,
        Phase::NavalMovement,
        &[OrderStatus::Ongoing],
    )?;
    convoy_orders.extend(ctx.store.orders_for_phase(
        ctx.guild,
        ctx.resolving,
        Phase::Movement,
        &[OrderStatus::Ongoing],
    )?);

    for order in convoy_orders {
        if order.order_type != OrderType::Unit {
            continue;
        }
        let covered: BTreeSet<TerritoryId> = match order.unit_action() {
            Some(UnitAction::NavalConvoy) => {
                let mut set = BTreeSet::new();
                for unit_id in &order.unit_ids {
                    set.extend(ctx.store.naval_positions(ctx.guild, unit_id)?);
                }
                set
            }
            Some(UnitAction::AerialConvoy) => order.path().iter().cloned().collect(),
            _ => continue,
        };
        if covered.is_empty() {
            continue;
        }
        let faction = match order.unit_ids.first() {
            Some(unit_id) => ctx
                .store
                .fetch_unit(ctx.guild, unit_id)?
                .and_then(|u| u.faction_id),
            None => None,
        };
        if let Some(faction) = faction {
            coverage.entry(faction).or_default().extend(covered);
        }
    }
    Ok(coverage)
}

/// The faction closure a unit counts as friendly.
fn friendly_factions(
    ctx: &PhaseContext<'_>,
    unit: &Unit,
) -> Result<BTreeSet<FactionId>, StoreError> {
    match relations::unit_faction(unit) {
        Some(faction) => relations::allied_closure(ctx.store, ctx.guild, faction),
        None => Ok(Default::default()),
    }
}

fn faction_coverage(
    coverage: &HashMap<FactionId, BTreeSet<TerritoryId>>,
    friendly: &BTreeSet<FactionId>,
) -> BTreeSet<TerritoryId> {
    let mut combined = BTreeSet::new();
    for faction in friendly {
        if let Some(set) = coverage.get(faction) {
            combined.extend(set.iter().cloned());
        }
    }
    combined
}

fn territory_is_friendly(
    map: &WorldMap,
    territory_factions: &HashMap<TerritoryId, Option<FactionId>>,
    territory_id: &TerritoryId,
    unit: &Unit,
    friendly: &BTreeSet<FactionId>,
) -> bool {
    let Some(territory) = map.territory(territory_id) else {
        return false;
    };
    if let Some(Controller::Character(c)) = &territory.controller {
        if unit.owning_character() == Some(c) {
            return true;
        }
    }
    match territory_factions.get(territory_id) {
        Some(Some(faction)) => friendly.contains(faction),
        _ => false,
    }
}
