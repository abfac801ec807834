//! Spirit-nexus proximity effects. Construction and destruction of
//! industrial and spiritual buildings shift the health of the nearest
//! nexus, with the polar pair redirecting each other's effects.

use super::super::PhaseContext;
use crate::event::{EntityKind, EventKind};
use crate::geo::WorldMap;
use crate::ids::TerritoryId;
use crate::nexus::{pole_swap_target, SpiritNexus};
use crate::store::StoreError;

/// Apply a health change to the nexus nearest to `territory_id`. BFS
/// distance over the adjacency graph regardless of terrain; ties break
/// alphabetically by nexus identifier. Nexus events are GM-only and carry
/// no audience.
pub(crate) fn apply_to_nearest(
    ctx: &mut PhaseContext<'_>,
    map: &WorldMap,
    territory_id: &TerritoryId,
    delta: i64,
    cause: &str,
) -> Result<(), StoreError> {
    let Some(nearest) = nearest_nexus(ctx, map, territory_id)? else {
        return Ok(());
    };

    // Pole swap: effects aimed at one pole land on the other, when it
    // exists.
    let mut target = nearest;
    if let Some(swapped_id) = pole_swap_target(&target.nexus_id) {
        if let Some(swapped) = ctx.store.fetch_nexus(ctx.guild, &swapped_id)? {
            target = swapped;
        }
    }

    let old_health = target.health;
    target.health += delta;
    ctx.store.upsert_nexus(ctx.guild, &target)?;
    log::info!(
        "guild {}: nexus {} health {} -> {} ({})",
        ctx.guild,
        target.nexus_id,
        old_health,
        target.health,
        cause
    );

    let kind = if delta < 0 {
        EventKind::NexusDamaged
    } else {
        EventKind::NexusRepaired
    };
    let event = ctx
        .event(kind, EntityKind::Nexus, target.nexus_id.as_str())
        .with("old_health", old_health)
        .with("new_health", target.health)
        .with("cause", cause)
        .gm_only();
    ctx.push(event);
    Ok(())
}

fn nearest_nexus(
    ctx: &PhaseContext<'_>,
    map: &WorldMap,
    from: &TerritoryId,
) -> Result<Option<SpiritNexus>, StoreError> {
    let distances = map.distances_from(from);
    let mut best: Option<(u32, SpiritNexus)> = None;
    for nexus in ctx.store.all_nexuses(ctx.guild)? {
        let Some(&distance) = distances.get(&nexus.territory_id) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((best_distance, best_nexus)) => {
                distance < *best_distance
                    || (distance == *best_distance && nexus.nexus_id < best_nexus.nexus_id)
            }
        };
        if better {
            best = Some((distance, nexus));
        }
    }
    Ok(best.map(|(_, nexus)| nexus))
}
