//! The Resource Collection phase: each character gathers their personal
//! production plus the output of the territories they directly control.

use super::super::{load_map, PhaseContext};
use crate::building::{keyword, Building};
use crate::event::{EntityKind, EventKind};
use crate::geo::Territory;
use crate::resources::{Resource, ResourcePool};
use crate::store::StoreError;
use std::str::FromStr;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let map = load_map(ctx)?;

    for character in ctx.store.all_characters(ctx.guild)? {
        let mut delta = character.production;

        for territory in map.territories() {
            if !territory.controlled_by_character(&character.character_id) {
                continue;
            }
            let buildings =
                ctx.store.buildings_in_territory(ctx.guild, &territory.territory_id)?;
            delta += effective_production(territory, &buildings);
        }

        if delta.is_empty() {
            continue;
        }
        let mut pool = ctx
            .store
            .player_resources(ctx.guild, &character.character_id)?;
        pool += delta;
        ctx.store
            .set_player_resources(ctx.guild, &character.character_id, pool)?;

        let event = ctx
            .event(
                EventKind::CharacterProduction,
                EntityKind::Character,
                character.character_id.as_str(),
            )
            .with("produced", &delta)
            .for_audience([character.character_id.clone()]);
        ctx.push(event);
    }
    Ok(())
}

/// A territory's output for the turn: natural production, plus +2 per
/// resource keyword on each active building. Industrial buildings add
/// their bonus unconditionally and count as natural for the buildings
/// that follow; other buildings only amplify resources the territory
/// already yields.
pub(crate) fn effective_production(territory: &Territory, buildings: &[Building]) -> ResourcePool {
    let mut effective = territory.production;

    let mut active: Vec<&Building> = buildings.iter().filter(|b| b.is_active()).collect();
    active.sort_by(|a, b| a.building_id.cmp(&b.building_id));

    for building in active.iter().filter(|b| b.has_keyword(keyword::INDUSTRIAL)) {
        for resource in resource_keywords(building) {
            *effective.get_mut(resource) += 2;
        }
    }
    for building in active.iter().filter(|b| !b.has_keyword(keyword::INDUSTRIAL)) {
        for resource in resource_keywords(building) {
            if effective.get(resource) > 0 {
                *effective.get_mut(resource) += 2;
            }
        }
    }
    effective
}

/// The resource keywords a building carries, in canonical order.
fn resource_keywords(building: &Building) -> impl Iterator<Item = Resource> + '_ {
    Resource::ALL
        .into_iter()
        .filter(|r| building.keywords.iter().any(|k| Resource::from_str(k) == Ok(*r)))
}
