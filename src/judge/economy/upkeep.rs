//! The Organization phase: building upkeep first, then unit upkeep,
//! organization recovery, and finally the destruction cascade.

use super::super::{load_map, relations, PhaseContext};
use super::{party_audience, party_resources, set_party_resources};
use crate::building::keyword as building_keyword;
use crate::event::{EntityKind, EventKind};
use crate::geo::{Controller, WorldMap};
use crate::store::StoreError;
use crate::unit::{Unit, UnitStatus};
use crate::Party;
use std::cmp::Reverse;

/// Flat organization penalty for units cut off from friendly land.
const ENCIRCLED_ORG_PENALTY: i64 = 1;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let map = load_map(ctx)?;
    building_upkeep(ctx, &map)?;
    unit_upkeep(ctx)?;
    organization_recovery(ctx, &map)?;
    destruction_cascade(ctx, &map)
}

/// Buildings pay first, the weakest structures settling their accounts
/// before the sturdy ones.
fn building_upkeep(ctx: &mut PhaseContext<'_>, map: &WorldMap) -> Result<(), StoreError> {
    let mut buildings: Vec<_> = ctx
        .store
        .all_buildings(ctx.guild)?
        .into_iter()
        .filter(|b| b.is_active())
        .collect();
    buildings.sort_by_key(|b| {
        (
            b.durability,
            b.territory_id.clone(),
            Reverse(b.created_turn),
        )
    });

    for mut building in buildings {
        if building.upkeep.is_empty() {
            continue;
        }
        let payer: Option<Party> = map
            .territory(&building.territory_id)
            .and_then(|t| t.controller.clone())
            .map(|controller| match controller {
                Controller::Character(c) => Party::Character(c),
                Controller::Faction(f) => Party::Faction(f),
            });

        let short_count = match &payer {
            Some(party) => {
                let mut pool = party_resources(ctx, party)?;
                let short = pool.pay_up_to(&building.upkeep);
                set_party_resources(ctx, party, pool)?;
                short.len()
            }
            // Nobody answers for an uncontrolled territory: every
            // required resource counts as short.
            None => building.upkeep.iter().filter(|(_, amount)| *amount > 0).count(),
        };

        let audience = match &payer {
            Some(party) => party_audience(ctx, party)?,
            None => Vec::new(),
        };
        if short_count == 0 {
            let event = ctx
                .event(
                    EventKind::BuildingUpkeepPaid,
                    EntityKind::Building,
                    building.building_id.as_str(),
                )
                .with("territory_id", &building.territory_id)
                .with("upkeep", &building.upkeep)
                .for_audience(audience);
            ctx.push(event);
        } else {
            let old_durability = building.durability;
            building.durability -= short_count as i64;
            ctx.store.upsert_building(ctx.guild, &building)?;
            let event = ctx
                .event(
                    EventKind::BuildingUpkeepDeficit,
                    EntityKind::Building,
                    building.building_id.as_str(),
                )
                .with("territory_id", &building.territory_id)
                .with("short_resource_types", short_count)
                .with("old_durability", old_durability)
                .with("new_durability", building.durability)
                .for_audience(audience);
            ctx.push(event);
        }
    }
    Ok(())
}

fn unit_upkeep(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    for mut unit in ctx.store.all_units(ctx.guild)? {
        if !unit.is_active() {
            continue;
        }
        let encircled = ctx.store.is_encircled(ctx.guild, &unit.unit_id)?;
        if unit.upkeep.is_empty() && !encircled {
            continue;
        }

        let payer = unit.payer();
        let mut pool = party_resources(ctx, &payer)?;
        let short = pool.pay_up_to(&unit.upkeep);
        set_party_resources(ctx, &payer, pool)?;

        let mut org_loss = short.len() as i64;
        if encircled {
            org_loss += ENCIRCLED_ORG_PENALTY;
        }

        let audience = relations::unit_audience(ctx.store, ctx.guild, std::slice::from_ref(&unit))?;
        if org_loss == 0 {
            let event = ctx
                .event(EventKind::UpkeepPaid, EntityKind::Unit, unit.unit_id.as_str())
                .with("upkeep", &unit.upkeep)
                .for_audience(audience);
            ctx.push(event);
        } else {
            unit.organization -= org_loss;
            ctx.store.upsert_unit(ctx.guild, &unit)?;
            let event = ctx
                .event(EventKind::UpkeepDeficit, EntityKind::Unit, unit.unit_id.as_str())
                .with("short_resource_types", short.len())
                .with("encircled", encircled)
                .with("organization_lost", org_loss)
                .with("organization", unit.organization)
                .for_audience(audience);
            ctx.push(event);
        }
    }
    Ok(())
}

/// Units standing on home ground mend: one point per turn plus two per
/// active hospital in the territory, capped at their maximum.
fn organization_recovery(ctx: &mut PhaseContext<'_>, map: &WorldMap) -> Result<(), StoreError> {
    for mut unit in ctx.store.all_units(ctx.guild)? {
        if !unit.is_active() || unit.organization >= unit.max_organization {
            continue;
        }
        let Some(position) = unit.current_territory.clone() else {
            continue;
        };
        let Some(territory) = map.territory(&position) else {
            continue;
        };
        if !territory_is_restful(ctx, territory, &unit)? {
            continue;
        }

        let hospitals = ctx
            .store
            .buildings_in_territory(ctx.guild, &position)?
            .iter()
            .filter(|b| b.is_active() && b.has_keyword(building_keyword::HOSPITAL))
            .count() as i64;
        let recovered = 1 + 2 * hospitals;
        unit.organization = (unit.organization + recovered).min(unit.max_organization);
        ctx.store.upsert_unit(ctx.guild, &unit)?;
    }
    Ok(())
}

/// Whether a unit recovers here: the controller is the unit's owner, its
/// own faction, or an allied faction. Hostile and unclaimed ground gives
/// no rest.
fn territory_is_restful(
    ctx: &PhaseContext<'_>,
    territory: &crate::geo::Territory,
    unit: &Unit,
) -> Result<bool, StoreError> {
    match &territory.controller {
        Some(Controller::Character(c)) => {
            if unit.owning_character() == Some(c) {
                return Ok(true);
            }
            let controller_faction = ctx
                .store
                .fetch_character(ctx.guild, c)?
                .and_then(|ch| ch.represented_faction_id);
            match (relations::unit_faction(unit), controller_faction) {
                (Some(own), Some(theirs)) => {
                    relations::are_allied(ctx.store, ctx.guild, own, &theirs)
                }
                _ => Ok(false),
            }
        }
        Some(Controller::Faction(f)) => match relations::unit_faction(unit) {
            Some(own) => relations::are_allied(ctx.store, ctx.guild, own, f),
            None => Ok(false),
        },
        None => Ok(false),
    }
}

/// End of phase: exhausted buildings collapse and broken units disband.
/// The fall of a spiritual building wounds the nearest nexus.
fn destruction_cascade(ctx: &mut PhaseContext<'_>, map: &WorldMap) -> Result<(), StoreError> {
    for mut building in ctx.store.all_buildings(ctx.guild)? {
        if !building.is_active() || building.durability > 0 {
            continue;
        }
        building.status = crate::building::BuildingStatus::Destroyed;
        ctx.store.upsert_building(ctx.guild, &building)?;

        let audience = match map
            .territory(&building.territory_id)
            .and_then(|t| t.controller.clone())
        {
            Some(Controller::Character(c)) => vec![c],
            Some(Controller::Faction(f)) => {
                relations::command_audience(ctx.store, ctx.guild, &f)?
            }
            None => Vec::new(),
        };
        let event = ctx
            .event(
                EventKind::BuildingDestroyed,
                EntityKind::Building,
                building.building_id.as_str(),
            )
            .with("territory_id", &building.territory_id)
            .with("building_type_id", &building.building_type_id)
            .for_audience(audience);
        ctx.push(event);

        if building.has_keyword(building_keyword::SPIRITUAL) {
            super::nexus_fx::apply_to_nearest(
                ctx,
                map,
                &building.territory_id,
                -2,
                "spiritual_building_destroyed",
            )?;
        }
    }

    for mut unit in ctx.store.all_units(ctx.guild)? {
        if unit.status != UnitStatus::Active || unit.organization > 0 {
            continue;
        }
        unit.status = UnitStatus::Disbanded;
        ctx.store.upsert_unit(ctx.guild, &unit)?;
        if unit.is_naval() {
            ctx.store
                .set_naval_positions(ctx.guild, &unit.unit_id, Default::default())?;
        }
        let audience =
            relations::unit_audience(ctx.store, ctx.guild, std::slice::from_ref(&unit))?;
        let event = ctx
            .event(EventKind::UnitDisbanded, EntityKind::Unit, unit.unit_id.as_str())
            .with("cause", "organization_exhausted")
            .for_audience(audience);
        ctx.push(event);
    }
    Ok(())
}
