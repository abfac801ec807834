//! The Construction phase: mobilization of new units and construction of
//! new buildings, both paid from the sponsor's inventory.

use super::economy::{nexus_fx, party_audience, party_resources, set_party_resources};
use super::{dispatch_order, load_config, load_map, relations, ExecError, ExecResult, PhaseContext};
use crate::building::{keyword as building_keyword, Building, BuildingStatus};
use crate::event::{EntityKind, EventKind};
use crate::faction::Permission;
use crate::ids::{BuildingId, UnitId};
use crate::order::{Order, OrderData, OrderStatus, OrderType};
use crate::store::StoreError;
use crate::Party;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    for order in ctx.unresolved_orders()? {
        match order.order_type {
            OrderType::Mobilization => dispatch_order(ctx, &order, execute_mobilization)?,
            OrderType::Construction => dispatch_order(ctx, &order, execute_construction)?,
            other => {
                ctx.fail_order(&order, format!("{} is not a construction-phase order", other))?
            }
        }
    }
    Ok(())
}

fn execute_mobilization(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::Mobilization {
        unit_type_id,
        territory_id,
        faction_id,
        unit_name,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed mobilization"));
    };

    let unit_type = ctx
        .store
        .fetch_unit_type(ctx.guild, &unit_type_id)?
        .ok_or_else(|| ExecError::failed(format!("unit type '{}' no longer exists", unit_type_id)))?;
    if ctx.store.fetch_territory(ctx.guild, &territory_id)?.is_none() {
        return Err(ExecError::failed(format!(
            "territory '{}' no longer exists",
            territory_id
        )));
    }

    let sponsor = sponsor_party(ctx, order, faction_id.as_ref())?;
    pay_cost(ctx, &sponsor, &unit_type.cost)?;

    let affiliation = match &faction_id {
        Some(f) => Some(f.clone()),
        None => ctx
            .store
            .fetch_character(ctx.guild, &order.character_id)?
            .and_then(|c| c.represented_faction_id),
    };

    let config = load_config(ctx)?;
    let count = ctx.store.all_units(ctx.guild)?.len();
    let unit_id = UnitId::new(format!("UNIT-{:04}", count + 1));
    let unit = unit_type.instantiate(
        unit_id.clone(),
        unit_name,
        territory_id.clone(),
        sponsor.clone(),
        affiliation,
        config.max_movement_stat,
    );
    ctx.store.upsert_unit(ctx.guild, &unit)?;

    let event = ctx
        .event(EventKind::UnitMobilized, EntityKind::Unit, unit_id.as_str())
        .with("unit_type_id", &unit_type_id)
        .with("territory_id", &territory_id)
        .with("owner", &sponsor)
        .for_audience(party_audience(ctx, &sponsor)?);
    ctx.push(event);

    order.result.created_unit_id = Some(unit_id);
    order.status = OrderStatus::Success;
    Ok(())
}

fn execute_construction(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::Construction {
        building_type_id,
        territory_id,
        faction_id,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed construction"));
    };

    let building_type = ctx
        .store
        .fetch_building_type(ctx.guild, &building_type_id)?
        .ok_or_else(|| {
            ExecError::failed(format!("building type '{}' no longer exists", building_type_id))
        })?;
    let territory = ctx
        .store
        .fetch_territory(ctx.guild, &territory_id)?
        .ok_or_else(|| {
            ExecError::failed(format!("territory '{}' no longer exists", territory_id))
        })?;

    if building_type
        .keywords
        .contains(building_keyword::FORTIFICATION)
        && territory.terrain != crate::geo::Terrain::City
    {
        return Err(ExecError::failed(
            "fortifications may only stand in city territory",
        ));
    }
    let occupied = ctx
        .store
        .buildings_in_territory(ctx.guild, &territory_id)?
        .iter()
        .any(|b| b.is_active() && b.building_type_id == building_type_id);
    if occupied {
        return Err(ExecError::failed(format!(
            "territory '{}' already has an active {}",
            territory_id, building_type_id
        )));
    }

    let sponsor = sponsor_party(ctx, order, faction_id.as_ref())?;
    pay_cost(ctx, &sponsor, &building_type.cost)?;

    let count = ctx.store.all_buildings(ctx.guild)?.len();
    let building_id = BuildingId::new(format!("BLDG-{:04}", count + 1));
    let building = Building {
        building_id: building_id.clone(),
        name: Some(building_type.name.clone()),
        building_type_id: building_type_id.clone(),
        territory_id: territory_id.clone(),
        durability: building_type.durability,
        status: BuildingStatus::Active,
        upkeep: building_type.upkeep,
        keywords: building_type.keywords.clone(),
        created_turn: ctx.resolving,
    };
    ctx.store.upsert_building(ctx.guild, &building)?;

    let event = ctx
        .event(
            EventKind::BuildingConstructed,
            EntityKind::Building,
            building_id.as_str(),
        )
        .with("building_type_id", &building_type_id)
        .with("territory_id", &territory_id)
        .for_audience(party_audience(ctx, &sponsor)?);
    ctx.push(event);

    // Raising industry disturbs the spirits; raising shrines soothes them.
    let map = load_map(ctx)?;
    if building.has_keyword(building_keyword::INDUSTRIAL) {
        nexus_fx::apply_to_nearest(ctx, &map, &territory_id, -1, "industrial_building_constructed")?;
    }
    if building.has_keyword(building_keyword::SPIRITUAL) {
        nexus_fx::apply_to_nearest(ctx, &map, &territory_id, 1, "spiritual_building_constructed")?;
    }

    order.result.created_building_id = Some(building_id);
    order.status = OrderStatus::Success;
    Ok(())
}

/// Who pays: the named faction (rechecking CONSTRUCTION permission at
/// execution time) or the submitting character.
fn sponsor_party(
    ctx: &PhaseContext<'_>,
    order: &Order,
    faction_id: Option<&crate::ids::FactionId>,
) -> ExecResult<Party> {
    match faction_id {
        Some(faction) => {
            if !relations::has_permission(
                ctx.store,
                ctx.guild,
                faction,
                &order.character_id,
                Permission::Construction,
            )? {
                return Err(ExecError::failed(format!(
                    "CONSTRUCTION permission in {} was revoked",
                    faction
                )));
            }
            Ok(Party::Faction(faction.clone()))
        }
        None => Ok(Party::Character(order.character_id.clone())),
    }
}

fn pay_cost(
    ctx: &mut PhaseContext<'_>,
    sponsor: &Party,
    cost: &crate::resources::ResourcePool,
) -> ExecResult<()> {
    let mut pool = party_resources(ctx, sponsor)?;
    if !pool.covers(cost) {
        return Err(ExecError::failed(format!(
            "insufficient resources: {} required",
            cost
        )));
    }
    let short = pool.pay_up_to(cost);
    debug_assert!(short.is_empty());
    set_party_resources(ctx, sponsor, pool)?;

    // Faction books track what the treasury has been spent on.
    if let Party::Faction(faction_id) = sponsor {
        if let Some(mut faction) = ctx.store.fetch_faction(ctx.guild, faction_id)? {
            faction.spending += *cost;
            ctx.store.upsert_faction(ctx.guild, &faction)?;
        }
    }
    Ok(())
}
