//! The Victory phase: standing victory-point assignments pay out each
//! turn until cancelled.

use super::{dispatch_order, load_map, relations, ExecError, ExecResult, PhaseContext};
use crate::event::{EntityKind, EventKind};
use crate::order::{Order, OrderData, OrderStatus, OrderType};
use crate::store::StoreError;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    for order in ctx.unresolved_orders()? {
        match order.order_type {
            OrderType::AssignVictoryPoints => dispatch_order(ctx, &order, execute_assignment)?,
            other => ctx.fail_order(&order, format!("{} is not a victory-phase order", other))?,
        }
    }
    Ok(())
}

/// Assign the character's victory points for the turn, their personal
/// stat plus the points of every territory they directly control, to the
/// named faction. The order stays in force until cancelled.
fn execute_assignment(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::AssignVictoryPoints { target_faction_id } = order.data.clone() else {
        return Err(ExecError::failed("malformed victory point assignment"));
    };
    let faction = ctx
        .store
        .fetch_faction(ctx.guild, &target_faction_id)?
        .ok_or_else(|| {
            ExecError::failed(format!("faction '{}' no longer exists", target_faction_id))
        })?;
    let character = ctx
        .store
        .fetch_character(ctx.guild, &order.character_id)?
        .ok_or_else(|| {
            ExecError::failed(format!("character '{}' no longer exists", order.character_id))
        })?;

    let territory_points = territory_points_of(ctx, &character.character_id)?;
    let amount = character.victory_points as u64 + territory_points;

    if amount > 0 {
        let mut audience = relations::member_audience(ctx.store, ctx.guild, &target_faction_id)?;
        audience.push(character.character_id.clone());
        let event = ctx
            .event(
                EventKind::VictoryPointsAssigned,
                EntityKind::Faction,
                target_faction_id.as_str(),
            )
            .with("faction_name", &faction.name)
            .with("from_character", &character.character_id)
            .with("amount", amount)
            .for_audience(audience);
        ctx.push(event);
    }

    order.result.turns_active = Some(order.result.turns_active.unwrap_or(0) + 1);
    order.status = OrderStatus::Ongoing;
    Ok(())
}

fn territory_points_of(
    ctx: &PhaseContext<'_>,
    character_id: &crate::ids::CharacterId,
) -> Result<u64, StoreError> {
    let map = load_map(ctx)?;
    Ok(map
        .territories()
        .filter(|t| t.controlled_by_character(character_id))
        .map(|t| t.victory_points as u64)
        .sum())
}
