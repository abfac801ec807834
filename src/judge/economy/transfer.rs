//! The Resource Transfer phase. Cancellations run before transfers, and
//! fresh transfers run before ongoing ones.

use super::super::{dispatch_order, ExecError, ExecResult, PhaseContext};
use super::{party_audience, party_resources, set_party_resources};
use crate::event::{EntityKind, EventKind};
use crate::order::{Order, OrderData, OrderStatus, OrderType};
use crate::resources::{Resource, ResourcePool};
use crate::store::StoreError;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    let mut orders = ctx.unresolved_orders()?;
    // The schedule already puts cancellations ahead of transfers; within
    // each bucket fresh submissions run before resumed ones.
    orders.sort_by_key(|o| {
        (
            o.priority,
            if o.status == OrderStatus::Pending { 0 } else { 1 },
            o.submitted_at,
        )
    });

    for order in orders {
        match order.order_type {
            OrderType::CancelTransfer => dispatch_order(ctx, &order, execute_cancel)?,
            OrderType::ResourceTransfer => dispatch_order(ctx, &order, execute_transfer)?,
            other => ctx.fail_order(&order, format!("{} is not a transfer-phase order", other))?,
        }
    }
    Ok(())
}

fn execute_cancel(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::CancelTransfer { target_order_id } = order.data.clone() else {
        return Err(ExecError::failed("malformed cancellation"));
    };
    let mut target = ctx
        .store
        .fetch_order(ctx.guild, &target_order_id)?
        .ok_or_else(|| ExecError::failed(format!("order '{}' no longer exists", target_order_id)))?;

    match target.status {
        OrderStatus::Cancelled => {}
        OrderStatus::Pending | OrderStatus::Ongoing => {
            target.status = OrderStatus::Cancelled;
            target.result.cancelled_reason = Some(String::from("cancelled_by_cancel_order"));
            target.updated_turn = Some(ctx.resolving);
            ctx.store.update_order(ctx.guild, &target)?;
        }
        other => {
            return Err(ExecError::failed(format!(
                "transfer '{}' is already {}",
                target_order_id, other
            )))
        }
    }
    order.status = OrderStatus::Success;
    Ok(())
}

fn execute_transfer(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::ResourceTransfer {
        sender,
        recipient,
        amounts,
        ongoing,
        term,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed transfer"));
    };

    let mut sender_pool = party_resources(ctx, &sender)?;
    let mut recipient_pool = party_resources(ctx, &recipient)?;

    // Move what the sender actually has; report the rest as a deficit.
    let mut moved = ResourcePool::default();
    let mut short: Vec<Resource> = Vec::new();
    for (resource, wanted) in amounts.iter() {
        if wanted <= 0 {
            continue;
        }
        let available = sender_pool.get(resource).min(wanted).max(0);
        if available < wanted {
            short.push(resource);
        }
        if available > 0 {
            sender_pool.set(resource, sender_pool.get(resource) - available);
            recipient_pool.set(resource, recipient_pool.get(resource) + available);
            moved.set(resource, available);
        }
    }

    if !moved.is_empty() {
        set_party_resources(ctx, &sender, sender_pool)?;
        set_party_resources(ctx, &recipient, recipient_pool)?;
    }

    let mut audience = party_audience(ctx, &sender)?;
    audience.extend(party_audience(ctx, &recipient)?);
    let kind = if short.is_empty() {
        EventKind::ResourceTransferExecuted
    } else {
        EventKind::TransferDeficit
    };
    let event = ctx
        .event(kind, EntityKind::Order, order.order_id.as_str())
        .with("sender", &sender)
        .with("recipient", &recipient)
        .with("requested", &amounts)
        .with("moved", &moved)
        .with("short", &short)
        .for_audience(audience);
    ctx.push(event);

    if ongoing {
        let executed = order.result.turns_executed.unwrap_or(0) + 1;
        order.result.turns_executed = Some(executed);
        order.status = match term {
            Some(limit) if executed >= limit => OrderStatus::Success,
            _ => OrderStatus::Ongoing,
        };
    } else {
        order.status = OrderStatus::Success;
    }
    Ok(())
}
