//! In-memory state for tracking a unit group's movement during tick-based
//! resolution. Rebuilt each turn from the order's result data; the
//! relevant fields are written back after the phase runs.

use crate::ids::{OrderId, TerritoryId};
use crate::order::{MovementStatus, Order, OrderData, UnitAction};
use crate::unit::Unit;

#[derive(Debug)]
pub(crate) struct MovementState {
    /// Working copy of the controlling order.
    pub order: Order,
    /// Working copies of the units moving together.
    pub units: Vec<Unit>,
    pub action: UnitAction,
    /// Base movement points this turn: the slowest unit plus any action
    /// bonus.
    pub total_mp: u32,
    pub remaining_mp: u32,
    pub status: MovementStatus,
    pub current_territory: TerritoryId,
    /// Position in the path; zero is the starting territory.
    pub path_index: usize,
    /// Patrol-only cap on points spent per turn.
    pub speed: Option<u32>,
    pub territories_entered: Vec<TerritoryId>,
    pub blocked_at: Option<TerritoryId>,
    pub mp_expended: u32,
    /// For a coupled naval transport: the land orders being carried.
    pub carrying: Vec<OrderId>,
}

impl MovementState {
    /// Rebuild the state for one order. Engaged and out-of-points statuses
    /// reset to moving so the group tries again this turn.
    pub fn rebuild(order: Order, units: Vec<Unit>, current: TerritoryId) -> Self {
        let (action, speed) = match &order.data {
            OrderData::UnitAction { action, speed, .. } => (*action, *speed),
            _ => (UnitAction::Transit, None),
        };
        let base = units.iter().map(|u| u.movement).min().unwrap_or(0);
        let bonus = if action.grants_movement_bonus() { 1 } else { 0 };
        // The action bonus never animates a group that cannot move at all;
        // an immovable group's order completes without spending anything.
        let total_mp = if base == 0 { 0 } else { base + bonus };

        let status = match order.result.movement_status {
            _ if total_mp == 0 => MovementStatus::PathComplete,
            Some(MovementStatus::Engaged) | Some(MovementStatus::OutOfMp) | None => {
                MovementStatus::Moving
            }
            Some(other) => other,
        };
        let path_index = order.result.path_index.unwrap_or(0);

        MovementState {
            order,
            units,
            action,
            total_mp,
            remaining_mp: total_mp,
            status,
            current_territory: current,
            path_index,
            speed,
            territories_entered: Vec::new(),
            blocked_at: None,
            mp_expended: 0,
            carrying: Vec::new(),
        }
    }

    pub fn path(&self) -> &[TerritoryId] {
        self.order.path()
    }

    pub fn next_territory(&self) -> Option<&TerritoryId> {
        self.path().get(self.path_index + 1)
    }

    pub fn is_at_path_end(&self) -> bool {
        self.path_index + 1 >= self.path().len()
    }

    /// Patrol groups keep looping until their per-turn budget runs dry;
    /// an unset speed means no limit.
    pub fn within_patrol_budget(&self) -> bool {
        match (self.action, self.speed) {
            (UnitAction::Patrol | UnitAction::NavalPatrol, Some(limit)) => {
                self.mp_expended < limit
            }
            _ => true,
        }
    }

    /// Write the turn's outcome back into the order's result data.
    pub fn persist_into_order(&mut self) {
        self.order.result.path_index = Some(self.path_index);
        self.order.result.movement_status = Some(self.status);
        self.order.result.blocked_at = self.blocked_at.clone();
    }
}
