//! The fixed turn-phase sequence and the schedule that routes each order
//! type to its phase and priority. Altering either is a schema change, not
//! a data change.

use super::{OrderType, UnitAction};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

/// A named step in the fixed per-turn sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Beginning,
    ResourceTransfer,
    ResourceCollection,
    Movement,
    NavalMovement,
    Encirclement,
    Combat,
    NavalCombat,
    Organization,
    Construction,
    Victory,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 11] = [
        Phase::Beginning,
        Phase::ResourceTransfer,
        Phase::ResourceCollection,
        Phase::Movement,
        Phase::NavalMovement,
        Phase::Encirclement,
        Phase::Combat,
        Phase::NavalCombat,
        Phase::Organization,
        Phase::Construction,
        Phase::Victory,
    ];

    /// Phases whose events the player first sees at the start of their next
    /// turn; their events are stamped with the resolving turn number rather
    /// than the turn being resolved.
    pub fn stamps_next_turn(self) -> bool {
        matches!(
            self,
            Phase::Beginning
                | Phase::ResourceTransfer
                | Phase::ResourceCollection
                | Phase::Organization
                | Phase::Construction
                | Phase::Victory
        )
    }
}

lazy_static! {
    static ref SCHEDULE: HashMap<OrderType, (Phase, i32)> = {
        let mut table = HashMap::new();
        table.insert(OrderType::JoinFaction, (Phase::Beginning, 10));
        table.insert(OrderType::LeaveFaction, (Phase::Beginning, 11));
        table.insert(OrderType::KickFromFaction, (Phase::Beginning, 12));
        table.insert(OrderType::MakeAlliance, (Phase::Beginning, 20));
        table.insert(OrderType::DissolveAlliance, (Phase::Beginning, 21));
        table.insert(OrderType::DeclareWar, (Phase::Beginning, 30));
        table.insert(OrderType::AssignCommander, (Phase::Beginning, 40));
        table.insert(OrderType::CancelTransfer, (Phase::ResourceTransfer, 10));
        table.insert(OrderType::ResourceTransfer, (Phase::ResourceTransfer, 20));
        table.insert(OrderType::Mobilization, (Phase::Construction, 10));
        table.insert(OrderType::Construction, (Phase::Construction, 20));
        table.insert(OrderType::AssignVictoryPoints, (Phase::Victory, 10));
        table
    };
}

/// Phase and priority for an order type. Unit orders route by action: land
/// actions (and naval transport, which must couple with the land group it
/// carries) run in Movement; the rest of the naval actions run in Naval
/// Movement.
pub fn schedule_for(order_type: OrderType, action: Option<UnitAction>) -> (Phase, i32) {
    if order_type == OrderType::Unit {
        return match action {
            Some(a) if a.runs_in_land_movement() => (Phase::Movement, 10),
            _ => (Phase::NavalMovement, 10),
        };
    }
    *SCHEDULE
        .get(&order_type)
        .unwrap_or(&(Phase::Beginning, 100))
}
