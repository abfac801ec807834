//! The durable order model: a submitter-owned request to change world
//! state, executed during a specific phase on a specific turn.

mod data;
mod schedule;

pub use self::data::{MovementStatus, OrderData, ResultData, UnitAction};
pub use self::schedule::{schedule_for, Phase};

use crate::ids::{CharacterId, OrderId, UnitId};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle status of an order.
///
/// `PENDING → SUCCESS | FAILED | CANCELLED | ONGOING` and
/// `ONGOING → SUCCESS | FAILED | CANCELLED`. Terminal states never mutate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Ongoing,
    Success,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Success | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    pub fn is_unresolved(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the status machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::Pending => next != OrderStatus::Pending,
            OrderStatus::Ongoing => next.is_terminal(),
            _ => false,
        }
    }
}

/// The recognized order types. Unit movement and battlefield actions all
/// travel as [`OrderType::Unit`] with the action in the order data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Unit,
    JoinFaction,
    KickFromFaction,
    LeaveFaction,
    MakeAlliance,
    DissolveAlliance,
    DeclareWar,
    AssignCommander,
    AssignVictoryPoints,
    ResourceTransfer,
    CancelTransfer,
    Mobilization,
    Construction,
}

/// A durable order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub order_type: OrderType,
    #[serde(default)]
    pub unit_ids: Vec<UnitId>,
    /// The submitting character.
    pub character_id: CharacterId,
    /// The turn on which the order first takes effect.
    pub turn_number: u32,
    /// The phase the order is routed to, fixed by the order schedule.
    pub phase: Phase,
    /// Lower runs first within a phase.
    pub priority: i32,
    pub status: OrderStatus,
    pub data: OrderData,
    #[serde(default)]
    pub result: ResultData,
    /// Monotonic submission sequence within the tenant, assigned by the
    /// store on insert. Breaks priority ties first-come-first-served.
    #[serde(default)]
    pub submitted_at: u64,
    #[serde(default)]
    pub updated_turn: Option<u32>,
}

impl Order {
    /// The movement action, when this is a unit order.
    pub fn unit_action(&self) -> Option<UnitAction> {
        match &self.data {
            OrderData::UnitAction { action, .. } => Some(*action),
            _ => None,
        }
    }

    /// The movement path, when this is a unit order.
    pub fn path(&self) -> &[crate::ids::TerritoryId] {
        match &self.data {
            OrderData::UnitAction { path, .. } => path,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod test {
    use super::OrderStatus;

    #[test]
    fn terminal_states_do_not_transition() {
        for terminal in [
            OrderStatus::Success,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Ongoing,
                OrderStatus::Success,
                OrderStatus::Failed,
                OrderStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_reaches_every_other_state() {
        for next in [
            OrderStatus::Ongoing,
            OrderStatus::Success,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            assert!(OrderStatus::Pending.can_transition_to(next));
        }
    }

    #[test]
    fn statuses_serialize_as_uppercase_literals() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Ongoing).unwrap(),
            "\"ONGOING\""
        );
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
    }
}
