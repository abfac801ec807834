//! Typed payloads for order submission and execution state.
//!
//! The store persists these as JSON maps; in the engine they are closed
//! tagged variants so dispatch is exhaustive at compile time.

use crate::ids::{BuildingId, CharacterId, FactionId, OrderId, TerritoryId, UnitId};
use crate::resources::ResourcePool;
use crate::Party;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The battlefield action carried by a unit order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitAction {
    Transit,
    Transport,
    Patrol,
    Raid,
    Capture,
    Siege,
    AerialConvoy,
    AerialScout,
    NavalTransit,
    NavalConvoy,
    NavalPatrol,
    NavalTransport,
}

impl UnitAction {
    /// Actions that grant the +1 movement-point bonus for the turn.
    pub fn grants_movement_bonus(self) -> bool {
        matches!(self, UnitAction::Transit | UnitAction::Transport)
    }

    /// Actions whose path must consist entirely of water terrain.
    pub fn is_naval(self) -> bool {
        matches!(
            self,
            UnitAction::NavalTransit
                | UnitAction::NavalConvoy
                | UnitAction::NavalPatrol
                | UnitAction::NavalTransport
        )
    }

    /// Actions resolved in the Movement phase rather than Naval Movement.
    /// Naval transport runs with land movement so it can couple with the
    /// land group it carries.
    pub fn runs_in_land_movement(self) -> bool {
        !self.is_naval() || self == UnitAction::NavalTransport
    }

    /// Actions that keep their order ONGOING at path end so a later phase
    /// (combat, encirclement) can still read them.
    pub fn lingers_after_arrival(self) -> bool {
        matches!(
            self,
            UnitAction::Raid
                | UnitAction::Capture
                | UnitAction::Siege
                | UnitAction::Patrol
                | UnitAction::AerialConvoy
                | UnitAction::NavalConvoy
                | UnitAction::NavalPatrol
        )
    }
}

/// The validated payload of an order, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderData {
    UnitAction {
        action: UnitAction,
        path: Vec<TerritoryId>,
        /// Patrol-only cap on movement points spent per turn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<u32>,
        /// Transport decomposition, extracted at submission.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        water_path: Option<Vec<TerritoryId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coast_territory: Option<TerritoryId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disembark_territory: Option<TerritoryId>,
    },
    JoinFaction {
        faction_id: FactionId,
        target_character_id: CharacterId,
        /// True when the faction leadership submitted this half of the
        /// handshake, false when the joining character did.
        submitted_by_leader: bool,
    },
    LeaveFaction {
        faction_id: FactionId,
    },
    KickFromFaction {
        faction_id: FactionId,
        target_character_id: CharacterId,
    },
    MakeAlliance {
        target_faction_id: FactionId,
    },
    DissolveAlliance {
        target_faction_id: FactionId,
    },
    DeclareWar {
        faction_id: FactionId,
        target_faction_ids: Vec<FactionId>,
        objective: String,
    },
    AssignCommander {
        unit_id: UnitId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_commander_id: Option<CharacterId>,
    },
    AssignVictoryPoints {
        target_faction_id: FactionId,
    },
    ResourceTransfer {
        sender: Party,
        recipient: Party,
        amounts: ResourcePool,
        /// True for a recurring transfer that stays ONGOING.
        #[serde(default)]
        ongoing: bool,
        /// Number of turns a recurring transfer runs; unlimited when None.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        term: Option<u32>,
    },
    CancelTransfer {
        target_order_id: OrderId,
    },
    Mobilization {
        unit_type_id: String,
        territory_id: TerritoryId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        faction_id: Option<FactionId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit_name: Option<String>,
    },
    Construction {
        building_type_id: String,
        territory_id: TerritoryId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        faction_id: Option<FactionId>,
    },
}

/// In-flight movement status persisted between turns in an order's result
/// data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Moving,
    Engaged,
    PathComplete,
    OutOfMp,
    WaitingForTransport,
    WaitingForCargo,
    Transported,
}

/// Execution-state record attached to an order. A closed set of optional
/// fields rather than an open map, so readers and writers agree on shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultData {
    /// Failure detail when the order is FAILED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the order was CANCELLED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_reason: Option<String>,
    /// The order that superseded this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<OrderId>,

    // Movement bookkeeping, carried across turns for ONGOING orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_status: Option<MovementStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<TerritoryId>,

    // Transport coupling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_naval_order_id: Option<OrderId>,
    /// Land units aboard a naval transport, persisted at the moment of
    /// coupling so transport destruction never has to recompute cargo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrying_units: Option<Vec<UnitId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_path_index: Option<usize>,

    // Recurring orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_executed: Option<u32>,
    /// Turns an ASSIGN_VICTORY_POINTS order has been active, for the
    /// cancellation minimum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_active: Option<u32>,

    // Creation receipts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_unit_id: Option<UnitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_building_id: Option<BuildingId>,
}
