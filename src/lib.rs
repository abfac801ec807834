//! A turn-resolution engine for a persistent, multi-tenant strategy war
//! simulator. Players of each tenant ("guild") issue orders against shared
//! world state; once per logical turn the engine consumes every pending and
//! ongoing order, executes them through a fixed sequence of phases, mutates
//! durable world state under strong invariants, and emits an ordered log of
//! events for downstream presenters.
//!
//! The [`judge`] module owns the phase pipeline; [`intake`] owns order
//! submission and cancellation; [`store`] defines the persistence contract
//! the engine requires of its host.

pub mod building;
pub mod character;
pub mod config;
pub mod diplo;
pub mod error;
pub mod event;
pub mod faction;
pub mod geo;
pub mod ids;
pub mod intake;
pub mod judge;
pub mod nexus;
pub mod order;
pub mod resources;
pub mod store;
pub mod unit;

pub use crate::error::EngineError;
pub use crate::ids::{
    BuildingId, CharacterId, FactionId, GuildId, NexusId, OrderId, TerritoryId, UnitId, WarId,
};
pub use crate::intake::{cancel_order, submit_order, CancelOutcome, OrderRequest, SubmitOutcome};
pub use crate::judge::{advance_turn, TurnOutcome};
pub use crate::resources::{Resource, ResourcePool};

/// An identity that can own units, hold resources, or control territory:
/// either a single character or a whole faction.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, from_variants::FromVariants,
    serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Character(CharacterId),
    Faction(FactionId),
}

impl Party {
    pub fn as_character(&self) -> Option<&CharacterId> {
        match self {
            Party::Character(id) => Some(id),
            Party::Faction(_) => None,
        }
    }

    pub fn as_faction(&self) -> Option<&FactionId> {
        match self {
            Party::Faction(id) => Some(id),
            Party::Character(_) => None,
        }
    }
}
