//! Spirit nexuses: map anchors whose health shifts as industry and
//! spirituality reshape the world around them.

use crate::ids::{NexusId, TerritoryId};
use serde::{Deserialize, Serialize};

/// A spirit nexus anchored to a territory. Health may go negative; the
/// value is state for downstream cosmetic effects, not a game-over switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiritNexus {
    pub nexus_id: NexusId,
    pub territory_id: TerritoryId,
    pub health: i64,
}

/// The pole-swap rule: effects aimed at one pole land on the other. Any
/// other nexus takes its own effects.
pub fn pole_swap_target(nexus_id: &NexusId) -> Option<NexusId> {
    match nexus_id.as_str() {
        "south-pole" => Some(NexusId::from("north-pole")),
        "north-pole" => Some(NexusId::from("south-pole")),
        _ => None,
    }
}
