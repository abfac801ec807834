//! Player characters.

use crate::ids::{CharacterId, FactionId};
use crate::resources::ResourcePool;
use serde::{Deserialize, Serialize};

/// A player character. Characters own units and territory, hold a resource
/// inventory, and may belong to any number of factions while representing
/// exactly one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub character_id: CharacterId,
    pub name: String,
    /// Opaque handle of the owning user in the presentation layer.
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Per-turn personal production, collected alongside territory output.
    #[serde(default)]
    pub production: ResourcePool,
    /// Per-turn victory points available for assignment to a faction.
    #[serde(default)]
    pub victory_points: u32,
    /// The faction this character represents in combat and whose banner
    /// their units fly. Must match one of the character's memberships.
    #[serde(default)]
    pub represented_faction_id: Option<FactionId>,
    /// Turn on which representation last changed, for kick/join cooldowns.
    #[serde(default)]
    pub representation_changed_turn: Option<u32>,
}
