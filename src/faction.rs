//! Factions, their memberships and delegated permissions.

use crate::ids::{CharacterId, FactionId, Nation};
use crate::resources::ResourcePool;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// A faction: a player-run organization that fields units, holds territory
/// and wages war.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub faction_id: FactionId,
    pub name: String,
    #[serde(default)]
    pub nation: Option<Nation>,
    #[serde(default)]
    pub leader: Option<CharacterId>,
    /// One-time latch: set when the faction first declares a war, which
    /// grants a production bonus the presentation layer announces.
    #[serde(default)]
    pub has_declared_war: bool,
    #[serde(default)]
    pub created_turn: u32,
    /// Informational per-turn spending counters.
    #[serde(default)]
    pub spending: ResourcePool,
}

/// A character's membership in a faction. A character may hold many
/// memberships; exactly one is their represented faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionMember {
    pub faction_id: FactionId,
    pub character_id: CharacterId,
    pub joined_turn: u32,
}

/// A delegated faction power. The leader implicitly holds all of them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Command faction-owned units.
    Command,
    /// Spend faction resources.
    Financial,
    /// Kick members and approve joins on the faction's behalf.
    Membership,
    /// Mobilize units and construct buildings with faction resources.
    Construction,
}

/// A grant of one permission to one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionPermission {
    pub faction_id: FactionId,
    pub character_id: CharacterId,
    pub permission: Permission,
}
