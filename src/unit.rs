//! Units: the mobile pieces of the simulation, plus the immutable templates
//! they are mobilized from.

use crate::ids::{CharacterId, FactionId, Nation, TerritoryId, UnitId};
use crate::resources::ResourcePool;
use crate::Party;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

/// Well-known unit keywords. The keyword set is open; these are the ones
/// the engine attaches behavior to.
pub mod keyword {
    pub const INFANTRY: &str = "infantry";
    pub const CAVALRY: &str = "cavalry";
    pub const NAVAL: &str = "naval";
    pub const AERIAL: &str = "aerial";
    pub const AERIAL_TRANSPORT: &str = "aerial-transport";
    pub const INFILTRATOR: &str = "infiltrator";
    pub const SPIRIT: &str = "spirit";
    pub const SUBMARINE: &str = "submarine";
    pub const HOSTILE: &str = "hostile";
    pub const IMMOBILE: &str = "immobile";
}

/// Whether a unit is on the board or has been destroyed/dissolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Active,
    Disbanded,
}

/// A military unit. Stats are copied from the template at mobilization so
/// later template edits do not retroactively change fielded units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: UnitId,
    #[serde(default)]
    pub name: Option<String>,
    pub unit_type_id: String,
    /// Where the unit stands. Naval units additionally occupy a set of
    /// water territories tracked separately by the store.
    #[serde(default)]
    pub current_territory: Option<TerritoryId>,
    pub owner: Party,
    #[serde(default)]
    pub commander: Option<CharacterId>,
    #[serde(default)]
    pub commander_assigned_turn: Option<u32>,
    /// Faction the unit fights for. Follows the owning character's
    /// represented faction; may go stale when representation is cleared.
    #[serde(default)]
    pub faction_id: Option<FactionId>,
    pub status: UnitStatus,
    pub movement: u32,
    pub attack: i64,
    pub defense: i64,
    #[serde(default)]
    pub siege_attack: i64,
    #[serde(default)]
    pub siege_defense: i64,
    #[serde(default)]
    pub size: u32,
    /// Land-unit carrying capacity of a naval transport; zero otherwise.
    #[serde(default)]
    pub capacity: u32,
    pub organization: i64,
    pub max_organization: i64,
    #[serde(default)]
    pub upkeep: ResourcePool,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

impl Unit {
    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn is_naval(&self) -> bool {
        self.has_keyword(keyword::NAVAL)
    }

    pub fn is_aerial(&self) -> bool {
        self.has_keyword(keyword::AERIAL) || self.has_keyword(keyword::AERIAL_TRANSPORT)
    }

    /// Infiltrators and aerial units slip past enemy formations: they are
    /// exempt from engagement detection, encirclement and land combat.
    pub fn is_exempt_from_engagement(&self) -> bool {
        self.has_keyword(keyword::INFILTRATOR) || self.is_aerial()
    }

    pub fn owning_character(&self) -> Option<&CharacterId> {
        self.owner.as_character()
    }

    /// The character or faction units inherit resource upkeep from.
    pub fn payer(&self) -> Party {
        self.owner.clone()
    }
}

/// An immutable unit template. Globally fixed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub unit_type_id: String,
    pub name: String,
    pub movement: u32,
    pub attack: i64,
    pub defense: i64,
    #[serde(default)]
    pub siege_attack: i64,
    #[serde(default)]
    pub siege_defense: i64,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub capacity: u32,
    pub max_organization: i64,
    #[serde(default)]
    pub cost: ResourcePool,
    #[serde(default)]
    pub upkeep: ResourcePool,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// When set, only factions of this nation may mobilize the type, and
    /// only in territories originally held by that nation.
    #[serde(default)]
    pub nation: Option<Nation>,
}

impl UnitType {
    /// Instantiate a unit from this template. `max_movement` caps the
    /// template's base movement per tenant configuration.
    pub fn instantiate(
        &self,
        unit_id: UnitId,
        name: Option<String>,
        territory: TerritoryId,
        owner: Party,
        faction_id: Option<FactionId>,
        max_movement: u32,
    ) -> Unit {
        Unit {
            unit_id,
            name,
            unit_type_id: self.unit_type_id.clone(),
            current_territory: Some(territory),
            owner,
            commander: None,
            commander_assigned_turn: None,
            faction_id,
            status: UnitStatus::Active,
            movement: self.movement.min(max_movement),
            attack: self.attack,
            defense: self.defense,
            siege_attack: self.siege_attack,
            siege_defense: self.siege_defense,
            size: self.size,
            capacity: self.capacity,
            organization: self.max_organization,
            max_organization: self.max_organization,
            upkeep: self.upkeep,
            keywords: self.keywords.clone(),
        }
    }
}
