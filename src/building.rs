//! Buildings and their immutable templates.

use crate::ids::{BuildingId, Nation, TerritoryId};
use crate::resources::ResourcePool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

/// Well-known building keywords. Resource-named keywords (`ore`, `lumber`,
/// ...) mark which resources a building boosts; these mark behavior.
pub mod keyword {
    pub const INDUSTRIAL: &str = "industrial";
    pub const SPIRITUAL: &str = "spiritual";
    pub const HOSPITAL: &str = "hospital";
    pub const FORTIFICATION: &str = "fortification";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingStatus {
    Active,
    Destroyed,
}

/// A building standing in a territory. At most one ACTIVE building of any
/// given type may exist per territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: BuildingId,
    #[serde(default)]
    pub name: Option<String>,
    pub building_type_id: String,
    pub territory_id: TerritoryId,
    /// Remaining structure. The building is destroyed during the
    /// Organization phase once this reaches zero.
    pub durability: i64,
    pub status: BuildingStatus,
    #[serde(default)]
    pub upkeep: ResourcePool,
    /// Inherited from the template at creation; may be overridden per
    /// building afterwards.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub created_turn: u32,
}

impl Building {
    pub fn is_active(&self) -> bool {
        self.status == BuildingStatus::Active
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }
}

/// An immutable building template. Globally fixed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    pub building_type_id: String,
    pub name: String,
    pub durability: i64,
    #[serde(default)]
    pub cost: ResourcePool,
    #[serde(default)]
    pub upkeep: ResourcePool,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub nation: Option<Nation>,
}
