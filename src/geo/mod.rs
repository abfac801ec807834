//! The territories that make up a tenant's world and the undirected
//! adjacency graph that connects them.

mod map;

pub use self::map::WorldMap;

use crate::ids::{CharacterId, FactionId, Nation, TerritoryId};
use crate::resources::ResourcePool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

/// The terrain of a territory. Terrain decides movement cost on entry and
/// which unit classes may stand there.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Plains,
    Mountain,
    Desert,
    Forest,
    City,
    Ocean,
    Lake,
    Sea,
    Water,
}

impl Terrain {
    /// True for terrain only naval units may occupy.
    pub fn is_water(self) -> bool {
        matches!(
            self,
            Terrain::Ocean | Terrain::Lake | Terrain::Sea | Terrain::Water
        )
    }

    /// Movement points charged when a land unit enters this terrain.
    /// Naval movement always costs one point per water step.
    pub fn entry_cost(self) -> u32 {
        match self {
            Terrain::Mountain => 3,
            Terrain::Desert => 2,
            _ => 1,
        }
    }
}

/// The entity controlling a territory. A territory is held by a character
/// or by a faction, never both.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, from_variants::FromVariants,
)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    Character(CharacterId),
    Faction(FactionId),
}

/// A space on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub territory_id: TerritoryId,
    #[serde(default)]
    pub name: Option<String>,
    pub terrain: Terrain,
    /// Natural per-turn production collected by the controller.
    #[serde(default)]
    pub production: ResourcePool,
    #[serde(default)]
    pub controller: Option<Controller>,
    #[serde(default)]
    pub original_nation: Option<Nation>,
    #[serde(default)]
    pub victory_points: u32,
    #[serde(default)]
    pub siege_defense: u32,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

impl Territory {
    pub fn is_water(&self) -> bool {
        self.terrain.is_water()
    }

    pub fn controlled_by_character(&self, character: &CharacterId) -> bool {
        matches!(&self.controller, Some(Controller::Character(c)) if c == character)
    }

    pub fn controlled_by_faction(&self, faction: &FactionId) -> bool {
        matches!(&self.controller, Some(Controller::Faction(f)) if f == faction)
    }
}

/// An undirected edge in the movement graph. The pair is canonical:
/// `a < b` lexicographically, enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Adjacency {
    pub territory_a: TerritoryId,
    pub territory_b: TerritoryId,
}

impl Adjacency {
    /// Build the canonical edge between two territories.
    pub fn between(a: TerritoryId, b: TerritoryId) -> Adjacency {
        if a <= b {
            Adjacency {
                territory_a: a,
                territory_b: b,
            }
        } else {
            Adjacency {
                territory_a: b,
                territory_b: a,
            }
        }
    }

    /// The far side of the edge from `from`, if `from` is an endpoint.
    pub fn other_side(&self, from: &TerritoryId) -> Option<&TerritoryId> {
        if &self.territory_a == from {
            Some(&self.territory_b)
        } else if &self.territory_b == from {
            Some(&self.territory_a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Adjacency, Terrain};
    use crate::ids::TerritoryId;

    #[test]
    fn adjacency_is_canonical() {
        let edge = Adjacency::between(TerritoryId::from("zeta"), TerritoryId::from("alpha"));
        assert_eq!(edge.territory_a.as_str(), "alpha");
        assert_eq!(edge.territory_b.as_str(), "zeta");
    }

    #[test]
    fn terrain_entry_costs() {
        assert_eq!(Terrain::Mountain.entry_cost(), 3);
        assert_eq!(Terrain::Desert.entry_cost(), 2);
        assert_eq!(Terrain::Plains.entry_cost(), 1);
        assert_eq!(Terrain::City.entry_cost(), 1);
    }

    #[test]
    fn terrain_water_classes() {
        for terrain in [Terrain::Ocean, Terrain::Lake, Terrain::Sea, Terrain::Water] {
            assert!(terrain.is_water());
        }
        assert!(!Terrain::City.is_water());
    }
}
